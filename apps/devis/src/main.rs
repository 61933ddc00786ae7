//! # Devis - Repair Quote Dashboard Server
//!
//! The main binary for the devis dashboard.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for record operations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              apps/devis (THE BINARY)            │
//! │                                                 │
//! │    ┌─────────────┐         ┌─────────────┐      │
//! │    │    CLI      │         │  HTTP API   │      │
//! │    │   (clap)    │         │   (axum)    │      │
//! │    └──────┬──────┘         └──────┬──────┘      │
//! │           └───────────┬───────────┘             │
//! │                       ▼                         │
//! │               ┌───────────────┐                 │
//! │               │  devis-core   │                 │
//! │               │  (THE LOGIC)  │                 │
//! │               └───────────────┘                 │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! devis server --host 0.0.0.0 --port 3000
//!
//! # CLI operations
//! devis add-user -u claire -p 'motdepasse'
//! devis import -i devis.csv --as claire
//! devis list --statut "Validé" --sort montant --order desc
//! devis stats
//! ```

use clap::Parser;
use devis::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // DEVIS_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DEVIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "devis=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗ ███████╗██╗   ██╗██╗███████╗
  ██╔══██╗██╔════╝██║   ██║██║██╔════╝
  ██║  ██║█████╗  ██║   ██║██║███████╗
  ██║  ██║██╔══╝  ╚██╗ ██╔╝██║╚════██║
  ██████╔╝███████╗ ╚████╔╝ ██║███████║
  ╚═════╝ ╚══════╝  ╚═══╝  ╚═╝╚══════╝

  Repair Quote Dashboard v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
