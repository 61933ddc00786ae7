//! # Devis CLI Module
//!
//! This module implements the CLI interface for devis.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create an empty data file
//! - `add-user` - Create a login account
//! - `list` - Filtered, paginated listing
//! - `stats` - Aggregate statistics
//! - `export` - Write every record to a CSV file
//! - `import` - Append the rows of a CSV file

mod commands;

use crate::api::ListParams;
use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use devis_core::DevisError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Devis - repair quote dashboard
///
/// Tracks insurance repair quotes: listing, statistics, CSV import/export.
#[derive(Parser, Debug)]
#[command(name = "devis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the records file (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub data: Option<PathBuf>,

    /// Path to the users file (overrides the config file)
    #[arg(short = 'U', long, global = true)]
    pub users: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (default from config: 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (default from config: 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create an empty records file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Create a login account
    AddUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// List records
    List {
        /// Substring searched in sinistre, OR, garage and comments
        #[arg(short, long)]
        search: Option<String>,

        /// Exact status, or "tous"
        #[arg(long)]
        statut: Option<String>,

        /// Lower date bound (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,

        /// Upper date bound (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,

        #[arg(long, default_value = "1")]
        page: i64,

        #[arg(short, long, default_value = "10")]
        limit: i64,

        /// Sort field (date, numeroSinistre, numeroOR, garage, montant, statut, ...)
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc, desc)
        #[arg(long)]
        order: Option<String>,
    },

    /// Show aggregate statistics
    Stats,

    /// Export every record to CSV
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import records from a semicolon-delimited CSV file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Principal recorded as creator of the imported rows
        #[arg(long = "as", default_value = "cli")]
        principal: String,
    },
}

// =============================================================================
// CONFIGURATION RESOLUTION
// =============================================================================

impl Cli {
    /// Config file (or defaults) with the global path flags applied.
    pub fn resolve_config(&self) -> Result<AppConfig, DevisError> {
        let mut config = AppConfig::from_optional(self.config.as_deref())?;
        if let Some(data) = &self.data {
            config.data_file = data.clone();
        }
        if let Some(users) = &self.users {
            config.users_file = users.clone();
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DevisError> {
    let mut config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::AddUser { username, password }) => {
            cmd_add_user(&config, json_mode, &username, &password)
        }
        Some(Commands::List {
            search,
            statut,
            from,
            to,
            page,
            limit,
            sort,
            order,
        }) => {
            let params = ListParams {
                search,
                statut,
                date_debut: from,
                date_fin: to,
                page: Some(page.to_string()),
                limit: Some(limit.to_string()),
                sort,
                order,
            };
            cmd_list(&config, json_mode, &params)
        }
        Some(Commands::Stats) => cmd_stats(&config, json_mode),
        Some(Commands::Export { output }) => cmd_export(&config, &output),
        Some(Commands::Import { input, principal }) => {
            cmd_import(&config, json_mode, &input, &principal)
        }
        None => {
            // No subcommand - show stats by default
            cmd_stats(&config, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
