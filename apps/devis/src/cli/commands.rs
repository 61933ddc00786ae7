//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState, ListParams};
use crate::config::AppConfig;
use devis_core::{DevisError, DevisRepository, JsonFileStore, UserStore};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for CSV import (100 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DevisError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DevisError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DevisError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DevisError> {
    let canonical = path.canonicalize().map_err(|e| {
        DevisError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DevisError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, DevisError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        DevisError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(DevisError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| DevisError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &impl serde::Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), DevisError> {
    let repo = open_repository(config);
    tracing::info!(store = %repo.describe(), "Record store opened");
    let state = AppState::new(repo, open_users(config))
        .with_session_ttl(config.session_ttl())
        .with_body_limit(config.max_upload_bytes);

    println!("Devis Dashboard Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", config.host);
    println!("  Port:       {}", config.port);
    println!("  Data file:  {}", config.data_file.display());
    println!("  Users file: {}", config.users_file.display());
    println!();
    println!("Endpoints:");
    println!("  GET    /api/devis        - List (search, statut, dateDebut, dateFin, page, limit)");
    println!("  POST   /api/devis        - Create");
    println!("  PUT    /api/devis/{{id}}   - Update");
    println!("  DELETE /api/devis/{{id}}   - Delete");
    println!("  GET    /api/stats        - Statistics");
    println!("  GET    /api/export/csv   - CSV export");
    println!("  POST   /api/import/csv   - CSV import");
    println!("  GET    /health           - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config.bind_addr(), state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty records file.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), DevisError> {
    JsonFileStore::new(&config.data_file).init(force)?;
    println!("Initialized empty records file at {}", config.data_file.display());
    Ok(())
}

// =============================================================================
// ADD-USER COMMAND
// =============================================================================

/// Create a login account.
pub fn cmd_add_user(
    config: &AppConfig,
    json_mode: bool,
    username: &str,
    password: &str,
) -> Result<(), DevisError> {
    let user = open_users(config).add_user(username, password)?;
    tracing::info!(username = %user.username, "User account created");

    if json_mode {
        print_json(&serde_json::json!({
            "username": user.username,
            "usersFile": config.users_file.to_string_lossy(),
        }));
    } else {
        println!(
            "Created user '{}' in {}",
            user.username,
            config.users_file.display()
        );
    }
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// Print one page of records.
pub fn cmd_list(config: &AppConfig, json_mode: bool, params: &ListParams) -> Result<(), DevisError> {
    let result = open_repository(config).list(&params.to_query()?)?;

    if json_mode {
        print_json(&result);
        return Ok(());
    }

    let p = result.pagination;
    println!(
        "Page {}/{} ({} records, {} per page)",
        p.page, p.total_pages, p.total, p.limit
    );
    println!();
    println!(
        "{:<24} {:<10} {:<16} {:<12} {:<20} {:>12} {:<10}",
        "ID", "Date", "Sinistre", "OR", "Garage", "Montant", "Statut"
    );
    for d in &result.data {
        println!(
            "{:<24} {:<10} {:<16} {:<12} {:<20} {:>12} {:<10}",
            d.id,
            d.date,
            d.numero_sinistre,
            d.numero_or,
            d.garage,
            d.montant.raw(),
            d.statut
        );
    }

    Ok(())
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Show aggregate statistics.
pub fn cmd_stats(config: &AppConfig, json_mode: bool) -> Result<(), DevisError> {
    let stats = open_repository(config).stats()?;

    if json_mode {
        print_json(&stats);
        return Ok(());
    }

    println!("Devis Statistics");
    println!("================");
    println!("Data file: {}", config.data_file.display());
    println!();
    println!("Total:         {}", stats.total);
    println!("En étude:      {}", stats.count_by_status.en_etude);
    println!("Validés:       {}", stats.count_by_status.valides);
    println!("Terminés:      {}", stats.count_by_status.termines);
    println!("Montant total: {:.2} €", stats.montant_total);
    println!("Montant moyen: {:.2} €", stats.montant_moyen);

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write every record to a CSV file.
pub fn cmd_export(config: &AppConfig, output: &Path) -> Result<(), DevisError> {
    let validated_output = validate_output_path(output)?;

    let Some(data) = open_repository(config).export_csv()? else {
        println!("No records to export");
        return Ok(());
    };

    std::fs::write(&validated_output, data.as_bytes())
        .map_err(|e| DevisError::Io(format!("Write file: {}", e)))?;

    println!(
        "Exported {} bytes to {}",
        data.len(),
        validated_output.display()
    );
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Append the rows of a CSV file.
pub fn cmd_import(
    config: &AppConfig,
    json_mode: bool,
    input: &Path,
    principal: &str,
) -> Result<(), DevisError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| DevisError::Io(format!("Read file: {}", e)))?;

    let imported = open_repository(config).import_csv(&data, principal)?;
    tracing::info!(rows = imported, principal = %principal, "CSV import completed");

    if json_mode {
        print_json(&api::ImportResponse::new(imported));
    } else {
        println!("Imported {} records from {}", imported, validated_path.display());
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Repository over the configured records file.
pub fn open_repository(config: &AppConfig) -> DevisRepository {
    DevisRepository::new(JsonFileStore::new(&config.data_file))
}

/// Account list at the configured users file.
pub fn open_users(config: &AppConfig) -> UserStore {
    UserStore::new(&config.users_file)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            data_file: dir.join("devis.json"),
            users_file: dir.join("users.json"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_init_then_stats() {
        let dir = tempfile::tempdir();
        assert!(dir.is_ok());
        let Ok(dir) = dir else { return };
        let config = config_in(dir.path());

        assert!(cmd_init(&config, false).is_ok());
        assert!(cmd_init(&config, false).is_err());
        assert!(cmd_init(&config, true).is_ok());
        assert!(cmd_stats(&config, true).is_ok());
    }

    #[test]
    fn test_import_then_export() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let config = config_in(dir.path());
        let input = dir.path().join("in.csv");
        let written = std::fs::write(&input, "Garage;Montant\nNord;120\nSud;80\n");
        assert!(written.is_ok());

        assert!(cmd_import(&config, false, &input, "cli").is_ok());
        assert!(matches!(open_repository(&config).stats(), Ok(s) if s.total == 2));

        let output = dir.path().join("out.csv");
        assert!(cmd_export(&config, &output).is_ok());
        let exported = std::fs::read_to_string(&output).unwrap_or_default();
        assert!(exported.starts_with('\u{feff}'));
        assert_eq!(exported.lines().count(), 3);
    }

    #[test]
    fn test_import_rejects_directory() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let config = config_in(dir.path());
        assert!(cmd_import(&config, false, dir.path(), "cli").is_err());
    }

    #[test]
    fn test_add_user_twice_fails() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let config = config_in(dir.path());
        assert!(cmd_add_user(&config, false, "claire", "motdepasse").is_ok());
        assert!(matches!(
            cmd_add_user(&config, false, "claire", "motdepasse"),
            Err(DevisError::UserExists(_))
        ));
    }
}
