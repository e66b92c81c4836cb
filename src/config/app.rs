//! Application configuration loading from config.toml
//!
//! The file supplies first-run defaults: a `[settings]` table with the
//! business settings and an optional `[[clients]]` list to import. Both are
//! written to the database once; after that the `settings` table is the
//! source of truth and edits to the file are ignored.

use crate::{
    core::{
        client::{ClientFields, create_client},
        settings::{self, AppSettings, SEEDED_KEY},
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial business settings
    pub settings: AppSettings,
    /// Clients to import on first run
    pub clients: Vec<ClientFields>,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read, the TOML is invalid
/// or the settings it contains do not validate.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })?;
    config.settings.validate().map_err(|e| Error::Config {
        message: format!("Invalid [settings] in {}: {e}", path.display()),
    })?;
    Ok(config)
}

/// Loads ./config.toml, or built-in defaults when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        info!("No config.toml found; using built-in defaults");
        Ok(AppConfig::default())
    }
}

/// Writes the configured settings and clients to an empty database.
///
/// Does nothing once the `seeded` marker is set. Clients whose tax id is
/// already taken, or whose fields do not validate, are skipped with a
/// warning.
///
/// # Returns
/// The number of clients imported.
#[instrument(skip(db, config))]
pub async fn seed_from_config(db: &DatabaseConnection, config: &AppConfig) -> Result<usize> {
    if settings::get_value(db, SEEDED_KEY).await?.is_some() {
        debug!("Database already seeded; skipping");
        return Ok(0);
    }

    info!(
        "Seeding database: {} client(s) from config",
        config.clients.len()
    );
    settings::save_settings(db, &config.settings).await?;

    let mut imported = 0;
    for fields in &config.clients {
        match create_client(db, fields.clone()).await {
            Ok(client) => {
                debug!("Imported client '{}' (id {})", client.name, client.id);
                imported += 1;
            }
            Err(e @ (Error::DuplicateKey { .. } | Error::Validation { .. })) => {
                warn!("Skipping configured client '{}': {e}", fields.name);
            }
            Err(e) => return Err(e),
        }
    }

    settings::set_value(db, SEEDED_KEY, &chrono::Utc::now().to_rfc3339()).await?;
    info!("Seeding finished: {imported} client(s) imported");
    Ok(imported)
}
