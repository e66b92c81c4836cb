//! Database configuration for the ledger.
//!
//! Handles the `SQLite` connection and table creation. Tables are generated
//! from the entity definitions with `Schema::create_table_from_entity`, so the
//! schema always matches the Rust models.

use crate::entities::{Client, Debt, Notification, Setting};
use crate::errors::{Error, Result};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/debt_ledger.sqlite?mode=rwc";

/// Gets the database URL from `DATABASE_URL`, or the default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Directory an `SQLite` file URL points into, if any.
fn sqlite_parent_dir(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Connects to the database named by [`get_database_url`], creating the
/// directory of a local `SQLite` file first.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(dir) = sqlite_parent_dir(&database_url) {
        std::fs::create_dir_all(dir).map_err(|e| Error::Config {
            message: format!("Failed to create {}: {e}", dir.display()),
        })?;
    }
    info!("Connecting to {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates every table that does not exist yet.
///
/// Referenced tables come first: clients, then debts, then the contact log.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut client_table = schema.create_table_from_entity(Client);
    let mut debt_table = schema.create_table_from_entity(Debt);
    let mut notification_table = schema.create_table_from_entity(Notification);
    let mut setting_table = schema.create_table_from_entity(Setting);

    db.execute(builder.build(client_table.if_not_exists())).await?;
    db.execute(builder.build(debt_table.if_not_exists())).await?;
    db.execute(builder.build(notification_table.if_not_exists()))
        .await?;
    db.execute(builder.build(setting_table.if_not_exists())).await?;

    Ok(())
}
