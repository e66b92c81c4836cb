//! Shared test utilities for the ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        client::{self, ClientFields},
        debt::{self, NewDebt},
        money::Money,
        notification::{self, ContactAttempt},
        settings::AppSettings,
        status,
    },
    entities::{self, Channel},
    errors::Result,
};
use chrono::{Duration, FixedOffset, NaiveDate};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test client with only a name.
pub async fn create_test_client(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::client::Model> {
    client::create_client(db, ClientFields::named(name)).await
}

/// Creates a test client holding a tax id.
pub async fn create_client_with_nuit(
    db: &DatabaseConnection,
    name: &str,
    nuit: &str,
) -> Result<entities::client::Model> {
    client::create_client(
        db,
        ClientFields {
            nuit: Some(nuit.to_string()),
            ..ClientFields::named(name)
        },
    )
    .await
}

/// Sets up a test database with a single client already created.
/// Returns both the database connection and the client.
pub async fn setup_with_client() -> Result<(DatabaseConnection, entities::client::Model)> {
    let db = setup_test_db().await?;
    let client = create_test_client(&db, "Test Client").await?;
    Ok((db, client))
}

/// Creates a pending test debt.
///
/// # Defaults
/// * `description`: "Test debt"
/// * `status`: pending
pub async fn create_test_debt(
    db: &DatabaseConnection,
    client_id: i64,
    cents: i64,
    due_date: NaiveDate,
) -> Result<entities::debt::Model> {
    debt::create_debt(
        db,
        NewDebt::new(client_id, Money::from_cents(cents), "Test debt", due_date),
    )
    .await
}

/// Offset the default settings use; tests resolve "today" against it.
pub fn test_offset() -> FixedOffset {
    AppSettings::default().offset()
}

/// Today's date in the default business time zone.
pub fn today() -> NaiveDate {
    status::today(test_offset())
}

/// A date `days` away from [`today`]; negative values are in the past.
pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

/// Logs a successful contact attempt.
pub async fn log_test_contact(
    db: &DatabaseConnection,
    debt_id: Option<i64>,
    client_id: Option<i64>,
    channel: Channel,
) -> Result<entities::notification::Model> {
    let attempt = ContactAttempt {
        debt_id,
        client_id,
        ..ContactAttempt::sent(channel, "Test contact")
    };
    notification::record_contact_attempt(db, attempt).await
}
