//! Unified error types for the debt ledger.
//!
//! Validation happens before anything reaches the store, so a `Validation`
//! error never leaves a partially applied write behind. Store failures are
//! classified on the way in (see the `From<DbErr>` impl) so callers can tell a
//! duplicate tax id or a missing row from an unreachable database.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors surfaced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, reported against the offending field
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the rejected field
        field: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// A unique key (the client tax id) is already taken
    #[error("Duplicate {field}: '{value}' is already registered")]
    DuplicateKey {
        /// Name of the unique field
        field: &'static str,
        /// The colliding value, or the store's constraint message when the
        /// value is not known at the point of failure
        value: String,
    },

    /// The referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row that was looked up
        entity: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// The store could not be reached; the caller may offer a retry
    #[error("Repository unavailable: {message}")]
    RepositoryUnavailable {
        /// Underlying failure description
        message: String,
    },

    /// The acting user lacks the role required for the action
    #[error("Not allowed to {action}")]
    Forbidden {
        /// Action that was refused
        action: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Any other store failure
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl Error {
    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a user-visible retry prompt makes sense for this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RepositoryUnavailable { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::DuplicateKey {
                field: unique_field(&detail),
                value: detail,
            };
        }

        match err {
            DbErr::ConnectionAcquire(e) => Self::RepositoryUnavailable {
                message: e.to_string(),
            },
            DbErr::Conn(e) => Self::RepositoryUnavailable {
                message: e.to_string(),
            },
            DbErr::RecordNotFound(what) => Self::NotFound {
                entity: "record",
                id: what,
            },
            other => Self::Database(other),
        }
    }
}

/// Column named by a unique-constraint message such as
/// `UNIQUE constraint failed: clients.nuit`.
fn unique_field(detail: &str) -> &'static str {
    const UNIQUE_COLUMNS: [(&str, &str); 2] = [("clients.nuit", "nuit"), ("settings.key", "key")];
    UNIQUE_COLUMNS
        .iter()
        .find(|(column, _)| detail.contains(column))
        .map_or("unique key", |(_, field)| field)
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{Client, client, setting};
    use sea_orm::{ActiveModelTrait, ConnAcquireErr, EntityTrait, RuntimeErr, Set};

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err: Error = DbErr::RecordNotFound("debt 7".to_string()).into();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_db_errors_are_wrapped() {
        let err: Error = DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("Database error:"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_connection_failures_are_retryable() {
        let err: Error = DbErr::Conn(RuntimeErr::Internal("connection refused".to_string())).into();
        assert!(matches!(err, Error::RepositoryUnavailable { .. }));
        assert!(err.is_retryable());

        let err: Error = DbErr::ConnectionAcquire(ConnAcquireErr::Timeout).into();
        assert!(matches!(err, Error::RepositoryUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unique_field_from_constraint_message() {
        assert_eq!(unique_field("UNIQUE constraint failed: clients.nuit"), "nuit");
        assert_eq!(unique_field("UNIQUE constraint failed: settings.key"), "key");
        assert_eq!(unique_field("UNIQUE constraint failed: other.col"), "unique key");
    }

    #[tokio::test]
    async fn test_store_unique_violation_maps_to_duplicate_key() -> Result<()> {
        let db = crate::test_utils::setup_test_db().await?;
        let now = chrono::Utc::now();
        let row = || client::ActiveModel {
            name: Set("Cliente".to_string()),
            nuit: Set(Some("400123456".to_string())),
            email: Set(None),
            phone: Set(None),
            address: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        row().insert(&db).await?;
        let err: Error = row().insert(&db).await.unwrap_err().into();
        assert!(matches!(err, Error::DuplicateKey { field: "nuit", .. }));
        assert!(!err.is_retryable());
        assert_eq!(Client::find().all(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_setting_key_is_not_reported_as_nuit() -> Result<()> {
        let db = crate::test_utils::setup_test_db().await?;
        let row = || setting::ActiveModel {
            key: Set("business_name".to_string()),
            value: Set("Loja".to_string()),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        row().insert(&db).await?;
        let err: Error = row().insert(&db).await.unwrap_err().into();
        assert!(matches!(err, Error::DuplicateKey { field: "key", .. }));
        Ok(())
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("amount", "must be greater than zero");
        assert_eq!(err.to_string(), "Invalid amount: must be greater than zero");
    }
}
