//! Role checks for destructive operations.
//!
//! Identity and role come from the external auth service; the ledger only
//! checks the role it is handed.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Role of the acting user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including hard deletes
    Admin,
    /// Day-to-day operation: clients, debts, contacts
    Staff,
}

/// The user performing an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity reported by the auth service
    pub user_id: String,
    /// Role reported by the auth service
    pub role: Role,
}

impl Actor {
    /// Builds an actor from the auth service's answer.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Fails with [`Error::Forbidden`] unless the actor is an admin.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            tracing::warn!("User {} ({:?}) refused: {action}", self.user_id, self.role);
            Err(Error::Forbidden {
                action: action.to_string(),
            })
        }
    }
}
