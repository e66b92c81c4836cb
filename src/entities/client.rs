//! Client entity - The ownership root of the ledger.
//!
//! Each client has a display name, an optional tax id (NUIT), optional contact
//! details and an `active` flag used to deactivate without deleting.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Unique identifier for the client
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name shown on reports and messages
    pub name: String,
    /// Tax id (NUIT), nine digits when present and unique across clients
    #[sea_orm(unique)]
    pub nuit: Option<String>,
    /// Contact email address
    pub email: Option<String>,
    /// Contact phone number, digits only with an optional leading `+`
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Inactive clients are hidden from pickers but keep their history
    pub active: bool,
    /// When the client was created
    pub created_at: DateTimeUtc,
    /// When the client was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Client and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One client owes many debts
    #[sea_orm(has_many = "super::debt::Entity")]
    Debts,
    /// One client has many contact log entries
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::debt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debts.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
