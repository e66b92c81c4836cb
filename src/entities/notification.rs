//! Notification entity - Append-only log of contact attempts.
//!
//! Entries are written for every message sent to a client and by the
//! reconciliation pass. Both references are nullable: some entries are not
//! tied to a debt, and hard-deleting a client orphans its entries.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Channel a contact attempt went through
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Mail sent through the mail endpoint
    #[sea_orm(string_value = "email")]
    Email,
    /// WhatsApp deep link opened by the operator
    #[sea_orm(string_value = "whatsapp")]
    Whatsapp,
    /// Phone call logged by the operator
    #[sea_orm(string_value = "phone")]
    Phone,
    /// Dashboard inbox entry
    #[sea_orm(string_value = "in_app")]
    InApp,
}

/// Outcome of a contact attempt
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The message left the system
    #[sea_orm(string_value = "sent")]
    Sent,
    /// The attempt failed; see `error`
    #[sea_orm(string_value = "error")]
    Error,
}

/// Contact log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Channel used
    pub channel: Channel,
    /// Whether the attempt succeeded
    pub outcome: Outcome,
    /// Rendered message text
    pub message: String,
    /// Error text when `outcome` is `Error`
    pub error: Option<String>,
    /// When the contact was scheduled for, if it was scheduled
    pub scheduled_at: Option<DateTimeUtc>,
    /// When the message actually went out
    pub sent_at: Option<DateTimeUtc>,
    /// When the entry was written
    pub created_at: DateTimeUtc,
    /// Debt the contact was about
    pub debt_id: Option<i64>,
    /// Client that was contacted
    pub client_id: Option<i64>,
}

/// Defines relationships between Notification and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Entry optionally refers to a debt
    #[sea_orm(
        belongs_to = "super::debt::Entity",
        from = "Column::DebtId",
        to = "super::debt::Column::Id"
    )]
    Debt,
    /// Entry optionally refers to a client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::debt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debt.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
