//! Debt entity - A monetary obligation owed by exactly one client.
//!
//! Amounts are stored as integer minor units. The `status` column is the
//! *stored* status, a cache refreshed by the reconciliation pass; display and
//! aggregation go through [`crate::core::status`] instead.

use crate::core::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Debt lifecycle status as persisted in the `debts` table
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    /// Not paid and not (yet) past its due date
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled; never changes automatically afterwards
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Not paid and past its due date
    #[sea_orm(string_value = "overdue")]
    Overdue,
}

impl DebtStatus {
    /// Short lowercase identifier, matching the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debt database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    /// Unique identifier for the debt
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the client who owes this debt
    pub client_id: i64,
    /// Amount owed in minor units (always positive)
    pub amount_cents: i64,
    /// What the debt is for, at most 500 characters
    pub description: String,
    /// Calendar date the payment is due
    pub due_date: Date,
    /// When the debt was recorded
    pub created_at: DateTimeUtc,
    /// When the debt was paid; set if and only if `status` is `Paid`
    pub paid_at: Option<DateTimeUtc>,
    /// Stored status
    pub status: DebtStatus,
}

impl Model {
    /// Amount owed as [`Money`].
    #[must_use]
    pub const fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Defines relationships between Debt and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each debt belongs to one client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
    /// One debt has many contact log entries
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
