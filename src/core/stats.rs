//! Dashboard statistics.
//!
//! Aggregates are folded over the full client and debt collections using the
//! *effective* status of each debt, so the numbers are current even when the
//! reconciliation pass has not run yet. Nothing here is persisted; every call
//! recomputes from raw rows.

use crate::{
    core::{money::Money, status},
    entities::{Client, Debt, DebtStatus, client, debt},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Count and value of the debts in one status bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBucket {
    /// Number of debts
    pub count: usize,
    /// Sum of their amounts
    pub value: Money,
}

impl StatusBucket {
    fn add(&mut self, amount: Money) {
        self.count += 1;
        self.value += amount;
    }
}

/// Dashboard-level aggregates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// All clients, active or not
    pub total_clients: usize,
    /// Clients with the active flag set
    pub active_clients: usize,
    /// All debts
    pub total_debts: usize,
    /// Sum of every debt amount regardless of status
    pub total_value: Money,
    /// Not paid, not past due
    pub pending: StatusBucket,
    /// Not paid, past due
    pub overdue: StatusBucket,
    /// Paid
    pub paid: StatusBucket,
}

impl DashboardStats {
    /// The bucket for an effective status.
    #[must_use]
    pub const fn bucket(&self, status: DebtStatus) -> &StatusBucket {
        match status {
            DebtStatus::Pending => &self.pending,
            DebtStatus::Overdue => &self.overdue,
            DebtStatus::Paid => &self.paid,
        }
    }

    /// Amount still to be collected (pending plus overdue).
    #[must_use]
    pub fn outstanding(&self) -> Money {
        self.pending.value + self.overdue.value
    }
}

/// Folds clients and debts into dashboard aggregates as of `today`.
#[must_use]
pub fn compute_stats(
    clients: &[client::Model],
    debts: &[debt::Model],
    today: NaiveDate,
) -> DashboardStats {
    let mut stats = DashboardStats {
        total_clients: clients.len(),
        active_clients: clients.iter().filter(|c| c.active).count(),
        total_debts: debts.len(),
        ..DashboardStats::default()
    };

    for debt in debts {
        let amount = debt.amount();
        stats.total_value += amount;
        match status::effective_status(debt, today) {
            DebtStatus::Pending => stats.pending.add(amount),
            DebtStatus::Overdue => stats.overdue.add(amount),
            DebtStatus::Paid => stats.paid.add(amount),
        }
    }

    stats
}

/// Re-fetches every client and debt and computes fresh aggregates.
pub async fn load_dashboard(db: &DatabaseConnection, today: NaiveDate) -> Result<DashboardStats> {
    let clients = Client::find().all(db).await?;
    let debts = Debt::find().all(db).await?;
    Ok(compute_stats(&clients, &debts, today))
}

/// Per-client open balance, for the "top debtors" list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    /// Client id
    pub client_id: i64,
    /// Client display name
    pub client_name: String,
    /// Number of unpaid debts
    pub open_debts: usize,
    /// Unpaid total (pending plus overdue)
    pub outstanding: Money,
    /// Overdue part of `outstanding`
    pub overdue: Money,
}

/// Open balances per client, largest first. Clients with nothing
/// outstanding are left out.
#[must_use]
pub fn client_summaries(
    clients: &[client::Model],
    debts: &[debt::Model],
    today: NaiveDate,
) -> Vec<ClientSummary> {
    let mut by_client: HashMap<i64, ClientSummary> = HashMap::new();

    for debt in debts {
        let effective = status::effective_status(debt, today);
        if effective == DebtStatus::Paid {
            continue;
        }

        let entry = by_client.entry(debt.client_id).or_insert_with(|| ClientSummary {
            client_id: debt.client_id,
            client_name: clients
                .iter()
                .find(|c| c.id == debt.client_id)
                .map_or_else(|| format!("#{}", debt.client_id), |c| c.name.clone()),
            open_debts: 0,
            outstanding: Money::ZERO,
            overdue: Money::ZERO,
        });
        entry.open_debts += 1;
        entry.outstanding += debt.amount();
        if effective == DebtStatus::Overdue {
            entry.overdue += debt.amount();
        }
    }

    let mut summaries: Vec<ClientSummary> = by_client.into_values().collect();
    summaries.sort_by(|a, b| {
        b.outstanding
            .cmp(&a.outstanding)
            .then_with(|| a.client_name.cmp(&b.client_name))
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    summaries
}
