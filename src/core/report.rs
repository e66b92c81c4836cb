//! Report generation business logic.
//!
//! This module turns debts and clients into display-ready report rows for the
//! document generator (PDF or spreadsheet rendering happens elsewhere). Rows
//! are filtered by effective status and carry pre-formatted amounts, dates
//! and status labels so every report agrees with the dashboard.

use crate::{
    core::{money::Money, settings::AppSettings, status},
    entities::{DebtStatus, client, debt},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which debts a report includes, by effective status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Every debt
    #[default]
    All,
    /// Only pending debts
    Pending,
    /// Only overdue debts
    Overdue,
    /// Only paid debts
    Paid,
}

impl StatusFilter {
    /// Whether a debt with this effective status belongs in the report.
    #[must_use]
    pub const fn matches(self, status: DebtStatus) -> bool {
        matches!(
            (self, status),
            (Self::All, _)
                | (Self::Pending, DebtStatus::Pending)
                | (Self::Overdue, DebtStatus::Overdue)
                | (Self::Paid, DebtStatus::Paid)
        )
    }
}

/// Label printed in the status column.
#[must_use]
pub const fn status_label(status: DebtStatus) -> &'static str {
    match status {
        DebtStatus::Pending => "Pendente",
        DebtStatus::Overdue => "Vencida",
        DebtStatus::Paid => "Paga",
    }
}

/// One line of an exported report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Debt id
    pub id: i64,
    /// Owning client's name
    pub client_name: String,
    /// Owning client's tax id, `-` when absent
    pub tax_id: String,
    /// Debt description
    pub description: String,
    /// Formatted amount
    pub amount: String,
    /// Formatted due date
    pub due_date: String,
    /// Effective status label
    pub status: String,
}

/// Rows plus totals, ready for a document generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Filter the report was built with
    pub filter: StatusFilter,
    /// Date statuses were resolved against
    pub generated_on: String,
    /// Report lines, earliest due date first
    pub rows: Vec<ReportRow>,
    /// Sum of the included debts
    pub total: Money,
    /// `total`, formatted
    pub total_formatted: String,
}

fn selected<'a>(
    debts: &'a [debt::Model],
    filter: StatusFilter,
    today: NaiveDate,
) -> Vec<(&'a debt::Model, DebtStatus)> {
    let mut selected: Vec<_> = debts
        .iter()
        .map(|d| (d, status::effective_status(d, today)))
        .filter(|(_, effective)| filter.matches(*effective))
        .collect();
    selected.sort_by_key(|(d, _)| (d.due_date, d.id));
    selected
}

/// Builds report rows for the debts matching `filter`, earliest due date first.
#[must_use]
pub fn export_rows(
    debts: &[debt::Model],
    clients: &[client::Model],
    filter: StatusFilter,
    today: NaiveDate,
    settings: &AppSettings,
) -> Vec<ReportRow> {
    let clients_by_id: HashMap<i64, &client::Model> = clients.iter().map(|c| (c.id, c)).collect();

    selected(debts, filter, today)
        .into_iter()
        .map(|(debt, effective)| {
            let client = clients_by_id.get(&debt.client_id);
            ReportRow {
                id: debt.id,
                client_name: client
                    .map_or_else(|| format!("#{}", debt.client_id), |c| c.name.clone()),
                tax_id: client
                    .and_then(|c| c.nuit.clone())
                    .unwrap_or_else(|| "-".to_string()),
                description: debt.description.clone(),
                amount: debt.amount().format(&settings.currency),
                due_date: settings.format_date(debt.due_date),
                status: status_label(effective).to_string(),
            }
        })
        .collect()
}

/// Builds a full report: rows plus the total of the included debts.
#[must_use]
pub fn build_report(
    debts: &[debt::Model],
    clients: &[client::Model],
    filter: StatusFilter,
    today: NaiveDate,
    settings: &AppSettings,
) -> Report {
    let total: Money = selected(debts, filter, today)
        .iter()
        .map(|(d, _)| d.amount())
        .sum();

    Report {
        filter,
        generated_on: settings.format_date(today),
        rows: export_rows(debts, clients, filter, today, settings),
        total,
        total_formatted: total.format(&settings.currency),
    }
}
