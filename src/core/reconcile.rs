//! Status reconciliation pass
//!
//! Brings the stored status of unpaid debts in line with the resolver. Every
//! debt still stored as `pending` whose due date has passed is moved to
//! `overdue`, and an in-app log entry is written for each one. The pass is the
//! only writer of `overdue`.
//!
//! Each debt's status change and its log entry are committed together, so a
//! pass that fails partway leaves the remaining debts pending with no entry
//! written. Running the pass again picks them up; running it again after a
//! success changes nothing. The date of the last successful run is kept in
//! the `settings` table.

use crate::{
    core::{
        debt::{self, DebtFilter},
        notification::{ContactAttempt, record_contact_attempt},
        settings::{self, AppSettings},
    },
    entities::{Channel, DebtStatus},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

const LAST_RECONCILIATION_KEY: &str = "last_reconciliation";

/// Result of one reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Date the pass compared due dates against
    pub run_date: NaiveDate,
    /// Number of unpaid, past-due debts looked at
    pub examined: usize,
    /// Debts whose stored status moved to overdue in this pass
    pub updated: Vec<i64>,
}

/// Retrieves the date of the last successful pass.
pub async fn get_last_reconciliation_date(db: &DatabaseConnection) -> Result<Option<NaiveDate>> {
    settings::get_value(db, LAST_RECONCILIATION_KEY)
        .await?
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| Error::Config {
                message: format!("Failed to parse last reconciliation date: {e}"),
            })
        })
        .transpose()
}

/// Runs the reconciliation pass as of `today`.
///
/// # Returns
/// The debts that were moved to overdue. Errors are logged and returned; the
/// caller retries the whole pass.
#[instrument(skip(db, settings))]
pub async fn run_reconciliation(
    db: &DatabaseConnection,
    today: NaiveDate,
    settings: &AppSettings,
) -> Result<ReconcileOutcome> {
    reconcile(db, today, settings)
        .await
        .inspect(|outcome| {
            info!(
                "Reconciliation for {}: {} past-due debt(s) examined, {} marked overdue",
                outcome.run_date,
                outcome.examined,
                outcome.updated.len()
            );
        })
        .inspect_err(|e| error!("Reconciliation for {today} failed: {e}"))
}

/// Moves one debt to overdue and logs it, both or neither. Returns `false`
/// when the debt was no longer stored as pending.
async fn mark_overdue(
    db: &DatabaseConnection,
    debt: &crate::entities::debt::Model,
    settings: &AppSettings,
) -> Result<bool> {
    let txn = db.begin().await?;

    if debt::bulk_set_overdue(&txn, &[debt.id]).await? == 0 {
        txn.rollback().await?;
        return Ok(false);
    }

    let message = format!(
        "Dívida #{} de {} venceu em {}",
        debt.id,
        debt.amount().format(&settings.currency),
        settings.format_date(debt.due_date)
    );
    let attempt = ContactAttempt::sent(Channel::InApp, message).about(debt);
    if let Err(e) = record_contact_attempt(&txn, attempt).await {
        txn.rollback().await?;
        return Err(e);
    }

    txn.commit().await?;
    Ok(true)
}

async fn reconcile(
    db: &DatabaseConnection,
    today: NaiveDate,
    settings: &AppSettings,
) -> Result<ReconcileOutcome> {
    let past_due = debt::list_debts(
        db,
        &DebtFilter {
            due_before: Some(today),
            ..DebtFilter::default()
        },
    )
    .await?;

    let unpaid: Vec<_> = past_due
        .into_iter()
        .filter(|d| d.status != DebtStatus::Paid)
        .collect();
    let pending: Vec<_> = unpaid
        .iter()
        .filter(|d| d.status == DebtStatus::Pending)
        .collect();

    let mut updated = Vec::with_capacity(pending.len());
    for debt in pending {
        if mark_overdue(db, debt, settings).await? {
            updated.push(debt.id);
        } else {
            debug!("Debt {} changed since it was read; skipped", debt.id);
        }
    }

    settings::set_value(db, LAST_RECONCILIATION_KEY, &today.format("%Y-%m-%d").to_string())
        .await?;

    Ok(ReconcileOutcome {
        run_date: today,
        examined: unpaid.len(),
        updated,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::debt::{get_debt, set_debt_paid};
    use crate::core::notification::{ContactLogFilter, list_contact_log};
    use crate::core::stats::load_dashboard;
    use crate::entities::Outcome;
    use crate::test_utils::*;
    use chrono::Utc;
    use sea_orm::ConnectionTrait;

    #[tokio::test]
    async fn test_reconciliation_marks_past_due_pending() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let settings = AppSettings::default();

        let yesterday = create_test_debt(&db, client.id, 5_000, days_from_today(-1)).await?;
        let due_today = create_test_debt(&db, client.id, 3_000, days_from_today(0)).await?;
        let paid_late = create_test_debt(&db, client.id, 2_000, days_from_today(-7)).await?;
        set_debt_paid(&db, paid_late.id, Utc::now()).await?;

        let outcome = run_reconciliation(&db, today(), &settings).await?;
        assert_eq!(outcome.examined, 1);
        assert_eq!(outcome.updated, vec![yesterday.id]);

        let yesterday = get_debt(&db, yesterday.id).await?.unwrap();
        assert_eq!(yesterday.status, DebtStatus::Overdue);
        assert_eq!(yesterday.paid_at, None);
        assert_eq!(
            get_debt(&db, due_today.id).await?.unwrap().status,
            DebtStatus::Pending
        );
        let paid_late = get_debt(&db, paid_late.id).await?.unwrap();
        assert_eq!(paid_late.status, DebtStatus::Paid);
        assert!(paid_late.paid_at.is_some());

        let log = list_contact_log(
            &db,
            &ContactLogFilter {
                channel: Some(Channel::InApp),
                ..ContactLogFilter::default()
            },
        )
        .await?;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].debt_id, Some(yesterday.id));
        assert_eq!(log[0].outcome, Outcome::Sent);

        assert_eq!(get_last_reconciliation_date(&db).await?, Some(today()));
        Ok(())
    }

    #[tokio::test]
    async fn test_reconciliation_is_idempotent() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let settings = AppSettings::default();
        for days in [-30, -2, -1, 0, 1, 15] {
            create_test_debt(&db, client.id, 1_000, days_from_today(days)).await?;
        }

        let first = run_reconciliation(&db, today(), &settings).await?;
        assert_eq!(first.updated.len(), 3);
        let statuses_after_first: Vec<DebtStatus> = debt::list_debts(&db, &DebtFilter::default())
            .await?
            .into_iter()
            .map(|d| d.status)
            .collect();

        let second = run_reconciliation(&db, today(), &settings).await?;
        assert!(second.updated.is_empty());
        assert_eq!(second.examined, 3);
        let statuses_after_second: Vec<DebtStatus> = debt::list_debts(&db, &DebtFilter::default())
            .await?
            .into_iter()
            .map(|d| d.status)
            .collect();

        assert_eq!(statuses_after_first, statuses_after_second);
        assert_eq!(
            list_contact_log(&db, &ContactLogFilter::default()).await?.len(),
            3
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_pass_is_completed_by_retry() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let settings = AppSettings::default();
        let first = create_test_debt(&db, client.id, 1_000, days_from_today(-3)).await?;
        let second = create_test_debt(&db, client.id, 2_000, days_from_today(-1)).await?;

        // Log writes fail while the table is missing
        db.execute_unprepared("ALTER TABLE notifications RENAME TO notifications_offline")
            .await?;
        assert!(run_reconciliation(&db, today(), &settings).await.is_err());
        db.execute_unprepared("ALTER TABLE notifications_offline RENAME TO notifications")
            .await?;

        // Nothing was half-applied
        for id in [first.id, second.id] {
            assert_eq!(get_debt(&db, id).await?.unwrap().status, DebtStatus::Pending);
        }
        assert_eq!(get_last_reconciliation_date(&db).await?, None);

        let retry = run_reconciliation(&db, today(), &settings).await?;
        assert_eq!(retry.updated, vec![first.id, second.id]);
        let log = list_contact_log(&db, &ContactLogFilter::default()).await?;
        assert_eq!(log.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconciliation_on_empty_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let outcome = run_reconciliation(&db, today(), &AppSettings::default()).await?;
        assert_eq!(outcome.examined, 0);
        assert!(outcome.updated.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stored_status_matches_dashboard_after_pass() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        for days in [-3, -1, 2] {
            create_test_debt(&db, client.id, 700, days_from_today(days)).await?;
        }

        let before = load_dashboard(&db, today()).await?;
        run_reconciliation(&db, today(), &AppSettings::default()).await?;
        let after = load_dashboard(&db, today()).await?;

        // Dashboard never depended on the pass
        assert_eq!(before, after);
        let stored_overdue =
            debt::list_debts(&db, &DebtFilter::with_status(DebtStatus::Overdue)).await?;
        assert_eq!(stored_overdue.len(), after.overdue.count);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_previous_run() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get_last_reconciliation_date(&db).await?, None);
        Ok(())
    }
}
