//! Debt business logic - Handles all debt-related operations.
//!
//! Provides the repository functions the rest of the ledger consumes:
//! filtered listing, creation, editing, payment and the bulk overdue update
//! used by [`crate::core::reconcile`]. Amounts and descriptions are validated
//! before anything is written. The stored status is only moved by explicit
//! actions here; display code should use [`crate::core::status`].

use crate::{
    core::{client::get_client, money::Money},
    entities::{Debt, DebtStatus, Notification, debt, notification},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A debt to be recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDebt {
    /// Client who owes the amount
    pub client_id: i64,
    /// Amount owed, must be positive
    pub amount: Money,
    /// What the debt is for
    pub description: String,
    /// When it must be paid
    pub due_date: NaiveDate,
    /// Initial stored status, normally `Pending`
    pub status: DebtStatus,
}

impl NewDebt {
    /// A pending debt.
    pub fn new(
        client_id: i64,
        amount: Money,
        description: impl Into<String>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            client_id,
            amount,
            description: description.into(),
            due_date,
            status: DebtStatus::Pending,
        }
    }
}

/// Changes to an existing debt; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtChanges {
    /// Move the debt to another client
    pub client_id: Option<i64>,
    /// New amount
    pub amount: Option<Money>,
    /// New description
    pub description: Option<String>,
    /// New due date
    pub due_date: Option<NaiveDate>,
}

/// Query filter for [`list_debts`]. Empty filter lists everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebtFilter {
    /// Only debts of this client
    pub client_id: Option<i64>,
    /// Only debts with this stored status
    pub status: Option<DebtStatus>,
    /// Only debts due strictly before this date
    pub due_before: Option<NaiveDate>,
    /// Only debts due on or after this date
    pub due_from: Option<NaiveDate>,
}

impl DebtFilter {
    /// Debts of one client.
    #[must_use]
    pub fn for_client(client_id: i64) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::default()
        }
    }

    /// Debts with one stored status.
    #[must_use]
    pub fn with_status(status: DebtStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

fn validate_amount(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Error::validation("amount", "must be greater than zero"))
    }
}

fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(Error::validation("description", "cannot be empty"));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(Error::validation(
            "description",
            format!("must be at most {MAX_DESCRIPTION_CHARS} characters"),
        ));
    }
    Ok(description.to_string())
}

/// Lists debts matching the filter, earliest due date first.
pub async fn list_debts<C>(db: &C, filter: &DebtFilter) -> Result<Vec<debt::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Debt::find();
    if let Some(client_id) = filter.client_id {
        query = query.filter(debt::Column::ClientId.eq(client_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(debt::Column::Status.eq(status));
    }
    if let Some(before) = filter.due_before {
        query = query.filter(debt::Column::DueDate.lt(before));
    }
    if let Some(from) = filter.due_from {
        query = query.filter(debt::Column::DueDate.gte(from));
    }

    query
        .order_by_asc(debt::Column::DueDate)
        .order_by_asc(debt::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a debt by id, returning None if it does not exist.
pub async fn get_debt<C>(db: &C, debt_id: i64) -> Result<Option<debt::Model>>
where
    C: ConnectionTrait,
{
    Debt::find_by_id(debt_id).one(db).await.map_err(Into::into)
}

/// Records a new debt for an existing client.
///
/// A debt created as `Paid` gets `paid_at = now` so the paid/paid-at
/// invariant holds from the first write.
#[instrument(skip(db, new_debt), fields(client_id = new_debt.client_id))]
pub async fn create_debt(db: &DatabaseConnection, new_debt: NewDebt) -> Result<debt::Model> {
    validate_amount(new_debt.amount)?;
    let description = validate_description(&new_debt.description)?;

    if get_client(db, new_debt.client_id).await?.is_none() {
        return Err(Error::not_found("client", new_debt.client_id));
    }

    let now = Utc::now();
    let paid_at = (new_debt.status == DebtStatus::Paid).then_some(now);

    let debt = debt::ActiveModel {
        client_id: Set(new_debt.client_id),
        amount_cents: Set(new_debt.amount.cents()),
        description: Set(description),
        due_date: Set(new_debt.due_date),
        created_at: Set(now),
        paid_at: Set(paid_at),
        status: Set(new_debt.status),
        ..Default::default()
    };

    let result = debt.insert(db).await?;
    info!(
        "Created debt {} of {} for client {} due {}",
        result.id,
        result.amount(),
        result.client_id,
        result.due_date
    );
    Ok(result)
}

/// Applies edits to a debt.
///
/// If a stored `Overdue` debt gets a due date that is no longer in the past
/// relative to `today`, its stored status goes back to `Pending` so status
/// filters keep agreeing with the resolver.
#[instrument(skip(db, changes))]
pub async fn update_debt(
    db: &DatabaseConnection,
    debt_id: i64,
    changes: DebtChanges,
    today: NaiveDate,
) -> Result<debt::Model> {
    if let Some(amount) = changes.amount {
        validate_amount(amount)?;
    }
    let description = changes
        .description
        .as_deref()
        .map(validate_description)
        .transpose()?;

    let existing = get_debt(db, debt_id)
        .await?
        .ok_or_else(|| Error::not_found("debt", debt_id))?;

    if let Some(client_id) = changes.client_id {
        if get_client(db, client_id).await?.is_none() {
            return Err(Error::not_found("client", client_id));
        }
    }

    let stale_overdue = existing.status == DebtStatus::Overdue
        && changes.due_date.is_some_and(|due| due >= today);

    let mut active_model: debt::ActiveModel = existing.into();
    if let Some(client_id) = changes.client_id {
        active_model.client_id = Set(client_id);
    }
    if let Some(amount) = changes.amount {
        active_model.amount_cents = Set(amount.cents());
    }
    if let Some(description) = description {
        active_model.description = Set(description);
    }
    if let Some(due_date) = changes.due_date {
        active_model.due_date = Set(due_date);
    }
    if stale_overdue {
        debug!("Debt {debt_id} moved out of the past; resetting stored status to pending");
        active_model.status = Set(DebtStatus::Pending);
    }

    active_model.update(db).await.map_err(Into::into)
}

/// Marks a debt as paid at `paid_at`.
///
/// Paying an already-paid debt is a no-op that keeps the original payment
/// time.
#[instrument(skip(db))]
pub async fn set_debt_paid(
    db: &DatabaseConnection,
    debt_id: i64,
    paid_at: DateTime<Utc>,
) -> Result<debt::Model> {
    let existing = get_debt(db, debt_id)
        .await?
        .ok_or_else(|| Error::not_found("debt", debt_id))?;

    if existing.status == DebtStatus::Paid {
        debug!("Debt {debt_id} already paid");
        return Ok(existing);
    }

    let mut active_model: debt::ActiveModel = existing.into();
    active_model.status = Set(DebtStatus::Paid);
    active_model.paid_at = Set(Some(paid_at));
    let updated = active_model.update(db).await?;

    info!("Debt {} paid ({})", updated.id, updated.amount());
    Ok(updated)
}

/// Sets the stored status of the given debts to `Overdue`.
///
/// Only rows still stored as `Pending` are touched, so a debt paid in the
/// meantime is never pulled back to overdue and `paid_at` is never written.
/// Returns the number of rows changed.
pub async fn bulk_set_overdue<C>(db: &C, debt_ids: &[i64]) -> Result<u64>
where
    C: ConnectionTrait,
{
    if debt_ids.is_empty() {
        return Ok(0);
    }

    let result = Debt::update_many()
        .col_expr(debt::Column::Status, Expr::value(DebtStatus::Overdue))
        .filter(debt::Column::Id.is_in(debt_ids.iter().copied()))
        .filter(debt::Column::Status.eq(DebtStatus::Pending))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Deletes a debt. Contact log entries about it keep their row with the
/// debt reference cleared.
#[instrument(skip(db))]
pub async fn delete_debt(db: &DatabaseConnection, debt_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let debt = get_debt(&txn, debt_id)
        .await?
        .ok_or_else(|| Error::not_found("debt", debt_id))?;

    Notification::update_many()
        .col_expr(notification::Column::DebtId, Expr::value(Option::<i64>::None))
        .filter(notification::Column::DebtId.eq(debt_id))
        .exec(&txn)
        .await?;

    debt.delete(&txn).await?;
    txn.commit().await?;

    info!("Deleted debt {debt_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Channel;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_debt_validation() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let due = days_from_today(10);

        let zero = create_debt(&db, NewDebt::new(client.id, Money::ZERO, "Stock", due)).await;
        assert!(matches!(zero, Err(Error::Validation { field: "amount", .. })));

        let negative =
            create_debt(&db, NewDebt::new(client.id, Money::from_cents(-1), "Stock", due)).await;
        assert!(matches!(negative, Err(Error::Validation { field: "amount", .. })));

        let blank = create_debt(&db, NewDebt::new(client.id, Money::from_units(5), "  ", due)).await;
        assert!(matches!(
            blank,
            Err(Error::Validation {
                field: "description",
                ..
            })
        ));

        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        let too_long = create_debt(&db, NewDebt::new(client.id, Money::from_units(5), long, due)).await;
        assert!(matches!(
            too_long,
            Err(Error::Validation {
                field: "description",
                ..
            })
        ));

        let exact = "é".repeat(MAX_DESCRIPTION_CHARS);
        create_debt(&db, NewDebt::new(client.id, Money::from_units(5), exact, due)).await?;

        let orphan = create_debt(&db, NewDebt::new(999, Money::from_units(5), "Stock", due)).await;
        assert!(matches!(orphan, Err(Error::NotFound { entity: "client", .. })));

        assert_eq!(list_debts(&db, &DebtFilter::default()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_debt_defaults_to_pending() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let debt = create_test_debt(&db, client.id, 5_000_00, days_from_today(7)).await?;

        assert_eq!(debt.status, DebtStatus::Pending);
        assert_eq!(debt.paid_at, None);
        assert_eq!(debt.amount(), Money::from_units(5_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_paid_debt_sets_paid_at() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let mut new_debt = NewDebt::new(client.id, Money::from_units(20), "Old invoice", days_from_today(-30));
        new_debt.status = DebtStatus::Paid;

        let debt = create_debt(&db, new_debt).await?;
        assert_eq!(debt.status, DebtStatus::Paid);
        assert!(debt.paid_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_debts_filters() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let other = create_test_client(&db, "Other").await?;

        let early = create_test_debt(&db, client.id, 100, days_from_today(-5)).await?;
        let late = create_test_debt(&db, client.id, 200, days_from_today(5)).await?;
        let theirs = create_test_debt(&db, other.id, 300, days_from_today(0)).await?;
        set_debt_paid(&db, late.id, Utc::now()).await?;

        let all = list_debts(&db, &DebtFilter::default()).await?;
        assert_eq!(
            all.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![early.id, theirs.id, late.id]
        );

        let mine = list_debts(&db, &DebtFilter::for_client(client.id)).await?;
        assert_eq!(mine.len(), 2);

        let paid = list_debts(&db, &DebtFilter::with_status(DebtStatus::Paid)).await?;
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, late.id);

        let past = list_debts(
            &db,
            &DebtFilter {
                due_before: Some(days_from_today(0)),
                ..DebtFilter::default()
            },
        )
        .await?;
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, early.id);

        let upcoming = list_debts(
            &db,
            &DebtFilter {
                due_from: Some(days_from_today(0)),
                client_id: Some(other.id),
                ..DebtFilter::default()
            },
        )
        .await?;
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, theirs.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_debt() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let debt = create_test_debt(&db, client.id, 1_000, days_from_today(3)).await?;

        let updated = update_debt(
            &db,
            debt.id,
            DebtChanges {
                amount: Some(Money::from_cents(1_550)),
                description: Some("  Fornecimento de arroz ".to_string()),
                ..DebtChanges::default()
            },
            today(),
        )
        .await?;
        assert_eq!(updated.amount_cents, 1_550);
        assert_eq!(updated.description, "Fornecimento de arroz");
        assert_eq!(updated.due_date, debt.due_date);

        let bad = update_debt(
            &db,
            debt.id,
            DebtChanges {
                amount: Some(Money::ZERO),
                ..DebtChanges::default()
            },
            today(),
        )
        .await;
        assert!(matches!(bad, Err(Error::Validation { .. })));

        let missing = update_debt(&db, 999, DebtChanges::default(), today()).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "debt", .. })));

        let bad_client = update_debt(
            &db,
            debt.id,
            DebtChanges {
                client_id: Some(999),
                ..DebtChanges::default()
            },
            today(),
        )
        .await;
        assert!(matches!(bad_client, Err(Error::NotFound { entity: "client", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_moving_due_date_forward_clears_stored_overdue() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let debt = create_test_debt(&db, client.id, 1_000, days_from_today(-3)).await?;
        bulk_set_overdue(&db, &[debt.id]).await?;

        let updated = update_debt(
            &db,
            debt.id,
            DebtChanges {
                due_date: Some(days_from_today(0)),
                ..DebtChanges::default()
            },
            today(),
        )
        .await?;
        assert_eq!(updated.status, DebtStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_debt_paid() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let debt = create_test_debt(&db, client.id, 1_000, days_from_today(-3)).await?;

        let paid_at = Utc::now();
        let paid = set_debt_paid(&db, debt.id, paid_at).await?;
        assert_eq!(paid.status, DebtStatus::Paid);
        assert_eq!(paid.paid_at, Some(paid_at));

        // Second payment keeps the first timestamp
        let again = set_debt_paid(&db, debt.id, paid_at + chrono::Duration::hours(1)).await?;
        assert_eq!(again.paid_at, Some(paid_at));

        let missing = set_debt_paid(&db, 999, paid_at).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_set_overdue_skips_paid() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let a = create_test_debt(&db, client.id, 100, days_from_today(-2)).await?;
        let b = create_test_debt(&db, client.id, 200, days_from_today(-2)).await?;
        set_debt_paid(&db, b.id, Utc::now()).await?;

        assert_eq!(bulk_set_overdue(&db, &[]).await?, 0);
        assert_eq!(bulk_set_overdue(&db, &[a.id, b.id]).await?, 1);
        assert_eq!(bulk_set_overdue(&db, &[a.id, b.id]).await?, 0);

        let a = get_debt(&db, a.id).await?.unwrap();
        let b = get_debt(&db, b.id).await?.unwrap();
        assert_eq!(a.status, DebtStatus::Overdue);
        assert_eq!(a.paid_at, None);
        assert_eq!(b.status, DebtStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_debt_keeps_log_entries() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let debt = create_test_debt(&db, client.id, 100, days_from_today(1)).await?;
        let entry = log_test_contact(&db, Some(debt.id), Some(client.id), Channel::Email).await?;

        delete_debt(&db, debt.id).await?;
        assert!(get_debt(&db, debt.id).await?.is_none());

        let entry = Notification::find_by_id(entry.id).one(&db).await?.unwrap();
        assert_eq!(entry.debt_id, None);
        assert_eq!(entry.client_id, Some(client.id));

        let missing = delete_debt(&db, debt.id).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }
}
