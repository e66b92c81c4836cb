//! Debt status resolution.
//!
//! The stored `status` column lags behind reality until the reconciliation
//! pass runs, so everything that displays or aggregates debts asks this module
//! for the *effective* status instead. The rule is small:
//!
//! - a stored `paid` always wins, whatever the due date;
//! - otherwise a debt is `overdue` when its due date is strictly before today;
//! - otherwise it is `pending`. A debt due today is still pending.

use crate::entities::{DebtStatus, debt};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Computes the effective status from the stored status and due date.
#[must_use]
pub fn resolve(stored: DebtStatus, due_date: NaiveDate, today: NaiveDate) -> DebtStatus {
    match stored {
        DebtStatus::Paid => DebtStatus::Paid,
        DebtStatus::Pending | DebtStatus::Overdue if due_date < today => DebtStatus::Overdue,
        DebtStatus::Pending | DebtStatus::Overdue => DebtStatus::Pending,
    }
}

/// Effective status of a stored debt as of `today`.
#[must_use]
pub fn effective_status(debt: &debt::Model, today: NaiveDate) -> DebtStatus {
    resolve(debt.status, debt.due_date, today)
}

/// Calendar date of an instant in the business's UTC offset.
///
/// Due dates are plain calendar dates, so "today" has to be taken in the
/// offset the business operates in, not in UTC.
#[must_use]
pub fn today_at<Tz: TimeZone>(now: &DateTime<Tz>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Today's date for the business, read from the system clock.
#[must_use]
pub fn today(offset: FixedOffset) -> NaiveDate {
    today_at(&Utc::now(), offset)
}
