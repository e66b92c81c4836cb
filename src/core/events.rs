//! Change-event handling for the live dashboard.
//!
//! The store announces inserts, updates and deletes as [`ChangeEvent`]s on an
//! mpsc channel. Events carry no payload beyond the row id: on each one the
//! feed re-fetches every client and debt, recomputes [`DashboardStats`] and
//! publishes the result on a watch channel. Events queued while a recompute
//! runs are folded into the next one.

use crate::{
    core::{
        stats::{DashboardStats, load_dashboard},
        status,
    },
    errors::Result,
};
use chrono::FixedOffset;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Table a change happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// `clients`
    Clients,
    /// `debts`
    Debts,
    /// `notifications`
    Notifications,
    /// `settings`
    Settings,
}

/// Kind of change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

/// A row-level change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Where the change happened
    pub table: Table,
    /// What happened
    pub operation: Operation,
    /// Primary key of the changed row
    pub record_id: i64,
}

impl ChangeEvent {
    /// Builds an event.
    #[must_use]
    pub const fn new(table: Table, operation: Operation, record_id: i64) -> Self {
        Self {
            table,
            operation,
            record_id,
        }
    }

    /// Whether the change can move any dashboard number.
    #[must_use]
    pub const fn affects_dashboard(&self) -> bool {
        matches!(self.table, Table::Clients | Table::Debts)
    }
}

/// Publishes fresh dashboard statistics after each relevant change.
#[derive(Debug)]
pub struct DashboardFeed {
    offset: FixedOffset,
    publish: watch::Sender<DashboardStats>,
}

impl DashboardFeed {
    /// Creates a feed and the receiver views subscribe through. The receiver
    /// starts with empty statistics until the first refresh.
    #[must_use]
    pub fn new(offset: FixedOffset) -> (Self, watch::Receiver<DashboardStats>) {
        let (publish, receiver) = watch::channel(DashboardStats::default());
        (Self { offset, publish }, receiver)
    }

    /// Another receiver for the same feed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardStats> {
        self.publish.subscribe()
    }

    /// Recomputes and publishes the statistics unconditionally.
    pub async fn refresh(&self, db: &DatabaseConnection) -> Result<()> {
        let stats = load_dashboard(db, status::today(self.offset)).await?;
        self.publish.send_replace(stats);
        Ok(())
    }

    /// Handles one event. Returns whether the statistics were republished.
    pub async fn handle(&self, db: &DatabaseConnection, event: &ChangeEvent) -> Result<bool> {
        if !event.affects_dashboard() {
            debug!("Ignoring {:?} on {:?}", event.operation, event.table);
            return Ok(false);
        }
        self.refresh(db).await?;
        Ok(true)
    }
}

/// Drives `feed` from `events` until every sender is dropped.
///
/// A failed refresh is logged and the feed keeps listening; the next event
/// retries it.
pub async fn run_dashboard_feed(
    db: &DatabaseConnection,
    feed: &DashboardFeed,
    mut events: mpsc::Receiver<ChangeEvent>,
) {
    info!("Dashboard feed started");
    while let Some(first) = events.recv().await {
        let mut relevant = first.affects_dashboard();
        let mut folded = 0usize;
        while let Ok(next) = events.try_recv() {
            relevant |= next.affects_dashboard();
            folded += 1;
        }
        if folded > 0 {
            debug!("Folded {folded} queued change event(s)");
        }
        if !relevant {
            continue;
        }
        if let Err(e) = feed.refresh(db).await {
            error!("Failed to refresh dashboard: {e}");
        }
    }
    info!("Dashboard feed stopped: all event senders dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::money::Money;
    use crate::test_utils::*;

    #[test]
    fn test_affects_dashboard() {
        assert!(ChangeEvent::new(Table::Debts, Operation::Update, 1).affects_dashboard());
        assert!(ChangeEvent::new(Table::Clients, Operation::Delete, 1).affects_dashboard());
        assert!(!ChangeEvent::new(Table::Notifications, Operation::Insert, 1).affects_dashboard());
        assert!(!ChangeEvent::new(Table::Settings, Operation::Update, 1).affects_dashboard());
    }

    #[tokio::test]
    async fn test_handle_republishes_on_debt_change() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        let (feed, receiver) = DashboardFeed::new(test_offset());
        assert_eq!(receiver.borrow().total_debts, 0);

        let debt = create_test_debt(&db, client.id, 1_500, days_from_today(2)).await?;
        let handled = feed
            .handle(&db, &ChangeEvent::new(Table::Debts, Operation::Insert, debt.id))
            .await?;
        assert!(handled);
        assert_eq!(receiver.borrow().total_debts, 1);
        assert_eq!(receiver.borrow().pending.value, Money::from_cents(1_500));

        let ignored = feed
            .handle(&db, &ChangeEvent::new(Table::Notifications, Operation::Insert, 1))
            .await?;
        assert!(!ignored);
        Ok(())
    }

    #[tokio::test]
    async fn test_feed_runs_until_senders_drop() -> Result<()> {
        let (db, client) = setup_with_client().await?;
        create_test_debt(&db, client.id, 2_000, days_from_today(-1)).await?;
        create_test_debt(&db, client.id, 500, days_from_today(1)).await?;

        let (feed, receiver) = DashboardFeed::new(test_offset());
        let (sender, events) = mpsc::channel(8);
        for id in 1..=3 {
            sender
                .send(ChangeEvent::new(Table::Debts, Operation::Update, id))
                .await
                .map_err(|e| crate::errors::Error::Config {
                    message: e.to_string(),
                })?;
        }
        drop(sender);

        run_dashboard_feed(&db, &feed, events).await;

        let stats = receiver.borrow();
        assert_eq!(stats.total_clients, 1);
        assert_eq!(stats.overdue.value, Money::from_cents(2_000));
        assert_eq!(stats.pending.value, Money::from_cents(500));
        Ok(())
    }
}
