/// Role checks for destructive operations
pub mod access;
/// Client repository operations
pub mod client;
/// Debt repository operations
pub mod debt;
/// Change events and the live dashboard feed
pub mod events;
/// Fixed-point money and currency formatting
pub mod money;
/// Message rendering and the contact log
pub mod notification;
/// Overdue reconciliation pass
pub mod reconcile;
/// Report rows for document export
pub mod report;
/// Application settings persistence
pub mod settings;
/// Dashboard aggregates
pub mod stats;
/// Effective-status resolution
pub mod status;
