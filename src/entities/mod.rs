//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod client;
pub mod debt;
pub mod notification;
pub mod setting;

// Re-export specific types to avoid conflicts
pub use client::{Column as ClientColumn, Entity as Client, Model as ClientModel};
pub use debt::{Column as DebtColumn, DebtStatus, Entity as Debt, Model as DebtModel};
pub use notification::{
    Channel, Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
    Outcome,
};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
