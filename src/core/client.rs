//! Client business logic - Handles all client-related operations.
//!
//! Provides functions for creating, retrieving, updating, deactivating and
//! deleting clients. Input is validated and normalised before it reaches the
//! database; the tax id (NUIT) is checked for uniqueness up front so callers
//! get a distinct [`Error::DuplicateKey`] rather than a raw constraint error.

use crate::{
    core::access::Actor,
    entities::{Client, Debt, Notification, client, debt, notification},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Editable client fields, as submitted by a form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFields {
    /// Display name (required)
    pub name: String,
    /// Tax id, nine digits
    pub nuit: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
}

impl ClientFields {
    /// Fields with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Trims every field, turns blank optionals into `None` and checks formats.
    pub fn validate(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("name", "cannot be empty"));
        }

        let nuit = non_blank(self.nuit);
        if let Some(ref nuit) = nuit {
            if nuit.len() != 9 || !nuit.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::validation("nuit", "must be exactly 9 digits"));
            }
        }

        let email = non_blank(self.email);
        if let Some(ref email) = email {
            if !is_plausible_email(email) {
                return Err(Error::validation(
                    "email",
                    format!("'{email}' is not a valid email address"),
                ));
            }
        }

        let phone = non_blank(self.phone).map(|p| normalize_phone(&p)).transpose()?;

        Ok(Self {
            name,
            nuit,
            email,
            phone,
            address: non_blank(self.address),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Strips spaces, dashes and parentheses; keeps an optional leading `+`.
fn normalize_phone(raw: &str) -> Result<String> {
    let (plus, rest) = raw
        .strip_prefix('+')
        .map_or(("", raw), |rest| ("+", rest));
    let digits: String = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if !(9..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(
            "phone",
            format!("'{raw}' must contain 9 to 15 digits"),
        ));
    }
    Ok(format!("{plus}{digits}"))
}

/// Retrieves every client, ordered alphabetically by name.
pub async fn list_clients(db: &DatabaseConnection) -> Result<Vec<client::Model>> {
    Client::find()
        .order_by_asc(client::Column::Name)
        .order_by_asc(client::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves only active clients, ordered alphabetically by name.
pub async fn list_active_clients(db: &DatabaseConnection) -> Result<Vec<client::Model>> {
    Client::find()
        .filter(client::Column::Active.eq(true))
        .order_by_asc(client::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a client by id, returning None if it does not exist.
pub async fn get_client<C>(db: &C, client_id: i64) -> Result<Option<client::Model>>
where
    C: ConnectionTrait,
{
    Client::find_by_id(client_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a client by tax id.
pub async fn find_client_by_nuit(
    db: &DatabaseConnection,
    nuit: &str,
) -> Result<Option<client::Model>> {
    Client::find()
        .filter(client::Column::Nuit.eq(nuit))
        .one(db)
        .await
        .map_err(Into::into)
}

/// A tax id taken between the pre-check and the write is caught by the
/// unique index; report it with the value the caller submitted.
fn with_nuit_value(err: DbErr, nuit: Option<&str>) -> Error {
    match (Error::from(err), nuit) {
        (Error::DuplicateKey { field: "nuit", .. }, Some(nuit)) => Error::DuplicateKey {
            field: "nuit",
            value: nuit.to_string(),
        },
        (other, _) => other,
    }
}

async fn ensure_nuit_free<C>(db: &C, nuit: Option<&str>, except_id: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(nuit) = nuit else {
        return Ok(());
    };

    let mut query = Client::find().filter(client::Column::Nuit.eq(nuit));
    if let Some(id) = except_id {
        query = query.filter(client::Column::Id.ne(id));
    }

    if query.one(db).await?.is_some() {
        return Err(Error::DuplicateKey {
            field: "nuit",
            value: nuit.to_string(),
        });
    }
    Ok(())
}

/// Creates a new, active client.
///
/// Fails with [`Error::DuplicateKey`] if another client already holds the tax
/// id; nothing is written in that case.
#[instrument(skip(db, fields))]
pub async fn create_client(db: &DatabaseConnection, fields: ClientFields) -> Result<client::Model> {
    let fields = fields.validate()?;
    ensure_nuit_free(db, fields.nuit.as_deref(), None).await?;
    let submitted_nuit = fields.nuit.clone();

    let now = chrono::Utc::now();
    let client = client::ActiveModel {
        name: Set(fields.name),
        nuit: Set(fields.nuit),
        email: Set(fields.email),
        phone: Set(fields.phone),
        address: Set(fields.address),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let result = client
        .insert(db)
        .await
        .map_err(|e| with_nuit_value(e, submitted_nuit.as_deref()))?;
    info!("Created client {} ('{}')", result.id, result.name);
    Ok(result)
}

/// Replaces a client's editable fields.
#[instrument(skip(db, fields))]
pub async fn update_client(
    db: &DatabaseConnection,
    client_id: i64,
    fields: ClientFields,
) -> Result<client::Model> {
    let fields = fields.validate()?;

    let existing = get_client(db, client_id)
        .await?
        .ok_or_else(|| Error::not_found("client", client_id))?;
    ensure_nuit_free(db, fields.nuit.as_deref(), Some(client_id)).await?;
    let submitted_nuit = fields.nuit.clone();

    let mut active_model: client::ActiveModel = existing.into();
    active_model.name = Set(fields.name);
    active_model.nuit = Set(fields.nuit);
    active_model.email = Set(fields.email);
    active_model.phone = Set(fields.phone);
    active_model.address = Set(fields.address);
    active_model.updated_at = Set(chrono::Utc::now());

    active_model
        .update(db)
        .await
        .map_err(|e| with_nuit_value(e, submitted_nuit.as_deref()))
}

/// Activates or deactivates a client. Deactivation keeps all history.
pub async fn set_client_active(
    db: &DatabaseConnection,
    client_id: i64,
    active: bool,
) -> Result<client::Model> {
    let existing = get_client(db, client_id)
        .await?
        .ok_or_else(|| Error::not_found("client", client_id))?;

    if existing.active == active {
        return Ok(existing);
    }

    let mut active_model: client::ActiveModel = existing.into();
    active_model.active = Set(active);
    active_model.updated_at = Set(chrono::Utc::now());
    let updated = active_model.update(db).await?;
    info!(
        "Client {} is now {}",
        updated.id,
        if active { "active" } else { "inactive" }
    );
    Ok(updated)
}

/// Hard-deletes a client. Admin only.
///
/// The client's debts are deleted with it; contact log entries that pointed
/// at the client or its debts are kept with those references cleared.
/// Returns the number of debts removed.
#[instrument(skip(db, actor), fields(user = %actor.user_id))]
pub async fn delete_client(db: &DatabaseConnection, actor: &Actor, client_id: i64) -> Result<u64> {
    actor.require_admin("delete clients")?;

    let txn = db.begin().await?;

    let client = get_client(&txn, client_id)
        .await?
        .ok_or_else(|| Error::not_found("client", client_id))?;

    let debt_ids: Vec<i64> = Debt::find()
        .filter(debt::Column::ClientId.eq(client_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    if !debt_ids.is_empty() {
        Notification::update_many()
            .col_expr(notification::Column::DebtId, Expr::value(Option::<i64>::None))
            .filter(notification::Column::DebtId.is_in(debt_ids.clone()))
            .exec(&txn)
            .await?;
    }
    Notification::update_many()
        .col_expr(notification::Column::ClientId, Expr::value(Option::<i64>::None))
        .filter(notification::Column::ClientId.eq(client_id))
        .exec(&txn)
        .await?;

    let removed = Debt::delete_many()
        .filter(debt::Column::ClientId.eq(client_id))
        .exec(&txn)
        .await?
        .rows_affected;

    client.delete(&txn).await?;
    txn.commit().await?;

    warn!("Deleted client {client_id} and {removed} debt(s)");
    Ok(removed)
}
