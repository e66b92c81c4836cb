//! Client contact: message rendering and the contact log.
//!
//! Messages are rendered from the templates in [`AppSettings`], choosing the
//! wording by the debt's effective status. Delivery itself happens outside
//! the ledger (a mail endpoint, a WhatsApp deep link opened by the operator);
//! the caller reports the outcome and it is appended to the log.

use crate::{
    core::{settings::AppSettings, status},
    entities::{Channel, DebtStatus, Notification, Outcome, client, debt, notification},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Fills `{placeholder}` markers in a single pass, so substituted values are
/// never re-expanded. Unknown placeholders are left as-is.
#[must_use]
pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = after.find('}').and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &after[..end])
                .map(|(_, value)| (end, value))
        });
        match hit {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders the message for a debt, worded by its effective status as of `today`.
#[must_use]
pub fn render_debt_message(
    debt: &debt::Model,
    client: &client::Model,
    today: NaiveDate,
    settings: &AppSettings,
) -> String {
    let template = match status::effective_status(debt, today) {
        DebtStatus::Overdue => &settings.templates.overdue,
        DebtStatus::Pending => &settings.templates.upcoming,
        DebtStatus::Paid => &settings.templates.paid,
    };
    render_template(template, &debt_placeholders(debt, client, settings))
}

/// Renders the email subject line for a debt.
#[must_use]
pub fn render_email_subject(
    debt: &debt::Model,
    client: &client::Model,
    settings: &AppSettings,
) -> String {
    render_template(
        &settings.templates.email_subject,
        &debt_placeholders(debt, client, settings),
    )
}

fn debt_placeholders(
    debt: &debt::Model,
    client: &client::Model,
    settings: &AppSettings,
) -> [(&'static str, String); 5] {
    [
        ("client_name", client.name.clone()),
        ("amount", debt.amount().format(&settings.currency)),
        ("due_date", settings.format_date(debt.due_date)),
        ("description", debt.description.clone()),
        ("business_name", settings.business_name.clone()),
    ]
}

/// Percent-encodes everything outside the URL unreserved set.
fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Builds a `wa.me` link that opens WhatsApp with the message pre-filled.
pub fn whatsapp_link(phone: &str, message: &str) -> Result<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 9 {
        return Err(Error::validation("phone", "no usable phone number"));
    }
    Ok(format!("https://wa.me/{digits}?text={}", percent_encode(message)))
}

/// Builds a `mailto:` link with subject and body.
pub fn mailto_link(email: &str, subject: &str, body: &str) -> Result<String> {
    if !email.contains('@') {
        return Err(Error::validation("email", "no usable email address"));
    }
    Ok(format!(
        "mailto:{email}?subject={}&body={}",
        percent_encode(subject),
        percent_encode(body)
    ))
}

/// A contact attempt to append to the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAttempt {
    /// Channel used
    pub channel: Channel,
    /// Text that was (or would have been) sent
    pub message: String,
    /// `None` when delivery succeeded
    pub error: Option<String>,
    /// When the contact had been scheduled for
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When delivery happened; defaults to now for successful attempts
    pub sent_at: Option<DateTime<Utc>>,
    /// Debt the contact was about
    pub debt_id: Option<i64>,
    /// Client contacted
    pub client_id: Option<i64>,
}

impl ContactAttempt {
    /// A successful contact over `channel`.
    pub fn sent(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            error: None,
            scheduled_at: None,
            sent_at: None,
            debt_id: None,
            client_id: None,
        }
    }

    /// A failed contact over `channel`.
    pub fn failed(channel: Channel, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::sent(channel, message)
        }
    }

    /// Attaches the debt and its client.
    #[must_use]
    pub fn about(mut self, debt: &debt::Model) -> Self {
        self.debt_id = Some(debt.id);
        self.client_id = Some(debt.client_id);
        self
    }

    /// Attaches a client only.
    #[must_use]
    pub fn to_client(mut self, client_id: i64) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

/// Appends a contact attempt to the log.
pub async fn record_contact_attempt<C>(db: &C, attempt: ContactAttempt) -> Result<notification::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let outcome = if attempt.error.is_some() {
        Outcome::Error
    } else {
        Outcome::Sent
    };
    let sent_at = match outcome {
        Outcome::Sent => attempt.sent_at.or(Some(now)),
        Outcome::Error => attempt.sent_at,
    };

    let entry = notification::ActiveModel {
        channel: Set(attempt.channel),
        outcome: Set(outcome),
        message: Set(attempt.message),
        error: Set(attempt.error),
        scheduled_at: Set(attempt.scheduled_at),
        sent_at: Set(sent_at),
        created_at: Set(now),
        debt_id: Set(attempt.debt_id),
        client_id: Set(attempt.client_id),
        ..Default::default()
    };

    let entry = entry.insert(db).await?;
    match entry.outcome {
        Outcome::Sent => debug!("Logged {:?} contact {}", entry.channel, entry.id),
        Outcome::Error => warn!(
            "Logged failed {:?} contact {}: {}",
            entry.channel,
            entry.id,
            entry.error.as_deref().unwrap_or_default()
        ),
    }
    Ok(entry)
}

/// Renders the debt message and logs the contact with the delivery outcome
/// reported by the caller.
pub async fn log_debt_contact(
    db: &DatabaseConnection,
    debt: &debt::Model,
    client: &client::Model,
    channel: Channel,
    delivery: std::result::Result<(), String>,
    today: NaiveDate,
    settings: &AppSettings,
) -> Result<notification::Model> {
    let message = render_debt_message(debt, client, today, settings);
    let attempt = match delivery {
        Ok(()) => ContactAttempt::sent(channel, message),
        Err(error) => ContactAttempt::failed(channel, message, error),
    };
    record_contact_attempt(db, attempt.about(debt)).await
}

/// Query filter for [`list_contact_log`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactLogFilter {
    /// Only entries about this client
    pub client_id: Option<i64>,
    /// Only entries about this debt
    pub debt_id: Option<i64>,
    /// Only entries over this channel
    pub channel: Option<Channel>,
}

/// Lists contact log entries, newest first.
pub async fn list_contact_log(
    db: &DatabaseConnection,
    filter: &ContactLogFilter,
) -> Result<Vec<notification::Model>> {
    let mut query = Notification::find();
    if let Some(client_id) = filter.client_id {
        query = query.filter(notification::Column::ClientId.eq(client_id));
    }
    if let Some(debt_id) = filter.debt_id {
        query = query.filter(notification::Column::DebtId.eq(debt_id));
    }
    if let Some(channel) = filter.channel {
        query = query.filter(notification::Column::Channel.eq(channel));
    }

    query
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Read/unread state of the in-app inbox, kept by the viewer.
///
/// The log itself is append-only, so "read" is tracked against entry ids
/// outside the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadTracker {
    read: HashSet<i64>,
}

impl ReadTracker {
    /// Marks one entry as read.
    pub fn mark_read(&mut self, entry_id: i64) {
        self.read.insert(entry_id);
    }

    /// Marks every given entry as read.
    pub fn mark_all_read(&mut self, entries: &[notification::Model]) {
        self.read.extend(entries.iter().map(|e| e.id));
    }

    /// Whether the entry has been read.
    #[must_use]
    pub fn is_read(&self, entry_id: i64) -> bool {
        self.read.contains(&entry_id)
    }

    /// Number of unread entries among `entries`.
    #[must_use]
    pub fn unread_count(&self, entries: &[notification::Model]) -> usize {
        entries.iter().filter(|e| !self.is_read(e.id)).count()
    }
}
