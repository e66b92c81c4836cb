//! Application settings.
//!
//! Settings are an explicit object that callers load from the `settings`
//! table, pass to whatever needs them (message rendering, reports, the
//! reconciliation pass) and save back. Each field is stored as its own
//! key-value row; keys missing from the table fall back to defaults.

use crate::{
    core::money::{CurrencyFormat, SymbolPosition},
    entities::{Setting, setting},
    errors::{Error, Result},
};
use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, info, warn};

/// Marker written once the configured seed data has been imported.
pub const SEEDED_KEY: &str = "seeded";

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Message wording used when contacting clients.
///
/// Placeholders: `{client_name}`, `{amount}`, `{due_date}`, `{description}`
/// and `{business_name}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    /// Used when the debt is overdue
    pub overdue: String,
    /// Used when the debt is still within its due date
    pub upcoming: String,
    /// Used to acknowledge a payment
    pub paid: String,
    /// Subject line for email contacts
    pub email_subject: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            overdue: "Olá {client_name}, a sua dívida de {amount} referente a \"{description}\" \
                      venceu em {due_date}. Por favor regularize o pagamento. {business_name}"
                .to_string(),
            upcoming: "Olá {client_name}, lembramos que a sua dívida de {amount} referente a \
                       \"{description}\" vence em {due_date}. {business_name}"
                .to_string(),
            paid: "Olá {client_name}, confirmamos o pagamento de {amount} referente a \
                   \"{description}\". Obrigado! {business_name}"
                .to_string(),
            email_subject: "{business_name}: {description}".to_string(),
        }
    }
}

/// Business-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Name signed on messages and reports
    pub business_name: String,
    /// Currency formatting conventions
    pub currency: CurrencyFormat,
    /// `strftime` pattern for due dates
    pub date_format: String,
    /// Offset of the business's local time from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Client message wording
    pub templates: MessageTemplates,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            business_name: "Debt Ledger".to_string(),
            currency: CurrencyFormat::default(),
            date_format: "%d/%m/%Y".to_string(),
            utc_offset_minutes: 120,
            templates: MessageTemplates::default(),
        }
    }
}

impl AppSettings {
    /// The business's UTC offset. Out-of-range values fall back to UTC.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Formats a calendar date with the configured pattern.
    #[must_use]
    pub fn format_date(&self, date: NaiveDate) -> String {
        try_format_date(&self.date_format, date)
            .or_else(|| try_format_date(FALLBACK_DATE_FORMAT, date))
            .unwrap_or_default()
    }

    /// Rejects settings that would break formatting or parsing.
    pub fn validate(&self) -> Result<()> {
        if self.business_name.trim().is_empty() {
            return Err(Error::validation("business_name", "cannot be empty"));
        }
        self.currency.validate()?;
        if self.date_format.is_empty()
            || StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error))
            || try_format_date(&self.date_format, NaiveDate::MIN).is_none()
        {
            return Err(Error::validation(
                "date_format",
                format!("'{}' is not a valid date pattern", self.date_format),
            ));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(Error::validation(
                "utc_offset_minutes",
                "must be within ±24 hours",
            ));
        }
        Ok(())
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("business_name", self.business_name.clone()),
            ("currency.code", self.currency.code.clone()),
            ("currency.symbol", self.currency.symbol.clone()),
            (
                "currency.symbol_position",
                match self.currency.symbol_position {
                    SymbolPosition::Before => "before",
                    SymbolPosition::After => "after",
                }
                .to_string(),
            ),
            (
                "currency.grouping_separator",
                self.currency.grouping_separator.to_string(),
            ),
            (
                "currency.decimal_separator",
                self.currency.decimal_separator.to_string(),
            ),
            ("date_format", self.date_format.clone()),
            ("utc_offset_minutes", self.utc_offset_minutes.to_string()),
            ("template.overdue", self.templates.overdue.clone()),
            ("template.upcoming", self.templates.upcoming.clone()),
            ("template.paid", self.templates.paid.clone()),
            ("template.email_subject", self.templates.email_subject.clone()),
        ]
    }

    /// Applies one stored row. Returns `false` for keys that are not settings.
    fn apply_pair(&mut self, key: &str, value: String) -> Result<bool> {
        match key {
            "business_name" => self.business_name = value,
            "currency.code" => self.currency.code = value,
            "currency.symbol" => self.currency.symbol = value,
            "currency.symbol_position" => {
                self.currency.symbol_position = match value.as_str() {
                    "before" => SymbolPosition::Before,
                    "after" => SymbolPosition::After,
                    other => {
                        return Err(Error::Config {
                            message: format!("unknown symbol position '{other}'"),
                        });
                    }
                };
            }
            "currency.grouping_separator" => {
                self.currency.grouping_separator = single_char(key, &value)?;
            }
            "currency.decimal_separator" => {
                self.currency.decimal_separator = single_char(key, &value)?;
            }
            "date_format" => self.date_format = value,
            "utc_offset_minutes" => {
                self.utc_offset_minutes = value.parse().map_err(|e| Error::Config {
                    message: format!("invalid utc_offset_minutes '{value}': {e}"),
                })?;
            }
            "template.overdue" => self.templates.overdue = value,
            "template.upcoming" => self.templates.upcoming = value,
            "template.paid" => self.templates.paid = value,
            "template.email_subject" => self.templates.email_subject = value,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Formats `date`, or `None` when the pattern asks for fields a plain date
/// lacks (hours, time zones).
fn try_format_date(pattern: &str, date: NaiveDate) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).ok()?;
    Some(out)
}

fn single_char(key: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Config {
            message: format!("{key} must be a single character, got '{value}'"),
        }),
    }
}

/// Reads a raw setting value.
pub async fn get_value<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    Ok(Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|s| s.value))
}

/// Writes a raw setting value, inserting the row if needed.
pub async fn set_value<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();

    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(row) = existing {
        if row.value == value {
            return Ok(());
        }
        let mut active_model: setting::ActiveModel = row.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let row = setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        row.insert(db).await?;
    }

    Ok(())
}

/// Loads settings, starting from defaults and applying every stored key.
pub async fn load_settings(db: &DatabaseConnection) -> Result<AppSettings> {
    let mut settings = AppSettings::default();
    for row in Setting::find().all(db).await? {
        match settings.apply_pair(&row.key, row.value) {
            Ok(true) => {}
            Ok(false) => debug!("Skipping non-setting key '{}'", row.key),
            Err(e) => {
                warn!("Stored setting '{}' is unreadable ({e}); falling back to defaults", row.key);
                return Ok(AppSettings::default());
            }
        }
    }

    if let Err(e) = settings.validate() {
        warn!("Stored settings are invalid ({e}); falling back to defaults");
        return Ok(AppSettings::default());
    }
    Ok(settings)
}

/// Validates and persists every setting.
pub async fn save_settings(db: &DatabaseConnection, settings: &AppSettings) -> Result<()> {
    settings.validate()?;

    let txn = db.begin().await?;
    for (key, value) in settings.to_pairs() {
        set_value(&txn, key, &value).await?;
    }
    txn.commit().await?;

    info!("Saved settings for '{}'", settings.business_name);
    Ok(())
}
