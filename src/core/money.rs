//! Fixed-point money.
//!
//! Amounts are held as integer minor units (cents) so that sums over large
//! debt collections are exact. Formatting is driven by a [`CurrencyFormat`]
//! and always emits exactly two fraction digits; parsing is lenient about
//! the decimal separator so values typed by users round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A monetary amount in minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero in any currency.
    pub const ZERO: Self = Self(0);

    /// Wraps an amount already expressed in minor units.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Builds an amount from whole currency units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Addition that reports overflow instead of wrapping.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Parses a user-typed amount.
    ///
    /// Either `.` or `,` may be the decimal separator: the last separator is
    /// taken as decimal when one or two digits follow it, and as a grouping
    /// separator otherwise. Every other non-numeric character (currency
    /// symbols, spaces) is ignored. Input with no digits, or too large to
    /// represent, parses as zero.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        parse_cents(input).map_or(Self::ZERO, Self)
    }

    /// Renders the amount with the given currency conventions.
    #[must_use]
    pub fn format(self, currency: &CurrencyFormat) -> String {
        let abs = self.0.unsigned_abs();
        let units = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, ch) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(currency.grouping_separator);
            }
            grouped.push(ch);
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        let number = format!("{grouped}{}{cents:02}", currency.decimal_separator);
        match currency.symbol_position {
            SymbolPosition::Before => format!("{sign}{} {number}", currency.symbol),
            SymbolPosition::After => format!("{sign}{number} {}", currency.symbol),
        }
    }
}

fn parse_cents(input: &str) -> Option<i64> {
    let negative = input.chars().find(|c| c.is_ascii_digit() || *c == '-') == Some('-');

    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let cleaned = cleaned.trim_matches(['.', ',']);
    if cleaned.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match cleaned.rfind(['.', ',']) {
        Some(pos) if (1..=2).contains(&(cleaned.len() - pos - 1)) => {
            (&cleaned[..pos], &cleaned[pos + 1..])
        }
        _ => (cleaned, ""),
    };

    let mut units: i64 = 0;
    for digit in int_part.chars().filter_map(|c| c.to_digit(10)) {
        units = units.checked_mul(10)?.checked_add(i64::from(digit))?;
    }

    let frac: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse::<i64>().ok()?,
    };

    let cents = units.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Where the currency symbol goes relative to the number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolPosition {
    /// `$ 1,234.56`
    Before,
    /// `1 234,56 MT`
    After,
}

/// Currency rendering conventions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    /// ISO 4217 code
    pub code: String,
    /// Symbol printed next to the number
    pub symbol: String,
    /// Where the symbol goes
    pub symbol_position: SymbolPosition,
    /// Thousands separator
    pub grouping_separator: char,
    /// Decimal separator, `.` or `,`
    pub decimal_separator: char,
}

impl Default for CurrencyFormat {
    /// Mozambican metical, `1 234,56 MT`.
    fn default() -> Self {
        Self {
            code: "MZN".to_string(),
            symbol: "MT".to_string(),
            symbol_position: SymbolPosition::After,
            grouping_separator: ' ',
            decimal_separator: ',',
        }
    }
}

impl CurrencyFormat {
    /// Checks that formatted values can be parsed back.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if !matches!(self.decimal_separator, '.' | ',') {
            return Err(crate::errors::Error::validation(
                "decimal_separator",
                "must be '.' or ','",
            ));
        }
        if self.grouping_separator == self.decimal_separator
            || self.grouping_separator.is_ascii_digit()
        {
            return Err(crate::errors::Error::validation(
                "grouping_separator",
                "must differ from the decimal separator and not be a digit",
            ));
        }
        if self.symbol.chars().any(|c| c.is_ascii_digit()) {
            return Err(crate::errors::Error::validation(
                "symbol",
                "must not contain digits",
            ));
        }
        Ok(())
    }
}
