//! Canonical quantities.
//!
//! The analyzer reports amounts as free text ("500g", "2 kg", "1l", "3") or as bare
//! numbers. Everything is folded into one of three canonical units at parse time.

use std::fmt;

use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Canonical units. No other unit survives parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Unit {
    G,
    Ml,
    #[default]
    Pcs,
}

/// A normalized amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Quantity {
    #[garde(range(min = 0.0))]
    pub value: f64,
    #[garde(skip)]
    pub unit: Unit,
}

impl Default for Quantity {
    fn default() -> Self {
        Self { value: 1.0, unit: Unit::Pcs }
    }
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Parse a freeform quantity string into canonical form.
    ///
    /// The unit is the alphabetic token right after the number, matched exactly and
    /// case-insensitively (`kg`, `mg`, `ml`, `l`, `g` and their spelled-out forms).
    /// Any other token, such as `eggs` or `cloves`, counts pieces.
    /// An unparseable number degrades to `0` rather than failing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (number, rest) = split_numeric_prefix(trimmed);
        let mut value = match number.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                tracing::debug!(raw = %raw, "Unparseable quantity, defaulting to 0");
                0.0
            }
        };

        let token = unit_token(rest);
        let unit = match token.as_str() {
            "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => {
                value *= 1000.0;
                Unit::G
            }
            "mg" | "milligram" | "milligrams" => {
                value /= 1000.0;
                Unit::G
            }
            "ml" | "mls" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => Unit::Ml,
            "l" | "ltr" | "ltrs" | "litre" | "litres" | "liter" | "liters" => {
                value *= 1000.0;
                Unit::Ml
            }
            "g" | "gm" | "gms" | "gram" | "grams" => Unit::G,
            _ => Unit::Pcs,
        };

        Self { value, unit }
    }

    /// Multiply the value, keeping the unit.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            value: self.value * factor,
            unit: self.unit,
        }
    }

    /// Wire form: `"<value> <unit>"`.
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A bare number is a piece count.
impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self { value, unit: Unit::Pcs }
    }
}

impl From<&str> for Quantity {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Quantity as it arrives from the analyzer: either text or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
}

impl RawQuantity {
    pub fn normalize(&self) -> Quantity {
        match self {
            RawQuantity::Number(n) => Quantity::from(*n),
            RawQuantity::Text(s) => Quantity::parse(s),
        }
    }
}

impl fmt::Display for RawQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawQuantity::Number(n) => write!(f, "{}", n),
            RawQuantity::Text(s) => f.write_str(s),
        }
    }
}

/// First run of letters after the number, lowercased: `"500 Grams pack"` → `"grams"`.
fn unit_token(rest: &str) -> String {
    rest.trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split off the leading decimal literal (optional sign, digits, one dot).
fn split_numeric_prefix(s: &str) -> (&str, &str) {
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;

    for (i, ch) in s.char_indices() {
        match ch {
            '+' | '-' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            c if c.is_ascii_digit() => seen_digit = true,
            _ => break,
        }
        end = i + ch.len_utf8();
    }

    if !seen_digit {
        return ("", s);
    }
    (&s[..end], &s[end..])
}
