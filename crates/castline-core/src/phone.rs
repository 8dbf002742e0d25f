//! Phone-number canonicalization.
//!
//! Every number that reaches the registry or the messaging gateway goes
//! through [`NumberingPlan::canonicalize`]. The plan is data, so other
//! countries plug in by configuration:
//!
//! ```text
//! "+54 9 11 2233-4455" ─┐
//! "011 2233 4455"      ─┼─► "5491122334455"
//! "541122334455"       ─┘
//! ```
//!
//! Rules, applied in order:
//! 1. keep digits only (a leading `+` and any punctuation are dropped)
//! 2. drop leading zeros (trunk prefix)
//! 3. prepend the country prefix when it is missing
//! 4. insert the mobile marker right after the country prefix when missing
//! 5. require `prefix + marker + >= min_subscriber_digits` and `>= min_length` digits
//!
//! A number that already carries prefix and marker is left untouched, which
//! makes the function idempotent. Local mobile prefixes such as Argentina's
//! `15` are not rewritten.

use serde::{Deserialize, Serialize};

use crate::error::{CastlineError, Result};

/// Country-specific mobile numbering rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingPlan {
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,
    /// Digit(s) inserted after the country prefix for mobile numbers.
    #[serde(default = "default_mobile_marker")]
    pub mobile_marker: String,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_min_subscriber_digits")]
    pub min_subscriber_digits: usize,
}

fn default_country_prefix() -> String { "54".into() }
fn default_mobile_marker() -> String { "9".into() }
fn default_min_length() -> usize { 10 }
fn default_min_subscriber_digits() -> usize { 8 }

impl Default for NumberingPlan {
    fn default() -> Self {
        Self {
            country_prefix: default_country_prefix(),
            mobile_marker: default_mobile_marker(),
            min_length: default_min_length(),
            min_subscriber_digits: default_min_subscriber_digits(),
        }
    }
}

impl NumberingPlan {
    /// Normalize `input` into the canonical dialable form.
    pub fn canonicalize(&self, input: &str) -> Result<String> {
        let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
        let mut number = digits.trim_start_matches('0').to_string();

        if !number.starts_with(&self.country_prefix) {
            number.insert_str(0, &self.country_prefix);
        }

        let mobile_prefix = self.mobile_prefix();
        if !number.starts_with(&mobile_prefix) {
            number.insert_str(self.country_prefix.len(), &self.mobile_marker);
        }

        if self.is_canonical(&number) {
            Ok(number)
        } else {
            Err(CastlineError::InvalidNumber(input.to_string()))
        }
    }

    /// Whether `number` already has the canonical shape.
    pub fn is_canonical(&self, number: &str) -> bool {
        let Some(subscriber) = number.strip_prefix(&self.mobile_prefix()) else {
            return false;
        };
        number.len() >= self.min_length
            && subscriber.len() >= self.min_subscriber_digits
            && subscriber.chars().all(|c| c.is_ascii_digit())
    }

    fn mobile_prefix(&self) -> String {
        format!("{}{}", self.country_prefix, self.mobile_marker)
    }
}
