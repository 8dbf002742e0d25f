//! Authorized-operator allowlist.
//!
//! Controls which senders may issue commands. The operator set is fixed at
//! startup and every operator is also an implicit broadcast recipient.

use castline_core::error::{CastlineError, Result};
use castline_core::CastlineConfig;
use std::collections::BTreeSet;

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// A canonical phone number from the inbound message path.
    Number(String),
    /// The HTTP control surface, already authenticated by its API key.
    ControlApi,
}

impl Sender {
    pub fn label(&self) -> &str {
        match self {
            Self::Number(n) => n,
            Self::ControlApi => "control-api",
        }
    }
}

/// Immutable set of canonical operator numbers.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    operators: BTreeSet<String>,
}

impl Allowlist {
    /// Create an allowlist from already-canonical numbers.
    pub fn new<I, S>(operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operators: operators.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from configuration, canonicalizing each configured operator.
    pub fn from_config(config: &CastlineConfig) -> Result<Self> {
        Ok(Self::new(config.canonical_operators()?))
    }

    pub fn is_operator(&self, number: &str) -> bool {
        self.operators.contains(number)
    }

    /// Check that `sender` may execute commands.
    pub fn authorize(&self, sender: &Sender) -> Result<()> {
        match sender {
            Sender::ControlApi => Ok(()),
            Sender::Number(n) if self.is_operator(n) => Ok(()),
            Sender::Number(n) => {
                tracing::warn!("🚫 Access denied to {n}");
                Err(CastlineError::Unauthorized(n.clone()))
            }
        }
    }

    /// Operators in stable order.
    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.operators.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
