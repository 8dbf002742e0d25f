//! # Castline Core
//!
//! Shared building blocks for the broadcast controller:
//! configuration, the error taxonomy, phone-number canonicalization,
//! the gateway/directory traits and the shutdown signal.

pub mod config;
pub mod error;
pub mod phone;
pub mod shutdown;
pub mod traits;
pub mod types;

pub use config::CastlineConfig;
pub use error::{CastlineError, Result};
pub use phone::NumberingPlan;
pub use shutdown::Shutdown;
