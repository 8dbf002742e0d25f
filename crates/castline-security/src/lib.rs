//! # Castline Security
//! Sender authorization.

pub mod allowlist;

pub use allowlist::{Allowlist, Sender};
