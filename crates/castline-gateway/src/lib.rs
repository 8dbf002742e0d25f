//! # Castline Gateway
//!
//! HTTP control surface (`/send`, status endpoints) and the WhatsApp webhook
//! that feeds inbound messages into the command router.

pub mod error;
pub mod inbound;
pub mod routes;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use inbound::handle_inbound;
pub use server::{AppState, build_router, serve};
