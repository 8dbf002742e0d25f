//! # Castline Channels
//! Messaging channel, its session handle, and the customer directory client.

pub mod directory;
pub mod session;
pub mod whatsapp;

pub use directory::HttpDirectory;
pub use session::{Session, SessionEvent, SessionState};
pub use whatsapp::WhatsAppGateway;
