//! Seams to external collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DirectoryEntry, Payload};

/// A messaging channel able to deliver one payload to one recipient.
///
/// Implementations are driven through `castline_channels::Session`, which
/// serializes sends and tracks the lifecycle; they never see concurrent calls.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Establish and verify the channel session.
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    /// Send a payload to a canonical recipient number.
    async fn send(&self, recipient: &str, payload: &Payload) -> Result<()>;
}

/// Read-only customer directory.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn fetch(&self) -> Result<Vec<DirectoryEntry>>;
}
