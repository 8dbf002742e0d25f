//! Message and directory types exchanged between components.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Content delivered to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    /// A local media asset sent as a document with a caption.
    Media { media_ref: PathBuf, caption: String },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn media(media_ref: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self::Media {
            media_ref: media_ref.into(),
            caption: caption.into(),
        }
    }

    /// Visible text of the payload (the caption for media).
    pub fn preview(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Media { caption, .. } => caption,
        }
    }
}

/// A message received from the channel, before sender canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-specific sender id, possibly with an addressing suffix (`...@c.us`).
    pub sender_raw_id: String,
    pub text: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

impl InboundMessage {
    /// Sender id with the channel addressing suffix removed.
    pub fn sender_address(&self) -> &str {
        strip_addressing(&self.sender_raw_id)
    }
}

/// Remove a channel addressing suffix such as `@c.us` or `@s.whatsapp.net`.
pub fn strip_addressing(raw: &str) -> &str {
    raw.split('@').next().unwrap_or(raw).trim()
}

/// An entry returned by the external customer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub phone: String,
    pub name: String,
    pub status: String,
}
