//! File-based recipient store.
//! Recipients saved as a JSON array: human-readable and easy to back up.
//! Only written on mutation, never on read.

use crate::registry::Recipient;
use castline_core::error::Result;
use std::path::{Path, PathBuf};

/// JSON file holding the recipient registry.
pub struct RecipientStore {
    path: PathBuf,
}

impl RecipientStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Replace the file contents with `recipients`.
    /// Written to a sibling temp file first so a crash never leaves half a file.
    pub async fn save(&self, recipients: &[Recipient]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(recipients)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("💾 Saved {} recipients to {}", recipients.len(), self.path.display());
        Ok(())
    }

    /// Load recipients from disk.
    /// A missing file is an empty registry; an unreadable or corrupted one is
    /// logged and also treated as empty.
    pub async fn load(&self) -> Vec<Recipient> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::error!(
                    "⚠️ Corrupted recipient store {} ({e}), starting with an empty registry",
                    self.path.display()
                );
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::error!(
                    "⚠️ Failed to read recipient store {} ({e}), starting with an empty registry",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }
}
