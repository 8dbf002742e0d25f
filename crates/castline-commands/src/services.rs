//! Shared collaborators available to every handler.

use castline_channels::Session;
use castline_core::NumberingPlan;
use castline_core::traits::RecipientDirectory;
use castline_core::types::DirectoryEntry;
use castline_scheduler::{BroadcastDispatcher, RecipientRegistry};
use castline_security::Allowlist;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::command::CommandSyntax;

pub struct Services {
    pub session: Arc<Session>,
    pub registry: Arc<RecipientRegistry>,
    pub allowlist: Arc<Allowlist>,
    pub directory: Option<Arc<dyn RecipientDirectory>>,
    pub dispatcher: Arc<BroadcastDispatcher>,
    pub numbering: NumberingPlan,
    pub syntax: CommandSyntax,
    /// Header prepended to broadcast text.
    pub broadcast_prefix: String,
    pub directory_timeout: Duration,
}

impl Services {
    /// Directory entries, or an empty list when the directory is absent,
    /// failing or slower than `directory_timeout`.
    pub async fn directory_entries(&self) -> Vec<DirectoryEntry> {
        let Some(directory) = &self.directory else {
            return Vec::new();
        };
        match tokio::time::timeout(self.directory_timeout, directory.fetch()).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                tracing::warn!("Directory lookup failed, continuing without it: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Directory lookup timed out after {} ms, continuing without it",
                    self.directory_timeout.as_millis()
                );
                Vec::new()
            }
        }
    }

    /// Directory ∪ registry ∪ operators, canonical and deduplicated, in that order.
    /// Directory numbers that fail canonicalization are excluded individually.
    pub async fn broadcast_recipients(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();

        for entry in self.directory_entries().await {
            match self.numbering.canonicalize(&entry.phone) {
                Ok(number) => {
                    if seen.insert(number.clone()) {
                        recipients.push(number);
                    }
                }
                Err(e) => tracing::warn!("Excluding {} ({}): {e}", entry.name, entry.phone),
            }
        }
        for number in self.registry.list().await {
            if seen.insert(number.clone()) {
                recipients.push(number);
            }
        }
        for number in self.allowlist.operators() {
            if seen.insert(number.to_string()) {
                recipients.push(number.to_string());
            }
        }
        recipients
    }
}
