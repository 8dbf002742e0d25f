//! Recipient registry: the durable set of known recipients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::sync::Mutex;

use crate::store::RecipientStore;
use castline_core::error::{CastlineError, Result};
use castline_core::NumberingPlan;

/// A known recipient, keyed by its canonical number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub canonical_number: String,
    pub first_seen: DateTime<Utc>,
    #[serde(default)]
    pub last_messaged: Option<DateTime<Utc>>,
}

/// Registry of recipients backed by a [`RecipientStore`].
///
/// Every mutation is a read-modify-write under one lock: the new state is
/// persisted first and only committed in memory once the write succeeded.
pub struct RecipientRegistry {
    store: RecipientStore,
    plan: NumberingPlan,
    entries: Mutex<BTreeMap<String, Recipient>>,
}

impl RecipientRegistry {
    /// Open the registry at `path`, loading any persisted recipients.
    pub async fn open(path: &Path, plan: NumberingPlan) -> Self {
        let store = RecipientStore::new(path);
        let mut entries = BTreeMap::new();
        for recipient in store.load().await {
            if plan.is_canonical(&recipient.canonical_number) {
                entries.insert(recipient.canonical_number.clone(), recipient);
            } else {
                tracing::warn!(
                    "Skipping non-canonical stored recipient {}",
                    recipient.canonical_number
                );
            }
        }
        tracing::info!("📇 Recipient registry loaded: {} recipient(s)", entries.len());
        Self {
            store,
            plan,
            entries: Mutex::new(entries),
        }
    }

    /// Insert `number` with the current timestamp. No-op if already present.
    pub async fn add(&self, number: &str) -> Result<()> {
        self.ensure_canonical(number)?;
        let mut entries = self.entries.lock().await;
        if entries.contains_key(number) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.insert(
            number.to_string(),
            Recipient {
                canonical_number: number.to_string(),
                first_seen: Utc::now(),
                last_messaged: None,
            },
        );
        self.commit(&mut entries, next).await?;
        tracing::info!("➕ Recipient added: {number}");
        Ok(())
    }

    /// Remove `number`. No-op if absent.
    pub async fn remove(&self, number: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(number) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(number);
        self.commit(&mut entries, next).await?;
        tracing::info!("➖ Recipient removed: {number}");
        Ok(())
    }

    /// Record a dispatch attempt (successful or not) for a known recipient.
    pub async fn touch(&self, number: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(number) {
            return Ok(());
        }
        let mut next = entries.clone();
        if let Some(recipient) = next.get_mut(number) {
            recipient.last_messaged = Some(Utc::now());
        }
        self.commit(&mut entries, next).await
    }

    /// Snapshot of every known canonical number.
    pub async fn list(&self) -> BTreeSet<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    pub async fn get(&self, number: &str) -> Option<Recipient> {
        self.entries.lock().await.get(number).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn ensure_canonical(&self, number: &str) -> Result<()> {
        if self.plan.is_canonical(number) {
            Ok(())
        } else {
            Err(CastlineError::InvalidNumber(number.to_string()))
        }
    }

    async fn commit(
        &self,
        entries: &mut BTreeMap<String, Recipient>,
        next: BTreeMap<String, Recipient>,
    ) -> Result<()> {
        let snapshot: Vec<Recipient> = next.values().cloned().collect();
        self.store.save(&snapshot).await?;
        *entries = next;
        Ok(())
    }
}
