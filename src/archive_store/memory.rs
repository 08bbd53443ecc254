//! In-process archive store
//!
//! Records live in a `DashMap`; the entry API locks the key's shard for the
//! check-and-insert, which makes `put_if_absent` atomic across tasks.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{ArchiveRecord, ArchiveStore, PutOutcome, StoreError, sanitize_content_type};
use crate::fingerprint::Fingerprint;

#[derive(Debug, Default)]
pub struct InMemoryArchiveStore {
    records: DashMap<Fingerprint, ArchiveRecord>,
}

impl InMemoryArchiveStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys currently stored, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<Fingerprint> {
        let mut keys: Vec<_> = self.records.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArchiveStore for InMemoryArchiveStore {
    async fn head(&self, key: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(key))
    }

    async fn put_if_absent(
        &self,
        key: &Fingerprint,
        content: &[u8],
        content_type: &str,
    ) -> Result<PutOutcome, StoreError> {
        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(ArchiveRecord {
                    fingerprint: key.clone(),
                    content: content.to_vec(),
                    content_type: sanitize_content_type(content_type),
                    archived_at: Utc::now(),
                });
                Ok(PutOutcome::Created)
            }
        }
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<ArchiveRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }
}
