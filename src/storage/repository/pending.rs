// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Pending payment initiations awaiting a phone number.
//!
//! When a subscriber starts a payment without a phone on file, the flow
//! suspends and persists this record. Persisting it (instead of holding an
//! in-memory flag) means a process restart does not strand the subscriber:
//! the phone they supply later still resumes the payment. Records expire so
//! a phone supplied weeks later does not trigger a surprise charge.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::super::{JsonStorage, StorageResult};

/// How long a suspended initiation stays resumable.
pub const PENDING_TTL_HOURS: i64 = 24;

/// A payment initiation suspended while waiting for the phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingInitiation {
    pub subscriber_id: String,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingInitiation {
    pub fn new(subscriber_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            subscriber_id: subscriber_id.to_string(),
            requested_at: now,
            expires_at: now + Duration::hours(PENDING_TTL_HOURS),
        }
    }
}

/// Repository for pending initiation records.
pub struct PendingInitiationRepository<'a> {
    storage: &'a JsonStorage,
}

impl<'a> PendingInitiationRepository<'a> {
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Persist a suspension for a subscriber, replacing any previous one.
    pub fn put(&self, subscriber_id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        let record = PendingInitiation::new(subscriber_id, now);
        self.storage.write_json(
            self.storage.paths().pending_initiation(subscriber_id),
            &record,
        )
    }

    /// Consume the pending record for a subscriber, if one is still live.
    ///
    /// The record is deleted either way; an expired one yields `None`.
    pub fn take(
        &self,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<PendingInitiation>> {
        let path = self.storage.paths().pending_initiation(subscriber_id);
        if !self.storage.exists(&path) {
            return Ok(None);
        }

        let record: PendingInitiation = self.storage.read_json(&path)?;
        self.storage.delete(&path)?;

        if record.expires_at <= now {
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonStorage, StoragePaths};
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, JsonStorage) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        (dir, storage)
    }

    #[test]
    fn take_consumes_live_record() {
        let (_dir, storage) = test_storage();
        let repo = PendingInitiationRepository::new(&storage);

        let now = Utc::now();
        repo.put("sub-1", now).unwrap();

        let taken = repo.take("sub-1", now + Duration::hours(1)).unwrap();
        assert!(taken.is_some());

        // Consumed: a second take finds nothing.
        assert!(repo.take("sub-1", now).unwrap().is_none());
    }

    #[test]
    fn take_drops_expired_record() {
        let (_dir, storage) = test_storage();
        let repo = PendingInitiationRepository::new(&storage);

        let now = Utc::now();
        repo.put("sub-1", now).unwrap();

        let taken = repo
            .take("sub-1", now + Duration::hours(PENDING_TTL_HOURS + 1))
            .unwrap();
        assert!(taken.is_none());
    }

    #[test]
    fn take_without_record_is_none() {
        let (_dir, storage) = test_storage();
        let repo = PendingInitiationRepository::new(&storage);

        assert!(repo.take("missing", Utc::now()).unwrap().is_none());
    }
}
