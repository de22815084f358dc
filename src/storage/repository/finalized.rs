// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Finalized payment markers.
//!
//! One marker file per gateway payment id, written when a payment has been
//! applied to a subscription. The poller and the webhook path both finalize
//! through this set, so a payment observed by both is applied exactly once.
//! Keyed by payment id, not subscriber id: one subscriber can have several
//! distinct payments in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{JsonStorage, StorageResult};

/// Marker recording that a payment was applied to a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalizedPayment {
    pub payment_id: String,
    pub subscriber_id: String,
    pub finalized_at: DateTime<Utc>,
}

/// Repository for the finalized payment-id set.
pub struct FinalizedPaymentRepository<'a> {
    storage: &'a JsonStorage,
}

impl<'a> FinalizedPaymentRepository<'a> {
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Whether a payment id has already been finalized.
    pub fn is_finalized(&self, payment_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().finalized_payment(payment_id))
    }

    /// Record a payment as finalized.
    ///
    /// Returns `false` if the payment was already marked, in which case the
    /// caller must not apply it again.
    pub fn mark(&self, payment_id: &str, subscriber_id: &str) -> StorageResult<bool> {
        if self.is_finalized(payment_id) {
            return Ok(false);
        }

        let marker = FinalizedPayment {
            payment_id: payment_id.to_string(),
            subscriber_id: subscriber_id.to_string(),
            finalized_at: Utc::now(),
        };
        self.storage
            .write_json(self.storage.paths().finalized_payment(payment_id), &marker)?;
        Ok(true)
    }

    /// Release the claim on a payment id.
    ///
    /// Used when applying the payment failed after the claim was taken; the
    /// next poll or webhook redelivery must be able to retry, otherwise a
    /// paid charge would never be credited.
    pub fn clear(&self, payment_id: &str) -> StorageResult<()> {
        if !self.is_finalized(payment_id) {
            return Ok(());
        }
        self.storage
            .delete(self.storage.paths().finalized_payment(payment_id))
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
    fn mark_returns_true_once_then_false() {
        let (_dir, storage) = test_storage();
        let repo = FinalizedPaymentRepository::new(&storage);

        assert!(!repo.is_finalized("pay-1"));
        assert!(repo.mark("pay-1", "sub-1").unwrap());
        assert!(repo.is_finalized("pay-1"));
        assert!(!repo.mark("pay-1", "sub-1").unwrap());
    }

    #[test]
    fn markers_are_per_payment_not_per_subscriber() {
        let (_dir, storage) = test_storage();
        let repo = FinalizedPaymentRepository::new(&storage);

        assert!(repo.mark("pay-1", "sub-1").unwrap());
        assert!(repo.mark("pay-2", "sub-1").unwrap());
    }

    #[test]
    fn clear_releases_the_claim() {
        let (_dir, storage) = test_storage();
        let repo = FinalizedPaymentRepository::new(&storage);

        assert!(repo.mark("pay-1", "sub-1").unwrap());
        repo.clear("pay-1").unwrap();
        assert!(!repo.is_finalized("pay-1"));
        assert!(repo.mark("pay-1", "sub-1").unwrap());

        // Clearing an unknown id is a no-op.
        repo.clear("pay-9").unwrap();
    }
}
