// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Subscription record repository.
//!
//! One record per subscriber, stored as a JSON file under
//! `/data/subscriptions/`. Records are never hard-deleted; an expired
//! subscription simply has `active = false`. Every write re-validates the
//! record invariants so a bug in a flow cannot persist an inconsistent
//! state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{JsonStorage, StorageError, StorageResult};

/// Persisted subscription state for one subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SubscriptionRecord {
    /// Opaque stable subscriber identifier (primary key).
    pub subscriber_id: String,
    /// True while the paid period has not elapsed.
    pub active: bool,
    /// End of the currently paid period; null only if never subscribed.
    pub valid_until: Option<DateTime<Utc>>,
    /// Gateway token for the saved payment method; precondition for auto-renew.
    pub payment_method_id: Option<String>,
    /// True only if the subscriber opted in and a usable saved method exists.
    pub auto_renew: bool,
    /// When the next automatic charge should be attempted; set iff auto_renew.
    pub next_charge: Option<DateTime<Utc>>,
    /// Phone number required by the gateway for fiscal receipts.
    pub phone: Option<String>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Blank record created on first contact.
    pub fn new_blank(subscriber_id: &str) -> Self {
        let now = Utc::now();
        Self {
            subscriber_id: subscriber_id.to_string(),
            active: false,
            valid_until: None,
            payment_method_id: None,
            auto_renew: false,
            next_charge: None,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record invariants.
    ///
    /// - `auto_renew` requires a saved payment method and a `next_charge`.
    /// - An inactive record must have auto-renew off and no `next_charge`.
    pub fn validate(&self) -> StorageResult<()> {
        if self.auto_renew && self.payment_method_id.is_none() {
            return Err(StorageError::Invariant(format!(
                "subscriber {}: auto_renew set without a payment method",
                self.subscriber_id
            )));
        }
        if self.auto_renew && self.next_charge.is_none() {
            return Err(StorageError::Invariant(format!(
                "subscriber {}: auto_renew set without a next_charge",
                self.subscriber_id
            )));
        }
        if !self.active && self.auto_renew {
            return Err(StorageError::Invariant(format!(
                "subscriber {}: auto_renew set on an inactive subscription",
                self.subscriber_id
            )));
        }
        if !self.auto_renew && self.next_charge.is_some() {
            return Err(StorageError::Invariant(format!(
                "subscriber {}: next_charge set without auto_renew",
                self.subscriber_id
            )));
        }
        Ok(())
    }

    /// Whether the paid period covers the given instant.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        self.active && self.valid_until.is_some_and(|until| until > now)
    }
}

/// Repository for subscription record operations.
pub struct SubscriptionRepository<'a> {
    storage: &'a JsonStorage,
}

impl<'a> SubscriptionRepository<'a> {
    pub fn new(storage: &'a JsonStorage) -> Self {
        Self { storage }
    }

    /// Check if a subscription record exists.
    pub fn exists(&self, subscriber_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().subscription(subscriber_id))
    }

    /// Get a subscription record by subscriber id.
    pub fn get(&self, subscriber_id: &str) -> StorageResult<SubscriptionRecord> {
        let path = self.storage.paths().subscription(subscriber_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!(
                "Subscription {subscriber_id}"
            )));
        }
        self.storage.read_json(path)
    }

    /// Get the record for a subscriber, creating a blank one on first contact.
    pub fn ensure(&self, subscriber_id: &str) -> StorageResult<SubscriptionRecord> {
        if self.exists(subscriber_id) {
            return self.get(subscriber_id);
        }
        let record = SubscriptionRecord::new_blank(subscriber_id);
        self.storage
            .write_json(self.storage.paths().subscription(subscriber_id), &record)?;
        Ok(record)
    }

    /// Replace a subscription record, validating invariants first.
    ///
    /// `valid_until` must never decrease across writes for the same
    /// subscriber. Returns the record as persisted, with the refreshed
    /// `updated_at`.
    pub fn update(&self, record: &SubscriptionRecord) -> StorageResult<SubscriptionRecord> {
        record.validate()?;

        if let Ok(existing) = self.get(&record.subscriber_id) {
            if let (Some(old), Some(new)) = (existing.valid_until, record.valid_until) {
                if new < old {
                    return Err(StorageError::Invariant(format!(
                        "subscriber {}: valid_until would decrease",
                        record.subscriber_id
                    )));
                }
            }
        }

        let mut record = record.clone();
        record.updated_at = Utc::now();
        self.storage
            .write_json(self.storage.paths().subscription(&record.subscriber_id), &record)?;
        Ok(record)
    }

    /// Store the subscriber's phone number.
    pub fn set_phone(&self, subscriber_id: &str, phone: &str) -> StorageResult<SubscriptionRecord> {
        let mut record = self.ensure(subscriber_id)?;
        record.phone = Some(phone.to_string());
        self.update(&record)
    }

    /// Turn auto-renew off, clearing the scheduled charge.
    pub fn disable_auto_renew(&self, subscriber_id: &str) -> StorageResult<SubscriptionRecord> {
        let mut record = self.get(subscriber_id)?;
        record.auto_renew = false;
        record.next_charge = None;
        self.update(&record)
    }

    /// Clear the saved payment method; auto-renew cannot survive that.
    pub fn detach_payment_method(&self, subscriber_id: &str) -> StorageResult<SubscriptionRecord> {
        let mut record = self.get(subscriber_id)?;
        record.payment_method_id = None;
        record.auto_renew = false;
        record.next_charge = None;
        self.update(&record)
    }

    /// Re-check entitlement against the clock, expiring the record in place
    /// when `valid_until` has passed.
    ///
    /// Expiry is detected lazily here rather than by a sweep; an expired
    /// record also loses auto-renew so the invariants keep holding.
    pub fn refresh_entitlement(
        &self,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<SubscriptionRecord> {
        let mut record = self.get(subscriber_id)?;
        if record.active && !record.is_entitled(now) {
            record.active = false;
            record.auto_renew = false;
            record.next_charge = None;
            record = self.update(&record)?;
        }
        Ok(record)
    }

    /// Scan for subscriptions due for an automatic charge.
    ///
    /// Selects records where the subscription is active with auto-renew on,
    /// a saved method and phone are on file, and `next_charge` has arrived.
    pub fn list_due(&self, now: DateTime<Utc>) -> StorageResult<Vec<SubscriptionRecord>> {
        let subscriber_ids = self
            .storage
            .list_files(self.storage.paths().subscriptions_dir(), "json")?;

        let mut due = Vec::new();
        for id in subscriber_ids {
            if let Ok(record) = self.get(&id) {
                if record.active
                    && record.auto_renew
                    && record.payment_method_id.is_some()
                    && record.phone.is_some()
                    && record.next_charge.is_some_and(|at| at <= now)
                {
                    due.push(record);
                }
            }
        }

        Ok(due)
    }
}
