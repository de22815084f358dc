// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Subscriber-facing subscription commands.
//!
//! Everything a subscriber can do to an existing subscription besides
//! paying: read its status, stop or resume auto-renewal, and detach the
//! saved payment method. Guards are checked before any write, so a
//! rejected command changes nothing.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::storage::{JsonStorage, StorageError, SubscriptionRecord, SubscriptionRepository};

/// Errors surfaced to the caller of a subscriber command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no subscription on file")]
    NoSubscription,
    #[error("subscription has expired; auto-renew cannot be resumed")]
    SubscriptionExpired,
    #[error("no saved payment method; auto-renew cannot be resumed")]
    MissingPaymentMethod,
    #[error(transparent)]
    Store(#[from] StorageError),
}

/// Command handlers over the subscription store.
pub struct SubscriberCommands {
    storage: Arc<JsonStorage>,
}

impl SubscriberCommands {
    pub fn new(storage: Arc<JsonStorage>) -> Self {
        Self { storage }
    }

    /// Current subscription state, with entitlement re-checked against now.
    ///
    /// Creates a blank record on first contact.
    pub fn subscription_status(
        &self,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, CommandError> {
        let repo = SubscriptionRepository::new(&self.storage);
        repo.ensure(subscriber_id)?;
        Ok(repo.refresh_entitlement(subscriber_id, now)?)
    }

    /// Turn auto-renewal off. No-op if it is already off.
    pub fn stop_auto_renew(&self, subscriber_id: &str) -> Result<SubscriptionRecord, CommandError> {
        let repo = SubscriptionRepository::new(&self.storage);
        let record = match repo.get(subscriber_id) {
            Ok(record) => record,
            Err(StorageError::NotFound(_)) => return Err(CommandError::NoSubscription),
            Err(e) => return Err(e.into()),
        };

        if !record.auto_renew {
            return Ok(record);
        }
        Ok(repo.disable_auto_renew(subscriber_id)?)
    }

    /// Turn auto-renewal back on.
    ///
    /// Only allowed while the paid period is still running and a saved
    /// payment method exists; a rejected resume changes no fields.
    pub fn resume_auto_renew(
        &self,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, CommandError> {
        let repo = SubscriptionRepository::new(&self.storage);
        let mut record = match repo.get(subscriber_id) {
            Ok(record) => record,
            Err(StorageError::NotFound(_)) => return Err(CommandError::NoSubscription),
            Err(e) => return Err(e.into()),
        };

        let Some(valid_until) = record.valid_until else {
            return Err(CommandError::SubscriptionExpired);
        };
        if !record.active || valid_until <= now {
            return Err(CommandError::SubscriptionExpired);
        }
        if record.payment_method_id.is_none() {
            return Err(CommandError::MissingPaymentMethod);
        }

        if record.auto_renew {
            return Ok(record);
        }

        record.auto_renew = true;
        record.next_charge = Some(valid_until);
        Ok(repo.update(&record)?)
    }

    /// Forget the saved payment method; auto-renew is forced off, the paid
    /// period keeps running.
    pub fn detach_payment_method(
        &self,
        subscriber_id: &str,
    ) -> Result<SubscriptionRecord, CommandError> {
        let repo = SubscriptionRepository::new(&self.storage);
        match repo.detach_payment_method(subscriber_id) {
            Ok(record) => Ok(record),
            Err(StorageError::NotFound(_)) => Err(CommandError::NoSubscription),
            Err(e) => Err(e.into()),
        }
    }
}
