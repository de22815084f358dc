// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Payment finalization.
//!
//! Turns a succeeded gateway payment into subscription time. Both
//! confirmation paths (status poller and webhook) and renewal charges call
//! this, so it is idempotent per payment id: the finalized-payment marker
//! is claimed before any record mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::notify::{Notice, Notifier};
use crate::providers::GatewayPayment;
use crate::storage::{
    FinalizedPaymentRepository, JsonStorage, StorageResult, SubscriptionRecord,
    SubscriptionRepository,
};

/// What finalization did with the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The payment was applied and the subscription extended.
    Applied,
    /// Another path already applied this payment; nothing was changed.
    AlreadyFinalized,
}

/// Applies succeeded payments to subscription records.
pub struct PaymentFinalizer {
    storage: Arc<JsonStorage>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
}

impl PaymentFinalizer {
    pub fn new(storage: Arc<JsonStorage>, notifier: Arc<dyn Notifier>, period_days: i64) -> Self {
        Self {
            storage,
            notifier,
            period: Duration::days(period_days),
        }
    }

    /// Apply a succeeded payment to the subscriber's record.
    ///
    /// The new validity window always starts from now; a payment shortly
    /// before expiry does not stack onto the remaining time. `renewal`
    /// selects the notice wording and lets a recurring charge that omits
    /// method details keep the method already on file.
    pub async fn finalize(
        &self,
        subscriber_id: &str,
        payment: &GatewayPayment,
        renewal: bool,
    ) -> StorageResult<FinalizeOutcome> {
        let finalized = FinalizedPaymentRepository::new(&self.storage);
        if !finalized.mark(&payment.id, subscriber_id)? {
            info!(
                payment_id = %payment.id,
                subscriber_id = %subscriber_id,
                "Payment already finalized, skipping"
            );
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        let new_valid_until = Utc::now() + self.period;
        let record = match self.apply(subscriber_id, payment, renewal, new_valid_until) {
            Ok(record) => record,
            Err(e) => {
                // The record write failed, so the claim must not stand: a
                // later poll or webhook redelivery has to be able to credit
                // this payment.
                if let Err(release_err) = finalized.clear(&payment.id) {
                    error!(
                        payment_id = %payment.id,
                        error = %release_err,
                        "Failed to release finalized marker after store error"
                    );
                }
                return Err(e);
            }
        };

        info!(
            payment_id = %payment.id,
            subscriber_id = %subscriber_id,
            valid_until = %new_valid_until,
            auto_renew = record.auto_renew,
            renewal,
            "Payment finalized"
        );

        let notice = match (renewal, record.next_charge) {
            (true, Some(next_charge)) => Notice::SubscriptionRenewed {
                valid_until: new_valid_until,
                next_charge,
            },
            _ => Notice::SubscriptionActivated {
                valid_until: new_valid_until,
            },
        };
        self.notifier.notify(subscriber_id, notice).await;

        Ok(FinalizeOutcome::Applied)
    }

    fn apply(
        &self,
        subscriber_id: &str,
        payment: &GatewayPayment,
        renewal: bool,
        new_valid_until: DateTime<Utc>,
    ) -> StorageResult<SubscriptionRecord> {
        let subscriptions = SubscriptionRepository::new(&self.storage);
        let mut record = subscriptions.ensure(subscriber_id)?;

        let method_token = payment
            .method_token()
            .map(str::to_string)
            .or_else(|| {
                // Recurring charges may not echo the saved method back.
                renewal.then(|| record.payment_method_id.clone()).flatten()
            });

        record.active = true;
        record.valid_until = Some(new_valid_until);
        record.auto_renew = method_token.is_some();
        record.payment_method_id = method_token;
        record.next_charge = record.auto_renew.then_some(new_valid_until);
        subscriptions.update(&record)
    }
}
