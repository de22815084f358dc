// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Single renewal attempt for one subscriber.
//!
//! Dispatched by the scheduler for each due subscription. The task
//! re-fetches the record instead of trusting the scan snapshot, so a
//! subscriber who turned auto-renew off between scan and execution is
//! never charged.
//!
//! The failure policy is conservative: any outcome other than `succeeded`
//! disables auto-renew and never retries within the cycle. The already-paid
//! period is untouched, and the subscriber is told exactly what they keep.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::billing::PaymentFinalizer;
use crate::notify::{AutoRenewStopReason, Notice, Notifier};
use crate::providers::{PaymentGateway, PaymentState, RecurringChargeRequest};
use crate::storage::{JsonStorage, StorageError, StorageResult, SubscriptionRepository};

/// Charges one subscriber's saved payment method.
pub struct RenewalTask {
    storage: Arc<JsonStorage>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    finalizer: Arc<PaymentFinalizer>,
    amount: String,
    currency: String,
}

impl RenewalTask {
    pub fn new(
        storage: Arc<JsonStorage>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        finalizer: Arc<PaymentFinalizer>,
        amount: String,
        currency: String,
    ) -> Self {
        Self {
            storage,
            gateway,
            notifier,
            finalizer,
            amount,
            currency,
        }
    }

    /// Run one renewal attempt, containing every failure.
    ///
    /// Errors are logged, never propagated: one subscriber's failure must
    /// not affect the scheduler loop or other subscribers. A store failure
    /// leaves `next_charge` unadvanced, so the next tick retries naturally.
    pub async fn run(&self, subscriber_id: &str) {
        if let Err(e) = self.attempt(subscriber_id).await {
            error!(
                subscriber_id = %subscriber_id,
                error = %e,
                "Renewal attempt failed on storage"
            );
        }
    }

    async fn attempt(&self, subscriber_id: &str) -> StorageResult<()> {
        let subscriptions = SubscriptionRepository::new(&self.storage);

        // Fresh read: the scan snapshot may be stale.
        let record = match subscriptions.get(subscriber_id) {
            Ok(record) => record,
            Err(StorageError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        if !record.auto_renew {
            // Disabled between scan and execution; exit silently.
            return Ok(());
        }

        let (Some(method_id), Some(phone)) = (&record.payment_method_id, &record.phone) else {
            warn!(subscriber_id = %subscriber_id, "Renewal impossible, payment data missing");
            let record = subscriptions.disable_auto_renew(subscriber_id)?;
            self.notifier
                .notify(
                    subscriber_id,
                    Notice::AutoRenewStopped {
                        reason: AutoRenewStopReason::MissingPaymentData,
                        active_until: record.valid_until,
                    },
                )
                .await;
            return Ok(());
        };

        let charge = self
            .gateway
            .create_recurring_payment(RecurringChargeRequest {
                subscriber_id,
                payment_method_id: method_id,
                phone,
                amount: &self.amount,
                currency: &self.currency,
            })
            .await;

        match charge {
            Ok(payment) if payment.state == PaymentState::Succeeded => {
                self.finalizer.finalize(subscriber_id, &payment, true).await?;
                info!(
                    subscriber_id = %subscriber_id,
                    payment_id = %payment.id,
                    "Renewal charge succeeded"
                );
                Ok(())
            }
            outcome => {
                match outcome {
                    Ok(payment) => warn!(
                        subscriber_id = %subscriber_id,
                        payment_id = %payment.id,
                        state = ?payment.state,
                        "Renewal charge not succeeded"
                    ),
                    Err(e) => warn!(
                        subscriber_id = %subscriber_id,
                        error = %e,
                        "Renewal charge call failed"
                    ),
                }

                // No in-cycle retry. The paid period stays as is.
                let record = subscriptions.disable_auto_renew(subscriber_id)?;
                self.notifier
                    .notify(
                        subscriber_id,
                        Notice::AutoRenewStopped {
                            reason: AutoRenewStopReason::PaymentFailed,
                            active_until: record.valid_until,
                        },
                    )
                    .await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::providers::testing::{payment, MockGateway};
    use crate::providers::GatewayError;
    use crate::storage::{StoragePaths, SubscriptionRecord};
    use chrono::{DateTime, Duration, Utc};
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Arc<JsonStorage>) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        (dir, Arc::new(storage))
    }

    fn seed_due_record(storage: &JsonStorage, subscriber_id: &str, due_at: DateTime<Utc>) {
        let repo = SubscriptionRepository::new(storage);
        repo.ensure(subscriber_id).unwrap();
        let mut record = SubscriptionRecord::new_blank(subscriber_id);
        record.active = true;
        record.valid_until = Some(due_at);
        record.payment_method_id = Some("pm-1".to_string());
        record.auto_renew = true;
        record.next_charge = Some(due_at);
        record.phone = Some("+79991234567".to_string());
        repo.update(&record).unwrap();
    }

    fn task(
        storage: Arc<JsonStorage>,
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
    ) -> RenewalTask {
        let finalizer = Arc::new(PaymentFinalizer::new(storage.clone(), notifier.clone(), 30));
        RenewalTask::new(
            storage,
            gateway,
            notifier,
            finalizer,
            "10.00".into(),
            "RUB".into(),
        )
    }

    #[tokio::test]
    async fn successful_renewal_advances_window_and_keeps_auto_renew() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        let now = Utc::now();
        seed_due_record(&storage, "sub-1", now);
        gateway.queue_create_recurring(Ok(payment(
            "pay-2",
            PaymentState::Succeeded,
            Some(("pm-1", true)),
        )));

        task(storage.clone(), gateway, notifier.clone())
            .run("sub-1")
            .await;

        let record = SubscriptionRepository::new(&storage).get("sub-1").unwrap();
        assert!(record.auto_renew);
        assert!(record.active);
        let valid_until = record.valid_until.unwrap();
        assert!(valid_until > now + Duration::days(29));
        assert!(valid_until < now + Duration::days(31));
        assert_eq!(record.next_charge, record.valid_until);
        assert!(matches!(
            notifier.notices_for("sub-1").last(),
            Some(Notice::SubscriptionRenewed { .. })
        ));
    }

    #[tokio::test]
    async fn canceled_charge_disables_auto_renew_keeps_period() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        let due_at = Utc::now() + Duration::hours(1);
        seed_due_record(&storage, "sub-1", due_at);
        gateway.queue_create_recurring(Ok(payment("pay-2", PaymentState::Canceled, None)));

        task(storage.clone(), gateway, notifier.clone())
            .run("sub-1")
            .await;

        let record = SubscriptionRepository::new(&storage).get("sub-1").unwrap();
        assert!(!record.auto_renew);
        assert!(record.next_charge.is_none());
        assert!(record.active);
        assert_eq!(record.valid_until, Some(due_at));
        assert!(matches!(
            notifier.notices_for("sub-1").as_slice(),
            [Notice::AutoRenewStopped {
                reason: AutoRenewStopReason::PaymentFailed,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn gateway_error_disables_auto_renew_no_retry() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        seed_due_record(&storage, "sub-1", Utc::now());
        gateway.queue_create_recurring(Err(GatewayError::InvalidResponse("503".into())));

        task(storage.clone(), gateway.clone(), notifier.clone())
            .run("sub-1")
            .await;

        let record = SubscriptionRepository::new(&storage).get("sub-1").unwrap();
        assert!(!record.auto_renew);
        assert_eq!(gateway.recurring_call_count(), 1);
    }

    #[tokio::test]
    async fn disabled_between_scan_and_run_means_no_charge() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        seed_due_record(&storage, "sub-1", Utc::now());
        // The subscriber turns auto-renew off after the scan picked them up.
        SubscriptionRepository::new(&storage)
            .disable_auto_renew("sub-1")
            .unwrap();

        task(storage.clone(), gateway.clone(), notifier.clone())
            .run("sub-1")
            .await;

        assert_eq!(gateway.recurring_call_count(), 0);
        assert!(notifier.notices_for("sub-1").is_empty());
    }

    #[tokio::test]
    async fn missing_method_disables_auto_renew_with_reason() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        // Build a record that passes validation but loses its method before
        // the task re-reads it: detach clears method and auto-renew, so
        // instead craft the race by clearing the phone only.
        let due_at = Utc::now();
        seed_due_record(&storage, "sub-1", due_at);
        let repo = SubscriptionRepository::new(&storage);
        let mut record = repo.get("sub-1").unwrap();
        record.phone = None;
        repo.update(&record).unwrap();

        task(storage.clone(), gateway.clone(), notifier.clone())
            .run("sub-1")
            .await;

        let record = repo.get("sub-1").unwrap();
        assert!(!record.auto_renew);
        assert_eq!(gateway.recurring_call_count(), 0);
        assert!(matches!(
            notifier.notices_for("sub-1").as_slice(),
            [Notice::AutoRenewStopped {
                reason: AutoRenewStopReason::MissingPaymentData,
                ..
            }]
        ));
    }
}
