// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Payment initiation flow.
//!
//! Orchestrates "subscriber wants to subscribe": checks entitlement,
//! collects the phone number the gateway needs for a fiscal receipt,
//! creates the initial payment, and spawns a status poller for it.
//!
//! The phone collection is a suspension point. The flow persists a pending
//! initiation record and stops; when the messaging side supplies a phone,
//! [`PaymentInitiationFlow::resume_with_phone`] picks the flow back up. The
//! record survives a process restart, and expires so a phone supplied much
//! later does not trigger a surprise charge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::billing::{PaymentFinalizer, PaymentStatusPoller};
use crate::notify::{Notice, Notifier};
use crate::providers::{GatewayError, InitialPaymentRequest, PaymentGateway};
use crate::storage::{
    JsonStorage, PendingInitiationRepository, StorageError, SubscriptionRepository,
};

/// Errors surfaced to the caller of an initiation command.
#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("subscription is already active")]
    AlreadyActive,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StorageError),
}

/// Where the initiation flow stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum InitiationOutcome {
    /// Suspended: the subscriber was asked for a phone number.
    PhoneRequested,
    /// The phone was stored but no payment was pending resumption.
    PhoneSaved,
    /// A gateway payment was created and a poller is watching it.
    PaymentCreated {
        payment_id: String,
        confirmation_url: String,
    },
}

/// Orchestrates subscription initiation for one configured plan.
pub struct PaymentInitiationFlow {
    storage: Arc<JsonStorage>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    finalizer: Arc<PaymentFinalizer>,
    amount: String,
    currency: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl PaymentInitiationFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<JsonStorage>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        finalizer: Arc<PaymentFinalizer>,
        amount: String,
        currency: String,
        poll_interval: Duration,
        max_poll_attempts: u32,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            storage,
            gateway,
            notifier,
            finalizer,
            amount,
            currency,
            poll_interval,
            max_poll_attempts,
            tracker,
            shutdown,
        }
    }

    /// Begin a subscription purchase for a subscriber.
    pub async fn start(&self, subscriber_id: &str) -> Result<InitiationOutcome, InitiationError> {
        let subscriptions = SubscriptionRepository::new(&self.storage);
        subscriptions.ensure(subscriber_id)?;

        let now = Utc::now();
        let record = subscriptions.refresh_entitlement(subscriber_id, now)?;
        if record.is_entitled(now) {
            return Err(InitiationError::AlreadyActive);
        }

        let Some(phone) = record.phone else {
            // Suspension point: wait for the messaging side to collect a phone.
            PendingInitiationRepository::new(&self.storage).put(subscriber_id, now)?;
            self.notifier
                .notify(subscriber_id, Notice::PhoneRequested)
                .await;
            info!(subscriber_id = %subscriber_id, "Initiation suspended awaiting phone");
            return Ok(InitiationOutcome::PhoneRequested);
        };

        self.create_and_watch(subscriber_id, &phone).await
    }

    /// Resume a flow that suspended on phone collection.
    ///
    /// Stores the phone either way; only creates a payment if a live
    /// pending initiation exists for the subscriber.
    pub async fn resume_with_phone(
        &self,
        subscriber_id: &str,
        phone: &str,
    ) -> Result<InitiationOutcome, InitiationError> {
        let subscriptions = SubscriptionRepository::new(&self.storage);
        subscriptions.set_phone(subscriber_id, phone)?;

        let pending = PendingInitiationRepository::new(&self.storage);
        match pending.take(subscriber_id, Utc::now())? {
            Some(_) => self.create_and_watch(subscriber_id, phone).await,
            None => Ok(InitiationOutcome::PhoneSaved),
        }
    }

    async fn create_and_watch(
        &self,
        subscriber_id: &str,
        phone: &str,
    ) -> Result<InitiationOutcome, InitiationError> {
        let created = match self
            .gateway
            .create_initial_payment(InitialPaymentRequest {
                subscriber_id,
                phone,
                amount: &self.amount,
                currency: &self.currency,
            })
            .await
        {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    subscriber_id = %subscriber_id,
                    error = %e,
                    "Initial payment creation failed"
                );
                self.notifier
                    .notify(subscriber_id, Notice::PaymentCreationFailed)
                    .await;
                return Err(e.into());
            }
        };

        self.notifier
            .notify(
                subscriber_id,
                Notice::ConfirmationLink {
                    url: created.confirmation_url.clone(),
                },
            )
            .await;

        let poller = PaymentStatusPoller::new(
            self.gateway.clone(),
            self.finalizer.clone(),
            self.notifier.clone(),
            self.poll_interval,
            self.max_poll_attempts,
        );
        self.tracker.spawn(poller.run(
            subscriber_id.to_string(),
            created.payment_id.clone(),
            self.shutdown.clone(),
        ));

        info!(
            subscriber_id = %subscriber_id,
            payment_id = %created.payment_id,
            "Initial payment created, poller spawned"
        );

        Ok(InitiationOutcome::PaymentCreated {
            payment_id: created.payment_id,
            confirmation_url: created.confirmation_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::providers::testing::{payment, MockGateway};
    use crate::providers::{CreatedPayment, PaymentState};
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Arc<JsonStorage>) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        (dir, Arc::new(storage))
    }

    fn flow(
        storage: Arc<JsonStorage>,
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
    ) -> PaymentInitiationFlow {
        let finalizer = Arc::new(PaymentFinalizer::new(storage.clone(), notifier.clone(), 30));
        PaymentInitiationFlow::new(
            storage,
            gateway,
            notifier,
            finalizer,
            "10.00".into(),
            "RUB".into(),
            Duration::from_millis(1),
            12,
            TaskTracker::new(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn new_subscriber_full_flow_through_phone_and_polling() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        gateway.queue_create_initial(Ok(CreatedPayment {
            payment_id: "pay-1".into(),
            confirmation_url: "https://pay.example/p1".into(),
        }));
        // Poller sees two pendings then success.
        gateway.queue_get_payment(Ok(payment("pay-1", PaymentState::Pending, None)));
        gateway.queue_get_payment(Ok(payment("pay-1", PaymentState::Pending, None)));
        gateway.queue_get_payment(Ok(payment(
            "pay-1",
            PaymentState::Succeeded,
            Some(("pm-1", true)),
        )));

        let flow = flow(storage.clone(), gateway.clone(), notifier.clone());

        // No phone on file: the flow suspends.
        let outcome = flow.start("sub-1").await.unwrap();
        assert_eq!(outcome, InitiationOutcome::PhoneRequested);
        assert_eq!(notifier.notices_for("sub-1"), vec![Notice::PhoneRequested]);

        // Phone arrives: payment is created and watched.
        let outcome = flow.resume_with_phone("sub-1", "+79991234567").await.unwrap();
        assert!(matches!(outcome, InitiationOutcome::PaymentCreated { .. }));

        flow.tracker.close();
        flow.tracker.wait().await;

        let record = SubscriptionRepository::new(&storage).get("sub-1").unwrap();
        assert!(record.active);
        assert!(record.auto_renew);
        assert_eq!(record.phone.as_deref(), Some("+79991234567"));
        assert_eq!(record.next_charge, record.valid_until);
        assert_eq!(gateway.get_call_count(), 3);
    }

    #[tokio::test]
    async fn active_subscriber_cannot_reinitiate() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        // Activate through a finalized payment first.
        let finalizer = PaymentFinalizer::new(storage.clone(), notifier.clone(), 30);
        finalizer
            .finalize(
                "sub-1",
                &payment("pay-0", PaymentState::Succeeded, None),
                false,
            )
            .await
            .unwrap();

        let flow = flow(storage.clone(), gateway, notifier);
        let result = flow.start("sub-1").await;
        assert!(matches!(result, Err(InitiationError::AlreadyActive)));
    }

    #[tokio::test]
    async fn gateway_failure_notifies_and_aborts() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        gateway.queue_create_initial(Err(GatewayError::InvalidResponse("503".into())));

        let flow = flow(storage.clone(), gateway, notifier.clone());
        SubscriptionRepository::new(&storage)
            .set_phone("sub-1", "+79991234567")
            .unwrap();

        let result = flow.start("sub-1").await;
        assert!(matches!(result, Err(InitiationError::Gateway(_))));
        assert!(notifier
            .notices_for("sub-1")
            .contains(&Notice::PaymentCreationFailed));
    }

    #[tokio::test]
    async fn phone_without_pending_initiation_is_just_saved() {
        let (_dir, storage) = test_storage();
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MockGateway::new());

        let flow = flow(storage.clone(), gateway.clone(), notifier);
        let outcome = flow.resume_with_phone("sub-1", "+79991234567").await.unwrap();
        assert_eq!(outcome, InitiationOutcome::PhoneSaved);

        let record = SubscriptionRepository::new(&storage).get("sub-1").unwrap();
        assert_eq!(record.phone.as_deref(), Some("+79991234567"));
    }
}
