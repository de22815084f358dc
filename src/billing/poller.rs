// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! # Payment Status Poller
//!
//! Bounded background task that watches one gateway payment until it
//! reaches a terminal state or the attempt budget runs out.
//!
//! ## Strategy
//!
//! Every `poll_interval` (default 5 s) the poller fetches the payment:
//! - `succeeded`: hand it to the finalizer, stop.
//! - `canceled` / `expired` / `refunded`: tell the subscriber the payment
//!   failed, stop.
//! - `pending`: consume one of `max_attempts` (default 12) and sleep.
//! - gateway call failure: log and sleep WITHOUT consuming an attempt, so a
//!   flaky gateway cannot prematurely time a payment out.
//!
//! Exhausting the budget while still pending tells the subscriber the
//! payment could not be confirmed.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown,
//! following the same pattern as the renewal scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::billing::PaymentFinalizer;
use crate::notify::{Notice, Notifier};
use crate::providers::{PaymentGateway, PaymentState};

/// Background poller bound to a single payment id.
pub struct PaymentStatusPoller {
    gateway: Arc<dyn PaymentGateway>,
    finalizer: Arc<PaymentFinalizer>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl PaymentStatusPoller {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        finalizer: Arc<PaymentFinalizer>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            gateway,
            finalizer,
            notifier,
            poll_interval,
            max_attempts,
        }
    }

    /// Poll until the payment settles, the budget runs out, or shutdown.
    ///
    /// Should be spawned as a background task.
    pub async fn run(self, subscriber_id: String, payment_id: String, shutdown: CancellationToken) {
        info!(
            payment_id = %payment_id,
            subscriber_id = %subscriber_id,
            "Payment poller starting"
        );

        let mut attempts = 0u32;

        loop {
            if shutdown.is_cancelled() {
                info!(payment_id = %payment_id, "Payment poller shutting down");
                return;
            }

            match self.gateway.get_payment(&payment_id).await {
                Ok(payment) => match payment.state {
                    PaymentState::Succeeded => {
                        if let Err(e) = self
                            .finalizer
                            .finalize(&subscriber_id, &payment, false)
                            .await
                        {
                            error!(
                                payment_id = %payment_id,
                                error = %e,
                                "Failed to finalize succeeded payment"
                            );
                            // The subscriber must hear something on every
                            // terminal exit; the payment is not credited yet.
                            self.notifier
                                .notify(&subscriber_id, Notice::PaymentUnconfirmed)
                                .await;
                        }
                        return;
                    }
                    PaymentState::Canceled | PaymentState::Expired | PaymentState::Refunded => {
                        info!(
                            payment_id = %payment_id,
                            state = ?payment.state,
                            "Payment ended without success"
                        );
                        self.notifier
                            .notify(&subscriber_id, Notice::PaymentFailed)
                            .await;
                        return;
                    }
                    PaymentState::Pending => {
                        attempts += 1;
                        if attempts >= self.max_attempts {
                            warn!(
                                payment_id = %payment_id,
                                attempts,
                                "Payment still pending after final attempt"
                            );
                            self.notifier
                                .notify(&subscriber_id, Notice::PaymentUnconfirmed)
                                .await;
                            return;
                        }
                    }
                },
                // Transient failure: does not consume an attempt.
                Err(e) => {
                    warn!(
                        payment_id = %payment_id,
                        error = %e,
                        "Payment status check failed, will retry"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!(payment_id = %payment_id, "Payment poller shutting down");
                    return;
                }
            }
        }
    }
}
