// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Subscriber notification seam.
//!
//! The billing engine never formats or sends user-facing messages itself.
//! It emits structured [`Notice`] values through the [`Notifier`] trait and
//! leaves rendering and delivery to the messaging integration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// Why auto-renewal was switched off without the subscriber asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRenewStopReason {
    /// The recurring charge was declined, canceled, or expired.
    PaymentFailed,
    /// The stored record lacks a saved payment method or phone number.
    MissingPaymentData,
}

/// A structured, renderer-agnostic message for a subscriber.
///
/// Every variant that reports a problem also carries the concrete
/// consequence (what the subscriber keeps, until when), so the rendered
/// message can always state it.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A phone number is required before a payment can be created.
    PhoneRequested,
    /// The hosted payment page is ready; the subscriber must follow the link.
    ConfirmationLink { url: String },
    /// The gateway rejected the payment creation request.
    PaymentCreationFailed,
    /// The payment ended in a terminal non-success state.
    PaymentFailed,
    /// Polling gave up while the payment was still pending.
    PaymentUnconfirmed,
    /// First successful payment: the subscription is now active.
    SubscriptionActivated { valid_until: DateTime<Utc> },
    /// A renewal charge succeeded.
    SubscriptionRenewed {
        valid_until: DateTime<Utc>,
        next_charge: DateTime<Utc>,
    },
    /// Auto-renewal was disabled; access continues until `active_until`.
    AutoRenewStopped {
        reason: AutoRenewStopReason,
        active_until: Option<DateTime<Utc>>,
    },
}

/// Outbound notification channel for subscriber-facing events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notice to a subscriber. Delivery failures are the
    /// implementation's concern; billing flows do not depend on them.
    async fn notify(&self, subscriber_id: &str, notice: Notice);
}

/// Notifier that writes notices to the structured log.
///
/// Used when no messaging integration is configured, and in local runs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subscriber_id: &str, notice: Notice) {
        info!(subscriber_id = %subscriber_id, notice = ?notice, "Subscriber notice");
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every notice for later assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        notices: Mutex<Vec<(String, Notice)>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn notices(&self) -> Vec<(String, Notice)> {
            self.notices.lock().unwrap().clone()
        }

        pub fn notices_for(&self, subscriber_id: &str) -> Vec<Notice> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| id == subscriber_id)
                .map(|(_, notice)| notice.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subscriber_id: &str, notice: Notice) {
            self.notices
                .lock()
                .unwrap()
                .push((subscriber_id.to_string(), notice));
        }
    }
}
