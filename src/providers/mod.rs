// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Payment gateway contract.
//!
//! The billing flows depend on the [`PaymentGateway`] trait; the concrete
//! [`yookassa::YooKassaClient`] implements it over HTTP.

pub mod yookassa;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a gateway payment, as the engine understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Not yet terminal; keep polling.
    Pending,
    /// Captured; the subscription may be activated or extended.
    Succeeded,
    /// Terminal: canceled by the payer, gateway, or issuer.
    Canceled,
    /// Terminal: the hosted confirmation window lapsed.
    Expired,
    /// Terminal: money returned after capture.
    Refunded,
}

impl PaymentState {
    /// Whether the payment can no longer transition to another state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentState::Pending)
    }
}

/// Map a raw gateway status string into a [`PaymentState`].
///
/// Unknown statuses map to `Pending` so the poller keeps watching instead
/// of misclassifying a payment as failed.
pub fn map_payment_state(raw: &str) -> PaymentState {
    match raw {
        "succeeded" => PaymentState::Succeeded,
        "canceled" | "cancelled" => PaymentState::Canceled,
        "expired" => PaymentState::Expired,
        "refunded" => PaymentState::Refunded,
        "pending" | "waiting_for_capture" => PaymentState::Pending,
        _ => PaymentState::Pending,
    }
}

/// Payment method details attached to a gateway payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPaymentMethod {
    /// Gateway-issued method token.
    pub id: String,
    /// Whether the gateway persisted the method for recurring use.
    pub saved: bool,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    /// Gateway-assigned payment id.
    pub id: String,
    pub state: PaymentState,
    pub payment_method: Option<SavedPaymentMethod>,
}

impl GatewayPayment {
    /// Saved-method token, present only when the gateway confirmed saving.
    pub fn method_token(&self) -> Option<&str> {
        self.payment_method
            .as_ref()
            .filter(|method| method.saved)
            .map(|method| method.id.as_str())
    }
}

/// Result of creating a payment that requires subscriber confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub payment_id: String,
    /// Hosted payment page the subscriber must visit.
    pub confirmation_url: String,
}

/// Parameters for the first payment of a subscription.
#[derive(Debug, Clone, Copy)]
pub struct InitialPaymentRequest<'a> {
    pub subscriber_id: &'a str,
    /// Phone number for the fiscal receipt.
    pub phone: &'a str,
    /// Two-decimal money string, e.g. `"10.00"`.
    pub amount: &'a str,
    pub currency: &'a str,
}

/// Parameters for an off-session charge against a saved method.
#[derive(Debug, Clone, Copy)]
pub struct RecurringChargeRequest<'a> {
    pub subscriber_id: &'a str,
    pub payment_method_id: &'a str,
    pub phone: &'a str,
    pub amount: &'a str,
    pub currency: &'a str,
}

/// Gateway client failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured: {0}")]
    MissingConfig(&'static str),
    #[error("payment gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment gateway returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Client for the payment gateway.
///
/// Implementations must generate a fresh UUID idempotency key per create
/// call so gateway-side retries cannot double-charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create the initial payment: hosted confirmation, method saving on.
    async fn create_initial_payment(
        &self,
        request: InitialPaymentRequest<'_>,
    ) -> Result<CreatedPayment, GatewayError>;

    /// Charge a saved payment method without subscriber interaction.
    async fn create_recurring_payment(
        &self,
        request: RecurringChargeRequest<'_>,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Fetch the current state of a payment by gateway id.
    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
