// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! YooKassa payment gateway client.
//!
//! Talks to the YooKassa REST API (`/v3/payments`) with shop-id Basic auth
//! and a fresh `Idempotence-Key` per create request. Initial payments use a
//! hosted redirect confirmation and ask the gateway to save the payment
//! method; recurring charges reference the saved method token instead.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    map_payment_state, CreatedPayment, GatewayError, GatewayPayment, InitialPaymentRequest,
    PaymentGateway, RecurringChargeRequest, SavedPaymentMethod,
};

const DEFAULT_API_BASE_URL: &str = "https://api.yookassa.ru";

/// Fiscal receipt line item description.
const RECEIPT_ITEM_DESCRIPTION: &str = "Monthly subscription";

/// YooKassa API client.
#[derive(Debug, Clone)]
pub struct YooKassaClient {
    api_base_url: String,
    shop_id: String,
    secret_key: String,
    return_url: String,
    http: reqwest::Client,
}

impl YooKassaClient {
    pub fn new(
        api_base_url: String,
        shop_id: String,
        secret_key: String,
        return_url: String,
    ) -> Self {
        Self {
            api_base_url,
            shop_id,
            secret_key,
            return_url,
            http: reqwest::Client::new(),
        }
    }

    /// Build a client from `YOOKASSA_SHOP_ID`, `YOOKASSA_SECRET_KEY`,
    /// `YOOKASSA_API_BASE_URL`, and `PAYMENT_RETURN_URL`.
    pub fn from_env() -> Result<Self, GatewayError> {
        let shop_id = std::env::var("YOOKASSA_SHOP_ID")
            .map_err(|_| GatewayError::MissingConfig("YOOKASSA_SHOP_ID"))?;
        let secret_key = std::env::var("YOOKASSA_SECRET_KEY")
            .map_err(|_| GatewayError::MissingConfig("YOOKASSA_SECRET_KEY"))?;
        let return_url = std::env::var("PAYMENT_RETURN_URL")
            .map_err(|_| GatewayError::MissingConfig("PAYMENT_RETURN_URL"))?;
        let api_base_url = std::env::var("YOOKASSA_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        Ok(Self::new(api_base_url, shop_id, secret_key, return_url))
    }

    /// Whether all required gateway credentials are present in the environment.
    pub fn is_configured() -> bool {
        std::env::var("YOOKASSA_SHOP_ID").is_ok()
            && std::env::var("YOOKASSA_SECRET_KEY").is_ok()
            && std::env::var("PAYMENT_RETURN_URL").is_ok()
    }

    async fn post_payment(&self, body: Value) -> Result<Value, GatewayError> {
        let url = format!("{}/v3/payments", self.api_base_url);
        let idempotence_key = Uuid::new_v4().to_string();

        debug!(url = %url, "Creating gateway payment");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", idempotence_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            warn!(status = %status, "Gateway rejected payment request");
            return Err(GatewayError::InvalidResponse(format!(
                "payment creation returned HTTP {status}: {}",
                payload
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("no description")
            )));
        }

        Ok(payload)
    }
}

/// Fiscal receipt required for every charge: the subscriber's phone as the
/// customer contact plus a single prepaid service line item.
fn build_receipt(phone: &str, amount: &str, currency: &str) -> Value {
    json!({
        "customer": { "phone": phone },
        "items": [{
            "description": RECEIPT_ITEM_DESCRIPTION,
            "quantity": "1.00",
            "amount": { "value": amount, "currency": currency },
            "vat_code": 1,
            "payment_mode": "full_prepayment",
            "payment_subject": "service",
        }],
    })
}

/// Extract a [`GatewayPayment`] from a YooKassa payment object.
fn parse_payment(payload: &Value) -> Result<GatewayPayment, GatewayError> {
    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("payment object missing id".to_string()))?;
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("payment object missing status".to_string()))?;

    let payment_method = payload.get("payment_method").and_then(|method| {
        let token = method.get("id").and_then(Value::as_str)?;
        Some(SavedPaymentMethod {
            id: token.to_string(),
            saved: method
                .get("saved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    });

    Ok(GatewayPayment {
        id: id.to_string(),
        state: map_payment_state(status),
        payment_method,
    })
}

#[async_trait]
impl PaymentGateway for YooKassaClient {
    async fn create_initial_payment(
        &self,
        request: InitialPaymentRequest<'_>,
    ) -> Result<CreatedPayment, GatewayError> {
        let body = json!({
            "amount": { "value": request.amount, "currency": request.currency },
            "confirmation": { "type": "redirect", "return_url": self.return_url },
            "capture": true,
            "save_payment_method": true,
            "description": RECEIPT_ITEM_DESCRIPTION,
            "metadata": { "subscriber_id": request.subscriber_id },
            "receipt": build_receipt(request.phone, request.amount, request.currency),
        });

        let payload = self.post_payment(body).await?;

        let payment_id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidResponse("payment missing id".to_string()))?;
        let confirmation_url = payload
            .get("confirmation")
            .and_then(|c| c.get("confirmation_url"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::InvalidResponse("payment missing confirmation_url".to_string())
            })?;

        Ok(CreatedPayment {
            payment_id: payment_id.to_string(),
            confirmation_url: confirmation_url.to_string(),
        })
    }

    async fn create_recurring_payment(
        &self,
        request: RecurringChargeRequest<'_>,
    ) -> Result<GatewayPayment, GatewayError> {
        let body = json!({
            "amount": { "value": request.amount, "currency": request.currency },
            "capture": true,
            "payment_method_id": request.payment_method_id,
            "description": RECEIPT_ITEM_DESCRIPTION,
            "metadata": { "subscriber_id": request.subscriber_id },
            "receipt": build_receipt(request.phone, request.amount, request.currency),
        });

        let payload = self.post_payment(body).await?;
        parse_payment(&payload)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let url = format!("{}/v3/payments/{}", self.api_base_url, payment_id);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "payment lookup returned HTTP {status}"
            )));
        }

        let payload: Value = response.json().await?;
        parse_payment(&payload)
    }
}
