// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Subscriber command handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::billing::{CommandError, InitiationError, InitiationOutcome};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::SubscriptionRecord;

/// Subscription state as reported to the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub subscriber_id: String,
    /// Whether the paid period currently covers now.
    pub entitled: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub next_charge: Option<DateTime<Utc>>,
    /// Whether a saved payment method is on file.
    pub payment_method_saved: bool,
    /// Whether a phone number is on file.
    pub phone_on_file: bool,
}

impl SubscriptionResponse {
    fn from_record(record: SubscriptionRecord, now: DateTime<Utc>) -> Self {
        Self {
            entitled: record.is_entitled(now),
            subscriber_id: record.subscriber_id,
            valid_until: record.valid_until,
            auto_renew: record.auto_renew,
            next_charge: record.next_charge,
            payment_method_saved: record.payment_method_id.is_some(),
            phone_on_file: record.phone.is_some(),
        }
    }
}

/// Result of a subscribe or provide-phone call.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeResponse {
    /// One of `phone_required`, `phone_saved`, `payment_created`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Hosted payment page to complete the charge on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_url: Option<String>,
}

impl From<InitiationOutcome> for SubscribeResponse {
    fn from(outcome: InitiationOutcome) -> Self {
        match outcome {
            InitiationOutcome::PhoneRequested => Self {
                status: "phone_required".to_string(),
                payment_id: None,
                confirmation_url: None,
            },
            InitiationOutcome::PhoneSaved => Self {
                status: "phone_saved".to_string(),
                payment_id: None,
                confirmation_url: None,
            },
            InitiationOutcome::PaymentCreated {
                payment_id,
                confirmation_url,
            } => Self {
                status: "payment_created".to_string(),
                payment_id: Some(payment_id),
                confirmation_url: Some(confirmation_url),
            },
        }
    }
}

/// Phone number supplied by the subscriber.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProvidePhoneRequest {
    pub phone: String,
}

fn initiation_error(e: InitiationError) -> ApiError {
    match e {
        InitiationError::AlreadyActive => {
            ApiError::conflict("Subscription is already active")
        }
        InitiationError::Gateway(e) => {
            ApiError::service_unavailable(format!("Payment gateway error: {e}"))
        }
        InitiationError::Store(e) => ApiError::internal(format!("Storage error: {e}")),
    }
}

fn command_error(e: CommandError) -> ApiError {
    match e {
        CommandError::NoSubscription => ApiError::not_found("No subscription on file"),
        CommandError::SubscriptionExpired => {
            ApiError::unprocessable("Subscription has expired; start a new one to resume")
        }
        CommandError::MissingPaymentMethod => {
            ApiError::unprocessable("No saved payment method; a new payment is required")
        }
        CommandError::Store(e) => ApiError::internal(format!("Storage error: {e}")),
    }
}

/// Start a subscription purchase.
#[utoipa::path(
    post,
    path = "/v1/subscribers/{subscriber_id}/subscribe",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    responses(
        (status = 200, description = "Initiation result", body = SubscribeResponse),
        (status = 409, description = "Subscription already active"),
        (status = 503, description = "Payment gateway unavailable")
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let outcome = state
        .initiation
        .start(&subscriber_id)
        .await
        .map_err(initiation_error)?;
    Ok(Json(outcome.into()))
}

/// Supply the phone number a suspended initiation is waiting for.
#[utoipa::path(
    post,
    path = "/v1/subscribers/{subscriber_id}/phone",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    request_body = ProvidePhoneRequest,
    responses(
        (status = 200, description = "Phone stored; payment created if one was pending", body = SubscribeResponse),
        (status = 400, description = "Invalid phone number"),
        (status = 503, description = "Payment gateway unavailable")
    )
)]
pub async fn provide_phone(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
    Json(request): Json<ProvidePhoneRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let phone = request.phone.trim();
    if phone.is_empty() {
        return Err(ApiError::bad_request("Phone number must not be empty"));
    }

    let outcome = state
        .initiation
        .resume_with_phone(&subscriber_id, phone)
        .await
        .map_err(initiation_error)?;
    Ok(Json(outcome.into()))
}

/// Current subscription state for a subscriber.
#[utoipa::path(
    get,
    path = "/v1/subscribers/{subscriber_id}/subscription",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    responses(
        (status = 200, description = "Subscription state", body = SubscriptionResponse)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let now = Utc::now();
    let record = state
        .commands
        .subscription_status(&subscriber_id, now)
        .map_err(command_error)?;
    Ok(Json(SubscriptionResponse::from_record(record, now)))
}

/// Turn auto-renewal off.
#[utoipa::path(
    post,
    path = "/v1/subscribers/{subscriber_id}/auto-renew/stop",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    responses(
        (status = 200, description = "Auto-renew is off", body = SubscriptionResponse),
        (status = 404, description = "No subscription on file")
    )
)]
pub async fn stop_auto_renew(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let record = state
        .commands
        .stop_auto_renew(&subscriber_id)
        .map_err(command_error)?;
    Ok(Json(SubscriptionResponse::from_record(record, Utc::now())))
}

/// Turn auto-renewal back on, if the subscription still allows it.
#[utoipa::path(
    post,
    path = "/v1/subscribers/{subscriber_id}/auto-renew/resume",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    responses(
        (status = 200, description = "Auto-renew is on", body = SubscriptionResponse),
        (status = 404, description = "No subscription on file"),
        (status = 422, description = "Subscription expired or no saved method")
    )
)]
pub async fn resume_auto_renew(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let now = Utc::now();
    let record = state
        .commands
        .resume_auto_renew(&subscriber_id, now)
        .map_err(command_error)?;
    Ok(Json(SubscriptionResponse::from_record(record, now)))
}

/// Forget the saved payment method.
#[utoipa::path(
    delete,
    path = "/v1/subscribers/{subscriber_id}/payment-method",
    tag = "Subscriptions",
    params(("subscriber_id" = String, Path, description = "Subscriber identifier")),
    responses(
        (status = 200, description = "Method detached, auto-renew off", body = SubscriptionResponse),
        (status = 404, description = "No subscription on file")
    )
)]
pub async fn detach_payment_method(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let record = state
        .commands
        .detach_payment_method(&subscriber_id)
        .map_err(command_error)?;
    Ok(Json(SubscriptionResponse::from_record(record, Utc::now())))
}
