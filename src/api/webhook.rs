// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Payment gateway webhook.
//!
//! Optional fast path: when the gateway pushes `payment.succeeded`, the
//! payment is finalized immediately instead of waiting for the next poll.
//! Both paths share the finalizer's finalized-payment-id guard, so a
//! payment seen by webhook and poller is applied once.
//!
//! The posted body is not trusted: the payment is re-fetched from the
//! gateway by id, and only a state the gateway itself confirms as
//! succeeded is finalized.

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::providers::PaymentState;
use crate::state::AppState;

/// Gateway webhook receiver.
#[utoipa::path(
    post,
    path = "/v1/webhooks/yookassa",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Malformed event payload"),
        (status = 503, description = "Gateway verification unavailable")
    )
)]
pub async fn yookassa_webhook(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let event = payload
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Missing event field"))?;

    if event != "payment.succeeded" {
        info!(event = %event, "Ignoring webhook event");
        return Ok(Json(serde_json::json!({ "status": "ignored" })));
    }

    let object = payload
        .get("object")
        .ok_or_else(|| ApiError::bad_request("Missing payment object"))?;
    let payment_id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Missing payment id"))?;
    let subscriber_id = object
        .get("metadata")
        .and_then(|m| m.get("subscriber_id"))
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Missing subscriber_id metadata"))?;

    // Verify against the gateway rather than trusting the posted body.
    let payment = state.gateway.get_payment(payment_id).await.map_err(|e| {
        warn!(payment_id = %payment_id, error = %e, "Webhook verification failed");
        ApiError::service_unavailable("Could not verify payment with gateway")
    })?;

    if payment.state != PaymentState::Succeeded {
        warn!(
            payment_id = %payment_id,
            state = ?payment.state,
            "Webhook claimed success but gateway disagrees"
        );
        return Ok(Json(serde_json::json!({ "status": "ignored" })));
    }

    state
        .finalizer
        .finalize(subscriber_id, &payment, false)
        .await
        .map_err(|e| ApiError::internal(format!("Storage error: {e}")))?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{PaymentFinalizer, PaymentInitiationFlow, SubscriberCommands};
    use crate::notify::testing::RecordingNotifier;
    use crate::providers::testing::{payment, MockGateway};
    use crate::storage::{JsonStorage, StoragePaths, SubscriptionRepository};
    use axum::extract::State;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    fn test_state(gateway: Arc<MockGateway>) -> (TempDir, AppState) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        let storage = Arc::new(storage);

        let notifier = Arc::new(RecordingNotifier::new());
        let finalizer = Arc::new(PaymentFinalizer::new(storage.clone(), notifier.clone(), 30));
        let initiation = Arc::new(PaymentInitiationFlow::new(
            storage.clone(),
            gateway.clone(),
            notifier,
            finalizer.clone(),
            "10.00".into(),
            "RUB".into(),
            Duration::from_secs(5),
            12,
            TaskTracker::new(),
            CancellationToken::new(),
        ));
        let commands = Arc::new(SubscriberCommands::new(storage.clone()));

        (
            dir,
            AppState::new(storage, gateway, initiation, commands, finalizer),
        )
    }

    fn succeeded_event(payment_id: &str, subscriber_id: &str) -> serde_json::Value {
        json!({
            "event": "payment.succeeded",
            "object": {
                "id": payment_id,
                "status": "succeeded",
                "metadata": { "subscriber_id": subscriber_id },
            }
        })
    }

    #[tokio::test]
    async fn succeeded_event_activates_subscription() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_get_payment(Ok(payment(
            "pay-1",
            PaymentState::Succeeded,
            Some(("pm-1", true)),
        )));

        let (_dir, state) = test_state(gateway);
        yookassa_webhook(
            State(state.clone()),
            Json(succeeded_event("pay-1", "sub-1")),
        )
        .await
        .unwrap();

        let record = SubscriptionRepository::new(&state.storage)
            .get("sub-1")
            .unwrap();
        assert!(record.active);
        assert!(record.auto_renew);
    }

    #[tokio::test]
    async fn event_not_confirmed_by_gateway_is_ignored() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_get_payment(Ok(payment("pay-1", PaymentState::Pending, None)));

        let (_dir, state) = test_state(gateway);
        let response = yookassa_webhook(
            State(state.clone()),
            Json(succeeded_event("pay-1", "sub-1")),
        )
        .await
        .unwrap();

        assert_eq!(response.0["status"], "ignored");
        assert!(!SubscriptionRepository::new(&state.storage).exists("sub-1"));
    }

    #[tokio::test]
    async fn other_events_are_ignored_without_gateway_calls() {
        let gateway = Arc::new(MockGateway::new());
        let (_dir, state) = test_state(gateway.clone());

        let response = yookassa_webhook(
            State(state.clone()),
            Json(json!({ "event": "refund.succeeded", "object": { "id": "r-1" } })),
        )
        .await
        .unwrap();

        assert_eq!(response.0["status"], "ignored");
        assert_eq!(gateway.get_call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let (_dir, state) = test_state(Arc::new(MockGateway::new()));

        let result = yookassa_webhook(
            State(state.clone()),
            Json(json!({ "object": { "id": "pay-1" } })),
        )
        .await;
        assert!(result.is_err());
    }
}
