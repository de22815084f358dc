// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod health;
pub mod subscriptions;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/health", get(health::health))
        .route(
            "/subscribers/{subscriber_id}/subscribe",
            post(subscriptions::subscribe),
        )
        .route(
            "/subscribers/{subscriber_id}/phone",
            post(subscriptions::provide_phone),
        )
        .route(
            "/subscribers/{subscriber_id}/subscription",
            get(subscriptions::get_subscription),
        )
        .route(
            "/subscribers/{subscriber_id}/auto-renew/stop",
            post(subscriptions::stop_auto_renew),
        )
        .route(
            "/subscribers/{subscriber_id}/auto-renew/resume",
            post(subscriptions::resume_auto_renew),
        )
        .route(
            "/subscribers/{subscriber_id}/payment-method",
            delete(subscriptions::detach_payment_method),
        )
        .route("/webhooks/yookassa", post(webhook::yookassa_webhook))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        subscriptions::subscribe,
        subscriptions::provide_phone,
        subscriptions::get_subscription,
        subscriptions::stop_auto_renew,
        subscriptions::resume_auto_renew,
        subscriptions::detach_payment_method,
        webhook::yookassa_webhook
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            subscriptions::SubscriptionResponse,
            subscriptions::SubscribeResponse,
            subscriptions::ProvidePhoneRequest
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Subscriptions", description = "Subscriber billing commands"),
        (name = "Webhooks", description = "Payment gateway callbacks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{PaymentFinalizer, PaymentInitiationFlow, SubscriberCommands};
    use crate::notify::LogNotifier;
    use crate::providers::yookassa::YooKassaClient;
    use crate::storage::{JsonStorage, StoragePaths};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    fn test_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        let storage = Arc::new(storage);

        let gateway = Arc::new(YooKassaClient::new(
            "https://gateway.invalid".into(),
            "shop".into(),
            "secret".into(),
            "https://return.invalid".into(),
        ));
        let notifier = Arc::new(LogNotifier);
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

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (_dir, state) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
