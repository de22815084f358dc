// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

use std::{env, net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use tracing_subscriber::EnvFilter;

use billing_engine::api::router;
use billing_engine::billing::{
    PaymentFinalizer, PaymentInitiationFlow, RenewalScheduler, RenewalTask, SubscriberCommands,
};
use billing_engine::config::{Config, DATA_DIR_ENV};
use billing_engine::notify::LogNotifier;
use billing_engine::providers::yookassa::YooKassaClient;
use billing_engine::state::AppState;
use billing_engine::storage::{JsonStorage, StoragePaths};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env();

    // Storage must be available before anything else starts.
    let data_dir =
        env::var(DATA_DIR_ENV).unwrap_or_else(|_| StoragePaths::default().root().display().to_string());
    let mut storage = JsonStorage::new(StoragePaths::new(&data_dir));
    storage
        .initialize()
        .expect("Failed to initialize storage directories");
    let storage = Arc::new(storage);

    let gateway =
        Arc::new(YooKassaClient::from_env().expect("Payment gateway is not configured"));
    let notifier = Arc::new(LogNotifier);

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let finalizer = Arc::new(PaymentFinalizer::new(
        storage.clone(),
        notifier.clone(),
        config.period_days,
    ));
    let initiation = Arc::new(PaymentInitiationFlow::new(
        storage.clone(),
        gateway.clone(),
        notifier.clone(),
        finalizer.clone(),
        config.amount.clone(),
        config.currency.clone(),
        config.poll_interval,
        config.max_poll_attempts,
        tracker.clone(),
        shutdown.clone(),
    ));
    let commands = Arc::new(SubscriberCommands::new(storage.clone()));

    let renewal_task = Arc::new(RenewalTask::new(
        storage.clone(),
        gateway.clone(),
        notifier.clone(),
        finalizer.clone(),
        config.amount.clone(),
        config.currency.clone(),
    ));
    let scheduler = RenewalScheduler::new(
        storage.clone(),
        renewal_task,
        config.renewal_tick,
        config.max_concurrent_renewals,
        tracker.clone(),
    );
    tracker.spawn(scheduler.run(shutdown.clone()));

    let state = AppState::new(storage, gateway, initiation, commands, finalizer);
    let app = router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    info!(addr = %addr, "Billing engine listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .expect("HTTP server failed");

    // Let in-flight pollers and renewal charges record their outcome; a
    // charge already issued must never be cancelled mid-write.
    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    info!("All background tasks drained, exiting");
}
