// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! # Renewal Scheduler
//!
//! Background loop that periodically scans for subscriptions whose next
//! charge time has arrived and dispatches one renewal task per match.
//!
//! ## Strategy
//!
//! Every `tick_interval` (default 1 h) the scheduler:
//! 1. Runs the due-scan against the subscription store.
//! 2. Skips subscribers with a renewal still in flight from a previous
//!    tick, so the same subscriber is never charged concurrently.
//! 3. Spawns a renewal task per remaining match, capped by a semaphore
//!    (default 20 in flight) to respect gateway rate limits.
//!
//! A record missed while the process was down is caught on the next tick;
//! `next_charge` only advances after a successful charge.
//!
//! ## Shutdown
//!
//! The loop and the slot-wait are cancellable via `CancellationToken`.
//! Tasks already spawned are tracked on a `TaskTracker` and drain before
//! process exit, so a charge already issued always records its outcome.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::billing::RenewalTask;
use crate::storage::{JsonStorage, SubscriptionRepository};

/// Background renewal scheduler.
pub struct RenewalScheduler {
    storage: Arc<JsonStorage>,
    task: Arc<RenewalTask>,
    tick_interval: Duration,
    slots: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tracker: TaskTracker,
}

impl RenewalScheduler {
    pub fn new(
        storage: Arc<JsonStorage>,
        task: Arc<RenewalTask>,
        tick_interval: Duration,
        max_concurrent: usize,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            storage,
            task,
            tick_interval,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tracker,
        }
    }

    /// Run the scheduler loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.tick_interval.as_secs(),
            "Renewal scheduler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Renewal scheduler shutting down");
                return;
            }

            self.tick_step(&shutdown).await;

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Renewal scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one due-scan and dispatch renewal tasks.
    async fn tick_step(&self, shutdown: &CancellationToken) {
        let due = {
            let subscriptions = SubscriptionRepository::new(&self.storage);
            match subscriptions.list_due(chrono::Utc::now()) {
                Ok(due) => due,
                Err(e) => {
                    // Skip this tick; nothing advanced, the next tick retries.
                    warn!(error = %e, "Renewal due-scan failed");
                    return;
                }
            }
        };

        if due.is_empty() {
            return;
        }

        info!(count = due.len(), "Renewal scheduler: dispatching due charges");

        for record in due {
            let subscriber_id = record.subscriber_id;

            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(subscriber_id.clone()) {
                    // Still being processed from a previous tick.
                    continue;
                }
            }

            let permit = tokio::select! {
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Semaphore closed; leave no stale in-flight entry.
                        self.in_flight.lock().await.remove(&subscriber_id);
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    self.in_flight.lock().await.remove(&subscriber_id);
                    return;
                }
            };

            let task = self.task.clone();
            let in_flight = self.in_flight.clone();
            self.tracker.spawn(async move {
                task.run(&subscriber_id).await;
                in_flight.lock().await.remove(&subscriber_id);
                drop(permit);
            });
        }
    }
}
