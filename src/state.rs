// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

use std::sync::Arc;

use crate::billing::{PaymentFinalizer, PaymentInitiationFlow, SubscriberCommands};
use crate::providers::PaymentGateway;
use crate::storage::JsonStorage;

/// Shared application state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<JsonStorage>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub initiation: Arc<PaymentInitiationFlow>,
    pub commands: Arc<SubscriberCommands>,
    pub finalizer: Arc<PaymentFinalizer>,
}

impl AppState {
    pub fn new(
        storage: Arc<JsonStorage>,
        gateway: Arc<dyn PaymentGateway>,
        initiation: Arc<PaymentInitiationFlow>,
        commands: Arc<SubscriberCommands>,
        finalizer: Arc<PaymentFinalizer>,
    ) -> Self {
        Self {
            storage,
            gateway,
            initiation,
            commands,
            finalizer,
        }
    }

    pub fn storage(&self) -> &JsonStorage {
        &self.storage
    }
}
