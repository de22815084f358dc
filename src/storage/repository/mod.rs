// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Repository layer providing typed access to the JSON file store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using the JsonStorage for all file operations.

pub mod finalized;
pub mod pending;
pub mod subscriptions;

pub use finalized::{FinalizedPayment, FinalizedPaymentRepository};
pub use pending::{PendingInitiation, PendingInitiationRepository};
pub use subscriptions::{SubscriptionRecord, SubscriptionRepository};
