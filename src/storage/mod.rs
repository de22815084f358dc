// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! # Subscription Storage Module
//!
//! Persistent storage for the billing engine: one JSON file per record
//! under the data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   subscriptions/
//!     {subscriber_id}.json   # Subscription record (state, method, schedule)
//!   finalized/
//!     {payment_id}.json      # Finalized payment markers (idempotence guard)
//!   pending/
//!     {subscriber_id}.json   # Initiations suspended awaiting a phone number
//! ```
//!
//! All writes go through a temp-file-then-rename so records are never torn.

pub mod json_fs;
pub mod paths;
pub mod repository;

pub use json_fs::{JsonStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    FinalizedPayment, FinalizedPaymentRepository, PendingInitiation, PendingInitiationRepository,
    SubscriptionRecord, SubscriptionRepository,
};
