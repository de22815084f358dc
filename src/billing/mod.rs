// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! The billing engine: payment initiation, status confirmation,
//! subscription activation, and automatic renewal.
//!
//! Flows are wired leaf-first: the [`finalizer::PaymentFinalizer`] is the
//! single place a succeeded payment becomes subscription time, shared by
//! the status poller, the webhook path, and renewal charges.

pub mod commands;
pub mod finalizer;
pub mod initiation;
pub mod poller;
pub mod renewal;
pub mod scheduler;

pub use commands::{CommandError, SubscriberCommands};
pub use finalizer::{FinalizeOutcome, PaymentFinalizer};
pub use initiation::{InitiationError, InitiationOutcome, PaymentInitiationFlow};
pub use poller::PaymentStatusPoller;
pub use renewal::RenewalTask;
pub use scheduler::RenewalScheduler;
