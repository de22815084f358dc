// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Billing Engine - Subscription Billing & Renewal Service
//!
//! Creates one-time payments against the payment gateway, confirms them,
//! activates time-boxed subscriptions, and auto-renews saved payment
//! methods on a scheduled due-scan.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `billing` - Initiation, polling, finalization, renewal scheduling
//! - `providers` - Payment gateway contract and YooKassa client
//! - `storage` - JSON file store and repositories

pub mod api;
pub mod billing;
pub mod config;
pub mod error;
pub mod notify;
pub mod providers;
pub mod state;
pub mod storage;
