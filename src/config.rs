// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for persisted subscription records | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SUBSCRIPTION_AMOUNT` | Charge amount, two-decimal string | `10.00` |
//! | `SUBSCRIPTION_CURRENCY` | ISO currency code | `RUB` |
//! | `SUBSCRIPTION_PERIOD_DAYS` | Paid period granted per payment | `30` |
//! | `PAYMENT_POLL_INTERVAL_SECS` | Sleep between payment status polls | `5` |
//! | `PAYMENT_MAX_POLL_ATTEMPTS` | Pending polls before giving up | `12` |
//! | `RENEWAL_TICK_SECS` | Interval between renewal due-scans | `3600` |
//! | `MAX_CONCURRENT_RENEWALS` | In-flight renewal task cap | `20` |
//! | `YOOKASSA_SHOP_ID` | Gateway shop id (Basic auth user) | Required |
//! | `YOOKASSA_SECRET_KEY` | Gateway secret key (Basic auth password) | Required |
//! | `YOOKASSA_API_BASE_URL` | Gateway API base URL | `https://api.yookassa.ru` |
//! | `PAYMENT_RETURN_URL` | Redirect target after hosted confirmation | Required |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use tracing::warn;

/// Environment variable name for the persistent data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default charge amount when `SUBSCRIPTION_AMOUNT` is unset.
pub const DEFAULT_AMOUNT: &str = "10.00";

/// Default currency for subscription charges.
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Default paid period per successful payment, in days.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Default sleep between payment status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of `pending` observations before the poller gives up.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 12;

/// Default interval between renewal due-scans.
pub const DEFAULT_RENEWAL_TICK: Duration = Duration::from_secs(3600);

/// Default cap on concurrently running renewal tasks.
pub const DEFAULT_MAX_CONCURRENT_RENEWALS: usize = 20;

/// Engine configuration resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Charge amount as a normalized two-decimal money string.
    pub amount: String,
    /// ISO currency code for all charges.
    pub currency: String,
    /// Paid period granted per successful payment.
    pub period_days: i64,
    /// Sleep between payment status polls.
    pub poll_interval: Duration,
    /// Number of `pending` observations before the poller gives up.
    pub max_poll_attempts: u32,
    /// Interval between renewal due-scans.
    pub renewal_tick: Duration,
    /// Cap on concurrently running renewal tasks.
    pub max_concurrent_renewals: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            amount: DEFAULT_AMOUNT.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            period_days: DEFAULT_PERIOD_DAYS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            renewal_tick: DEFAULT_RENEWAL_TICK,
            max_concurrent_renewals: DEFAULT_MAX_CONCURRENT_RENEWALS,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// (with a warning) on missing or malformed values.
    pub fn from_env() -> Self {
        let amount = match std::env::var("SUBSCRIPTION_AMOUNT") {
            Ok(raw) => match normalize_amount(&raw) {
                Some(normalized) => normalized,
                None => {
                    warn!(raw = %raw, "Invalid SUBSCRIPTION_AMOUNT, using default");
                    DEFAULT_AMOUNT.to_string()
                }
            },
            Err(_) => DEFAULT_AMOUNT.to_string(),
        };

        Self {
            amount,
            currency: env_or("SUBSCRIPTION_CURRENCY", DEFAULT_CURRENCY.to_string(), |v| {
                Some(v.to_ascii_uppercase())
            }),
            period_days: env_or("SUBSCRIPTION_PERIOD_DAYS", DEFAULT_PERIOD_DAYS, |v| {
                v.parse().ok().filter(|days| *days > 0)
            }),
            poll_interval: env_or("PAYMENT_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL, |v| {
                v.parse().ok().map(Duration::from_secs)
            }),
            max_poll_attempts: env_or(
                "PAYMENT_MAX_POLL_ATTEMPTS",
                DEFAULT_MAX_POLL_ATTEMPTS,
                |v| v.parse().ok().filter(|n| *n > 0),
            ),
            renewal_tick: env_or("RENEWAL_TICK_SECS", DEFAULT_RENEWAL_TICK, |v| {
                v.parse().ok().map(Duration::from_secs)
            }),
            max_concurrent_renewals: env_or(
                "MAX_CONCURRENT_RENEWALS",
                DEFAULT_MAX_CONCURRENT_RENEWALS,
                |v| v.parse().ok().filter(|n| *n > 0),
            ),
        }
    }
}

fn env_or<T>(name: &str, default: T, parse: impl FnOnce(&str) -> Option<T>) -> T {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return default;
            }
            match parse(trimmed) {
                Some(parsed) => parsed,
                None => {
                    warn!(var = name, raw = %trimmed, "Invalid value, using default");
                    default
                }
            }
        }
        Err(_) => default,
    }
}

/// Validate and normalize a money amount to a `"W.FF"` two-decimal string.
///
/// Rejects empty input, non-digit characters, more than two decimal places,
/// and zero.
pub fn normalize_amount(amount: &str) -> Option<String> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() > 2 {
        return None;
    }

    let whole_part = parts[0];
    if whole_part.is_empty() || !whole_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole = whole_part.parse::<u64>().ok()?;

    let fraction_part = if parts.len() == 2 { parts[1] } else { "" };
    if !fraction_part.chars().all(|c| c.is_ascii_digit()) || fraction_part.len() > 2 {
        return None;
    }
    let fraction = match fraction_part.len() {
        0 => 0,
        1 => fraction_part.parse::<u64>().ok()? * 10,
        _ => fraction_part.parse::<u64>().ok()?,
    };

    if whole == 0 && fraction == 0 {
        return None;
    }

    Some(format!("{whole}.{fraction:02}"))
}
