// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Billing Engine Maintainers

//! Path constants and utilities for the persistent storage layout.

use std::path::{Path, PathBuf};

/// Base directory for all persistent storage.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the billing data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all billing data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Subscription Paths ==========

    /// Directory containing all subscription records.
    pub fn subscriptions_dir(&self) -> PathBuf {
        self.root.join("subscriptions")
    }

    /// Path to a specific subscriber's record.
    pub fn subscription(&self, subscriber_id: &str) -> PathBuf {
        self.subscriptions_dir()
            .join(format!("{subscriber_id}.json"))
    }

    // ========== Finalized Payment Paths ==========

    /// Directory containing finalized payment markers.
    pub fn finalized_dir(&self) -> PathBuf {
        self.root.join("finalized")
    }

    /// Path to a specific finalized payment marker.
    pub fn finalized_payment(&self, payment_id: &str) -> PathBuf {
        self.finalized_dir().join(format!("{payment_id}.json"))
    }

    // ========== Pending Initiation Paths ==========

    /// Directory containing pending phone-collection records.
    pub fn pending_dir(&self) -> PathBuf {
        self.root.join("pending")
    }

    /// Path to a specific subscriber's pending initiation record.
    pub fn pending_initiation(&self, subscriber_id: &str) -> PathBuf {
        self.pending_dir().join(format!("{subscriber_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.subscription("sub-123"),
            PathBuf::from("/tmp/test-data/subscriptions/sub-123.json")
        );
    }

    #[test]
    fn subscription_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.subscriptions_dir(),
            PathBuf::from("/data/subscriptions")
        );
        assert_eq!(
            paths.subscription("42"),
            PathBuf::from("/data/subscriptions/42.json")
        );
    }

    #[test]
    fn finalized_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.finalized_dir(), PathBuf::from("/data/finalized"));
        assert_eq!(
            paths.finalized_payment("pay-123"),
            PathBuf::from("/data/finalized/pay-123.json")
        );
    }

    #[test]
    fn pending_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.pending_dir(), PathBuf::from("/data/pending"));
        assert_eq!(
            paths.pending_initiation("42"),
            PathBuf::from("/data/pending/42.json")
        );
    }
}
