//! Audit counters for the secured layer.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by every secured collection of an interface.
#[derive(Debug, Default)]
pub struct SecurityMetrics {
    operations: AtomicU64,
    violations: AtomicU64,
    store_failures: AtomicU64,
}

impl SecurityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }
}

/// Point-in-time view returned by `SecuredInterface::metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Secured operations attempted, successful or not.
    pub operations: u64,
    /// Attempted bypasses and inadmissible writes.
    pub violations: u64,
    /// Store failures after security checks passed.
    pub store_failures: u64,
    pub registered_collections: usize,
    pub field_mappings: usize,
}
