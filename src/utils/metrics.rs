//! Observability and Metrics
//!
//! Per-protocol counters for registry and dispatch activity.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector owned by one protocol instance
#[derive(Debug)]
pub struct RegistryMetrics {
    /// Messages encoded for sending
    pub messages_encoded: AtomicU64,
    /// Messages decoded from inbound payloads
    pub messages_decoded: AtomicU64,
    /// Messages handed to a handler
    pub messages_dispatched: AtomicU64,
    /// Payload bytes produced by encoding
    pub bytes_encoded: AtomicU64,
    /// Payload bytes consumed by decoding
    pub bytes_decoded: AtomicU64,
    /// Opcodes minted on first use
    pub dynamic_allocations: AtomicU64,
    /// Dynamic allocations refused because the opcode space was full
    pub capacity_exhausted: AtomicU64,
    /// Inbound opcodes with no binding
    pub unknown_opcodes: AtomicU64,
    /// Decoded messages with no handler
    pub missing_handlers: AtomicU64,
    /// Handler invocations that returned an error
    pub handler_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self {
            messages_encoded: AtomicU64::new(0),
            messages_decoded: AtomicU64::new(0),
            messages_dispatched: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            dynamic_allocations: AtomicU64::new(0),
            capacity_exhausted: AtomicU64::new(0),
            unknown_opcodes: AtomicU64::new(0),
            missing_handlers: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn message_encoded(&self, byte_count: u64) {
        self.messages_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn message_decoded(&self, byte_count: u64) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dynamic_allocation(&self) {
        self.dynamic_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn capacity_exceeded(&self) {
        self.capacity_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_opcode(&self) {
        self.unknown_opcodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn missing_handler(&self) {
        self.missing_handlers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_encoded: self.messages_encoded.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            dynamic_allocations: self.dynamic_allocations.load(Ordering::Relaxed),
            capacity_exhausted: self.capacity_exhausted.load(Ordering::Relaxed),
            unknown_opcodes: self.unknown_opcodes.load(Ordering::Relaxed),
            missing_handlers: self.missing_handlers.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self, protocol: &str) {
        let snapshot = self.snapshot();
        info!(
            protocol,
            messages_encoded = snapshot.messages_encoded,
            messages_decoded = snapshot.messages_decoded,
            messages_dispatched = snapshot.messages_dispatched,
            bytes_encoded = snapshot.bytes_encoded,
            bytes_decoded = snapshot.bytes_decoded,
            dynamic_allocations = snapshot.dynamic_allocations,
            capacity_exhausted = snapshot.capacity_exhausted,
            unknown_opcodes = snapshot.unknown_opcodes,
            missing_handlers = snapshot.missing_handlers,
            handler_failures = snapshot.handler_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Registry metrics snapshot"
        );
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_encoded: u64,
    pub messages_decoded: u64,
    pub messages_dispatched: u64,
    pub bytes_encoded: u64,
    pub bytes_decoded: u64,
    pub dynamic_allocations: u64,
    pub capacity_exhausted: u64,
    pub unknown_opcodes: u64,
    pub missing_handlers: u64,
    pub handler_failures: u64,
    pub uptime_seconds: u64,
}
