//! Allocation metrics.
//!
//! Lock-free counters updated on the allocation path, with per-sequence
//! high watermarks kept in a concurrent map.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Metrics shared by all allocators built from the same registry.
#[derive(Default)]
pub struct AllocatorMetrics {
    /// Values successfully issued
    pub allocations_total: AtomicU64,
    /// Counters created by a first allocation
    pub counters_created_total: AtomicU64,
    /// Conditional writes that lost a race and were retried
    pub conflicts_total: AtomicU64,
    /// Allocations that returned an error
    pub failures_total: AtomicU64,
    /// Highest value issued per sequence by this process
    high_watermarks: DashMap<String, u64>,
}

/// Point-in-time copy of `AllocatorMetrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub allocations_total: u64,
    pub counters_created_total: u64,
    pub conflicts_total: u64,
    pub failures_total: u64,
}

impl AllocatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&self, sequence: &str, value: u64, created: bool) {
        self.allocations_total.fetch_add(1, Ordering::Relaxed);
        if created {
            self.counters_created_total.fetch_add(1, Ordering::Relaxed);
        }
        self.high_watermarks
            .entry(sequence.to_string())
            .and_modify(|v| *v = (*v).max(value))
            .or_insert(value);
    }

    #[inline]
    pub fn record_conflict(&self) {
        self.conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest value this process issued for `sequence`.
    pub fn high_watermark(&self, sequence: &str) -> Option<u64> {
        self.high_watermarks.get(sequence).map(|v| *v)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations_total: self.allocations_total.load(Ordering::Relaxed),
            counters_created_total: self.counters_created_total.load(Ordering::Relaxed),
            conflicts_total: self.conflicts_total.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
        }
    }

    /// Formats allocator metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::with_capacity(1024);

        for (name, help, value) in [
            (
                "salon_ledger_allocations_total",
                "Sequence values issued",
                snapshot.allocations_total,
            ),
            (
                "salon_ledger_counters_created_total",
                "Counters created on first use",
                snapshot.counters_created_total,
            ),
            (
                "salon_ledger_conflicts_total",
                "Optimistic writes retried after a conflict",
                snapshot.conflicts_total,
            ),
            (
                "salon_ledger_failures_total",
                "Allocations that failed",
                snapshot.failures_total,
            ),
        ] {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }

        let _ = writeln!(
            output,
            "# HELP salon_ledger_sequence_high_watermark Highest value issued per sequence"
        );
        let _ = writeln!(output, "# TYPE salon_ledger_sequence_high_watermark gauge");
        for entry in self.high_watermarks.iter() {
            let _ = writeln!(
                output,
                "salon_ledger_sequence_high_watermark{{sequence=\"{}\"}} {}",
                entry.key(),
                entry.value()
            );
        }

        output
    }
}
