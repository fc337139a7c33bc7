//! Per-exporter flow counters.
//!
//! Every update is mirrored to the `metrics` facade; the atomic copy backs
//! [`FlowStats::snapshot`] for health reporting and tests.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use ironflow_core::metrics as m;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct ExporterCounters {
    received: AtomicU64,
    forwarded: AtomicU64,
    errors: Mutex<BTreeMap<&'static str, u64>>,
    rejected: Mutex<BTreeMap<&'static str, u64>>,
}

/// Point-in-time copy of one exporter's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExporterStats {
    pub received: u64,
    pub forwarded: u64,
    pub errors: BTreeMap<&'static str, u64>,
    pub rejected: BTreeMap<&'static str, u64>,
}

impl ExporterStats {
    pub fn errors_total(&self) -> u64 {
        self.errors.values().sum()
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

#[derive(Debug, Default)]
pub struct FlowStats {
    exporters: DashMap<IpAddr, ExporterCounters>,
}

impl FlowStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, exporter: IpAddr) {
        let exporter = exporter.to_canonical();
        self.counters(exporter, |c| {
            c.received.fetch_add(1, Ordering::Relaxed);
        });
        metrics::counter!(m::ENRICHER_FLOWS_RECEIVED_TOTAL, m::LABEL_EXPORTER => exporter.to_string())
            .increment(1);
    }

    pub fn record_forwarded(&self, exporter: IpAddr) {
        let exporter = exporter.to_canonical();
        self.counters(exporter, |c| {
            c.forwarded.fetch_add(1, Ordering::Relaxed);
        });
        metrics::counter!(m::ENRICHER_FLOWS_FORWARDED_TOTAL, m::LABEL_EXPORTER => exporter.to_string())
            .increment(1);
    }

    pub fn record_error(&self, exporter: IpAddr, kind: &'static str) {
        let exporter = exporter.to_canonical();
        self.counters(exporter, |c| {
            *c.errors.lock().entry(kind).or_default() += 1;
        });
        metrics::counter!(
            m::ENRICHER_FLOWS_ERRORS_TOTAL,
            m::LABEL_EXPORTER => exporter.to_string(),
            m::LABEL_ERROR => kind
        )
        .increment(1);
    }

    pub fn record_rejected(&self, exporter: IpAddr, stage: &'static str) {
        let exporter = exporter.to_canonical();
        self.counters(exporter, |c| {
            *c.rejected.lock().entry(stage).or_default() += 1;
        });
        metrics::counter!(
            m::ENRICHER_FLOWS_REJECTED_TOTAL,
            m::LABEL_EXPORTER => exporter.to_string(),
            m::LABEL_STAGE => stage
        )
        .increment(1);
    }

    /// Counters for one exporter, zeroed when it has never been seen.
    pub fn exporter(&self, exporter: IpAddr) -> ExporterStats {
        self.exporters
            .get(&exporter.to_canonical())
            .map(|c| Self::copy(&c))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<IpAddr, ExporterStats> {
        self.exporters
            .iter()
            .map(|entry| (*entry.key(), Self::copy(entry.value())))
            .collect()
    }

    fn counters(&self, exporter: IpAddr, update: impl FnOnce(&ExporterCounters)) {
        let entry = self.exporters.entry(exporter).or_default();
        update(&entry);
    }

    fn copy(c: &ExporterCounters) -> ExporterStats {
        ExporterStats {
            received: c.received.load(Ordering::Relaxed),
            forwarded: c.forwarded.load(Ordering::Relaxed),
            errors: c.errors.lock().clone(),
            rejected: c.rejected.lock().clone(),
        }
    }
}
