//! In-process counter registry backing `/metrics` and `/metrics/prometheus`
//! (SPEC_FULL §C.4). Ordinary observability bookkeeping, carried regardless
//! of the dashboard UI being out of scope.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub jobs_dispatched: IntCounterVec,
    pub jobs_completed: IntCounterVec,
    pub jobs_dead_lettered: IntCounter,
    pub jobs_dropped: IntCounter,
    pub proofs_generated: IntCounterVec,
    pub ocr_rounds_sealed: IntCounter,
    pub tx_submitted: IntCounter,
    pub tx_confirmed: IntCounter,
    pub tx_failed: IntCounter,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        let registry = Registry::new();

        let jobs_dispatched = IntCounterVec::new(
            Opts::new("oracle_jobs_dispatched_total", "Jobs dispatched by kind"),
            &["kind"],
        )
        .expect("valid metric");
        let jobs_completed = IntCounterVec::new(
            Opts::new("oracle_jobs_completed_total", "Jobs completed by kind"),
            &["kind"],
        )
        .expect("valid metric");
        let jobs_dead_lettered = IntCounter::new(
            "oracle_jobs_dead_lettered_total",
            "Jobs moved to the dead-letter queue",
        )
        .expect("valid metric");
        let jobs_dropped = IntCounter::new(
            "oracle_jobs_dropped_total",
            "Jobs dropped at dispatch due to a full queue",
        )
        .expect("valid metric");
        let proofs_generated = IntCounterVec::new(
            Opts::new("oracle_proofs_generated_total", "Proofs generated by circuit"),
            &["circuit"],
        )
        .expect("valid metric");
        let ocr_rounds_sealed = IntCounter::new(
            "oracle_ocr_rounds_sealed_total",
            "OCR rounds that reached threshold and sealed",
        )
        .expect("valid metric");
        let tx_submitted =
            IntCounter::new("oracle_tx_submitted_total", "Transactions submitted").expect("valid metric");
        let tx_confirmed =
            IntCounter::new("oracle_tx_confirmed_total", "Transactions confirmed").expect("valid metric");
        let tx_failed =
            IntCounter::new("oracle_tx_failed_total", "Transactions that failed after retries").expect("valid metric");

        registry.register(Box::new(jobs_dispatched.clone())).expect("register");
        registry.register(Box::new(jobs_completed.clone())).expect("register");
        registry.register(Box::new(jobs_dead_lettered.clone())).expect("register");
        registry.register(Box::new(jobs_dropped.clone())).expect("register");
        registry.register(Box::new(proofs_generated.clone())).expect("register");
        registry.register(Box::new(ocr_rounds_sealed.clone())).expect("register");
        registry.register(Box::new(tx_submitted.clone())).expect("register");
        registry.register(Box::new(tx_confirmed.clone())).expect("register");
        registry.register(Box::new(tx_failed.clone())).expect("register");

        Arc::new(Self {
            registry,
            jobs_dispatched,
            jobs_completed,
            jobs_dead_lettered,
            jobs_dropped,
            proofs_generated,
            ocr_rounds_sealed,
            tx_submitted,
            tx_confirmed,
            tx_failed,
        })
    }

    pub fn render_prometheus(&self) -> String {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("prometheus encoding cannot fail");
        String::from_utf8(buf).expect("prometheus text exposition is valid utf8")
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_dead_lettered: self.jobs_dead_lettered.get(),
            jobs_dropped: self.jobs_dropped.get(),
            ocr_rounds_sealed: self.ocr_rounds_sealed.get(),
            tx_submitted: self.tx_submitted.get(),
            tx_confirmed: self.tx_confirmed.get(),
            tx_failed: self.tx_failed.get(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_dead_lettered: u64,
    pub jobs_dropped: u64,
    pub ocr_rounds_sealed: u64,
    pub tx_submitted: u64,
    pub tx_confirmed: u64,
    pub tx_failed: u64,
}
