//! Metric names and descriptions.
//!
//! Every Prometheus metric ironflow emits is named here. Components call
//! `metrics::counter!()` / `metrics::gauge!()` with these constants.
//!
//! # Naming
//!
//! - prefix: `ironflow_`
//! - component: `enricher_`, `routing_`, `http_`
//! - suffix: `_total` for counters, none for gauges
//!
//! ```ignore
//! metrics::counter!(
//!     ironflow_core::metrics::ENRICHER_FLOWS_RECEIVED_TOTAL,
//!     ironflow_core::metrics::LABEL_EXPORTER => "192.0.2.142"
//! )
//! .increment(1);
//! ```

// ─── label keys ────────────────────────────────────────────────────

/// Exporter address
pub const LABEL_EXPORTER: &str = "exporter";

/// Error kind (`metadata cache miss`, `sink`)
pub const LABEL_ERROR: &str = "error";

/// Rejecting rule stage (`exporter`, `interface`)
pub const LABEL_STAGE: &str = "stage";

/// Classifier scope (`exporter`, `interface`)
pub const LABEL_SCOPE: &str = "scope";

// ─── enricher ──────────────────────────────────────────────────────

/// Flows handed to the enricher (counter, label: exporter)
pub const ENRICHER_FLOWS_RECEIVED_TOTAL: &str = "ironflow_enricher_flows_received_total";

/// Flows sent to the sink (counter, label: exporter)
pub const ENRICHER_FLOWS_FORWARDED_TOTAL: &str = "ironflow_enricher_flows_forwarded_total";

/// Flows dropped because of an error (counter, labels: exporter, error)
pub const ENRICHER_FLOWS_ERRORS_TOTAL: &str = "ironflow_enricher_flows_errors_total";

/// Flows dropped by a `Reject()` rule (counter, labels: exporter, stage)
pub const ENRICHER_FLOWS_REJECTED_TOTAL: &str = "ironflow_enricher_flows_rejected_total";

/// Classifier runtime errors (counter, label: scope)
pub const ENRICHER_CLASSIFIER_ERRORS_TOTAL: &str = "ironflow_enricher_classifier_errors_total";

/// Busy enricher workers (gauge)
pub const ENRICHER_WORKERS_ACTIVE: &str = "ironflow_enricher_workers_active";

// ─── routing ───────────────────────────────────────────────────────

/// Routing lookups performed (counter)
pub const ROUTING_LOOKUPS_TOTAL: &str = "ironflow_routing_lookups_total";

/// Routing lookups that failed (counter)
pub const ROUTING_LOOKUPS_FAILED_TOTAL: &str = "ironflow_routing_lookups_failed_total";

// ─── http ──────────────────────────────────────────────────────────

/// In-flight HTTP requests (gauge)
pub const HTTP_CLIENTS: &str = "ironflow_http_clients";

/// Register descriptions for all metrics.
///
/// Call once after the recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        ENRICHER_FLOWS_RECEIVED_TOTAL,
        "Total number of flows received by the enricher"
    );
    describe_counter!(
        ENRICHER_FLOWS_FORWARDED_TOTAL,
        "Total number of enriched flows forwarded to the sink"
    );
    describe_counter!(
        ENRICHER_FLOWS_ERRORS_TOTAL,
        "Total number of flows dropped because of an error"
    );
    describe_counter!(
        ENRICHER_FLOWS_REJECTED_TOTAL,
        "Total number of flows rejected by classifier rules"
    );
    describe_counter!(
        ENRICHER_CLASSIFIER_ERRORS_TOTAL,
        "Total number of classifier rule runtime errors"
    );
    describe_gauge!(
        ENRICHER_WORKERS_ACTIVE,
        "Number of running enricher workers"
    );
    describe_counter!(ROUTING_LOOKUPS_TOTAL, "Total number of routing lookups");
    describe_counter!(
        ROUTING_LOOKUPS_FAILED_TOTAL,
        "Total number of failed routing lookups"
    );
    describe_gauge!(HTTP_CLIENTS, "Number of in-flight HTTP requests");
}
