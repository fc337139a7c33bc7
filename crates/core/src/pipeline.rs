//! Pipeline lifecycle and the collaborator traits the enricher depends on.

use std::future::Future;
use std::net::IpAddr;

use serde::Serialize;

use crate::error::{IronflowError, MetadataError, SinkError};
use crate::types::{ExporterInfo, FlowRecord, InterfaceInfo};

/// Component health as reported to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// A long-running component with an explicit lifecycle.
pub trait Pipeline: Send {
    /// Spawn background tasks.
    fn start(&mut self) -> impl Future<Output = Result<(), IronflowError>> + Send;

    /// Stop background tasks and wait for them to finish.
    fn stop(&mut self) -> impl Future<Output = Result<(), IronflowError>> + Send;

    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// Metadata for one exporter and the interfaces a flow references.
///
/// An interface is `None` when the flow carries index 0 for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataAnswer {
    pub exporter: ExporterInfo,
    pub in_if: Option<InterfaceInfo>,
    pub out_if: Option<InterfaceInfo>,
}

/// Exporter and interface metadata source.
///
/// Implementations must not block: a value that is not cached yet is a
/// [`MetadataError::CacheMiss`] and the flow is dropped.
pub trait MetadataLookup: Send + Sync {
    fn lookup(
        &self,
        exporter: IpAddr,
        in_if: u32,
        out_if: u32,
    ) -> Result<MetadataAnswer, MetadataError>;
}

/// Outbound destination for enriched flows.
pub trait FlowSink: Send + Sync {
    /// Hand a record over without blocking the caller.
    fn send(&self, record: FlowRecord) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("busy".to_owned()).is_healthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Degraded("queue 95%".to_owned())).unwrap();
        assert_eq!(json, r#"{"status":"degraded","reason":"queue 95%"}"#);
    }
}
