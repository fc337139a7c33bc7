//! Per-flow enrichment.
//!
//! [`Enricher::process`] runs one flow start to finish: metadata lookup,
//! sampling-rate resolution, exporter and interface classification,
//! metadata fallback, provider-priority resolution of AS numbers, masks and
//! next hop, then forwarding. A flow is either forwarded whole or dropped.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

use ironflow_core::config::{AsnProvider, EnricherConfig, NetProvider};
use ironflow_core::error::SinkError;
use ironflow_core::pipeline::{FlowSink, MetadataLookup};
use ironflow_core::types::{Boundary, EnrichedFlow, ExporterInfo, InterfaceInfo, RawFlow};
use ironflow_routing::{LookupResult, Routing};
use tracing::{debug, info};

use crate::classifier::{
    ClassifierContext, ClassifierResult, ExporterContext, InterfaceContext, RuleScope, RuleSet,
};
use crate::error::EnricherError;
use crate::providers::{
    AsnCandidates, NetCandidates, resolve_asn, resolve_net_mask, resolve_next_hop, uses_routing,
};
use crate::sampling::SamplingRates;
use crate::sink::encode_flow;
use crate::stats::FlowStats;

/// Why a flow was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Exporter or interface metadata is not cached yet
    MetadataCacheMiss,
    /// An exporter rule called `Reject()`
    RejectedByExporter,
    /// An interface rule called `Reject()` for the ingress or egress interface
    RejectedByInterface,
    /// The forwarding sink refused the record
    Sink(SinkError),
}

impl DropReason {
    /// Value of the `error` or `stage` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MetadataCacheMiss => "metadata cache miss",
            Self::RejectedByExporter => "exporter",
            Self::RejectedByInterface => "interface",
            Self::Sink(_) => "sink",
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RejectedByExporter | Self::RejectedByInterface)
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetadataCacheMiss => f.write_str("metadata cache miss"),
            Self::RejectedByExporter => f.write_str("rejected by exporter classifier"),
            Self::RejectedByInterface => f.write_str("rejected by interface classifier"),
            Self::Sink(e) => write!(f, "sink: {e}"),
        }
    }
}

/// Result of [`Enricher::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Dropped(DropReason),
}

pub struct Enricher {
    topic: String,
    exporter_rules: RuleSet,
    interface_rules: RuleSet,
    sampling: SamplingRates,
    asn_providers: Vec<AsnProvider>,
    net_providers: Vec<NetProvider>,
    with_routing: bool,
    metadata: Arc<dyn MetadataLookup>,
    routing: Option<Arc<Routing>>,
    sink: Arc<dyn FlowSink>,
    stats: Arc<FlowStats>,
}

impl Enricher {
    pub fn builder() -> EnricherBuilder {
        EnricherBuilder::new()
    }

    pub fn stats(&self) -> &Arc<FlowStats> {
        &self.stats
    }

    /// Enrich and forward one flow, updating counters.
    pub fn process(&self, flow: &RawFlow) -> Outcome {
        let exporter = flow.exporter_address;
        self.stats.record_received(exporter);

        let outcome = self.enrich(flow).and_then(|enriched| {
            encode_flow(&self.topic, &enriched)
                .and_then(|record| self.sink.send(record))
                .map_err(DropReason::Sink)
        });
        match outcome {
            Ok(()) => {
                self.stats.record_forwarded(exporter);
                Outcome::Forwarded
            }
            Err(reason) => {
                if reason.is_rejection() {
                    self.stats.record_rejected(exporter, reason.label());
                } else {
                    self.stats.record_error(exporter, reason.label());
                }
                debug!(exporter = %exporter, reason = %reason, "flow dropped");
                Outcome::Dropped(reason)
            }
        }
    }

    /// Build the enriched flow without forwarding or counting it.
    pub fn enrich(&self, flow: &RawFlow) -> Result<EnrichedFlow, DropReason> {
        let exporter_ip = flow.exporter_address;
        let answer = self
            .metadata
            .lookup(exporter_ip, flow.in_if, flow.out_if)
            .map_err(|_| DropReason::MetadataCacheMiss)?;

        let sampling_rate = self.sampling.resolve(exporter_ip, flow.sampling_rate);

        let exporter_ctx = ExporterContext {
            ip: exporter_ip,
            name: &answer.exporter.name,
        };
        let mut exporter_result = ClassifierResult::default();
        self.exporter_rules
            .evaluate(&ClassifierContext::exporter(exporter_ctx), &mut exporter_result);
        if exporter_result.rejected {
            return Err(DropReason::RejectedByExporter);
        }

        let in_iface = self
            .classify_interface(exporter_ctx, flow.in_if, answer.in_if.as_ref(), flow.src_vlan)
            .ok_or(DropReason::RejectedByInterface)?;
        let out_iface = self
            .classify_interface(exporter_ctx, flow.out_if, answer.out_if.as_ref(), flow.dst_vlan)
            .ok_or(DropReason::RejectedByInterface)?;

        let (src_route, dst_route) = match (&self.routing, self.with_routing) {
            (Some(routing), true) => (
                routing.lookup(flow.src_addr, IpAddr::V6(Ipv6Addr::UNSPECIFIED), exporter_ip),
                routing.lookup(flow.dst_addr, flow.next_hop, exporter_ip),
            ),
            _ => (LookupResult::default(), LookupResult::default()),
        };

        let enriched_flow = RawFlow {
            sampling_rate,
            src_as: resolve_asn(
                &self.asn_providers,
                AsnCandidates {
                    flow: flow.src_as,
                    routing: src_route.asn,
                },
            ),
            dst_as: resolve_asn(
                &self.asn_providers,
                AsnCandidates {
                    flow: flow.dst_as,
                    routing: dst_route.asn,
                },
            ),
            src_net_mask: resolve_net_mask(
                &self.net_providers,
                NetCandidates {
                    flow: flow.src_net_mask,
                    routing: src_route.net_mask,
                },
            ),
            dst_net_mask: resolve_net_mask(
                &self.net_providers,
                NetCandidates {
                    flow: flow.dst_net_mask,
                    routing: dst_route.net_mask,
                },
            ),
            next_hop: resolve_next_hop(
                &self.net_providers,
                NetCandidates {
                    flow: flow.next_hop,
                    routing: dst_route.next_hop,
                },
            ),
            ..flow.clone()
        };

        Ok(EnrichedFlow {
            flow: enriched_flow,
            exporter: merge_exporter(exporter_result, &answer.exporter),
            in_iface,
            out_iface,
            dst_as_path: dst_route.as_path,
            dst_communities: dst_route.communities,
            dst_large_communities: dst_route.large_communities,
        })
    }

    /// Classify one interface and merge metadata. `None` means rejected.
    fn classify_interface(
        &self,
        exporter: ExporterContext<'_>,
        index: u32,
        metadata: Option<&InterfaceInfo>,
        vlan: u16,
    ) -> Option<InterfaceInfo> {
        let Some(metadata) = metadata.filter(|_| index != 0) else {
            return Some(InterfaceInfo::default());
        };
        let ctx = ClassifierContext::interface(
            exporter,
            InterfaceContext {
                index,
                name: &metadata.name,
                description: &metadata.description,
                speed: metadata.speed,
                vlan,
            },
        );
        let mut result = ClassifierResult::default();
        self.interface_rules.evaluate(&ctx, &mut result);
        if result.rejected {
            return None;
        }
        Some(merge_interface(result, metadata))
    }
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enricher")
            .field("topic", &self.topic)
            .field("exporter_rules", &self.exporter_rules.len())
            .field("interface_rules", &self.interface_rules.len())
            .field("asn_providers", &self.asn_providers)
            .field("net_providers", &self.net_providers)
            .field("with_routing", &self.with_routing)
            .finish_non_exhaustive()
    }
}

fn or_metadata(classified: String, metadata: &str) -> String {
    if classified.is_empty() {
        metadata.to_owned()
    } else {
        classified
    }
}

fn merge_exporter(result: ClassifierResult, metadata: &ExporterInfo) -> ExporterInfo {
    ExporterInfo {
        name: metadata.name.clone(),
        region: or_metadata(result.region, &metadata.region),
        role: or_metadata(result.role, &metadata.role),
        tenant: or_metadata(result.tenant, &metadata.tenant),
        site: or_metadata(result.site, &metadata.site),
        group: or_metadata(result.group, &metadata.group),
    }
}

fn merge_interface(result: ClassifierResult, metadata: &InterfaceInfo) -> InterfaceInfo {
    InterfaceInfo {
        name: or_metadata(result.name, &metadata.name),
        description: or_metadata(result.description, &metadata.description),
        speed: metadata.speed,
        provider: or_metadata(result.provider, &metadata.provider),
        connectivity: or_metadata(result.connectivity, &metadata.connectivity),
        boundary: match result.boundary {
            Boundary::Undefined => metadata.boundary,
            boundary => boundary,
        },
    }
}

/// Builder for [`Enricher`].
///
/// Metadata and sink are required; routing is optional and only consulted
/// when `routing` appears in one of the provider lists.
pub struct EnricherBuilder {
    config: EnricherConfig,
    topic: String,
    metadata: Option<Arc<dyn MetadataLookup>>,
    routing: Option<Arc<Routing>>,
    sink: Option<Arc<dyn FlowSink>>,
    stats: Option<Arc<FlowStats>>,
}

impl EnricherBuilder {
    pub fn new() -> Self {
        Self {
            config: EnricherConfig::default(),
            topic: "flows".to_owned(),
            metadata: None,
            routing: None,
            sink: None,
            stats: None,
        }
    }

    pub fn config(mut self, config: EnricherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn routing(mut self, routing: Arc<Routing>) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn FlowSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share counters with another component; a fresh set is created otherwise.
    pub fn stats(mut self, stats: Arc<FlowStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Compile classifiers and sampling tables. Any invalid rule or prefix fails.
    pub fn build(self) -> Result<Enricher, EnricherError> {
        let metadata = self.metadata.ok_or_else(|| missing("metadata"))?;
        let sink = self.sink.ok_or_else(|| missing("sink"))?;

        let exporter_rules =
            RuleSet::compile(RuleScope::Exporter, &self.config.exporter_classifiers)?;
        let interface_rules =
            RuleSet::compile(RuleScope::Interface, &self.config.interface_classifiers)?;
        let sampling = SamplingRates::new(
            &self.config.override_sampling_rate,
            &self.config.default_sampling_rate,
        )?;
        let with_routing = uses_routing(&self.config.asn_providers, &self.config.net_providers);
        if with_routing && self.routing.is_none() {
            debug!("routing provider configured without a routing component");
        }

        info!(
            exporter_rules = exporter_rules.len(),
            interface_rules = interface_rules.len(),
            with_routing,
            "enricher ready"
        );

        Ok(Enricher {
            topic: self.topic,
            exporter_rules,
            interface_rules,
            sampling,
            asn_providers: self.config.asn_providers,
            net_providers: self.config.net_providers,
            with_routing,
            metadata,
            routing: self.routing,
            sink,
            stats: self.stats.unwrap_or_default(),
        })
    }
}

impl Default for EnricherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> EnricherError {
    EnricherError::Config {
        field: field.to_owned(),
        reason: "not set".to_owned(),
    }
}
