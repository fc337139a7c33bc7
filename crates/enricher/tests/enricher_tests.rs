//! End-to-end enrichment tests: metadata cache, classifiers, sampling,
//! provider priority and routing wired together.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use ironflow_core::config::{AsnProvider, EnricherConfig, NetProvider, SamplingRateSetting};
use ironflow_core::net::host_net;
use ironflow_core::pipeline::Pipeline;
use ironflow_core::types::{
    Boundary, EnrichedFlow, ExporterInfo, FlowRecord, InterfaceInfo, LargeCommunity, RawFlow,
};
use ironflow_enricher::{ChannelSink, DropReason, Enricher, FlowPipeline, MetadataCache, Outcome};
use ironflow_routing::{LookupResult, Route, RouteEntry, RouteProvider, Routing, RoutingError, StaticRib};
use tokio::sync::mpsc;

const EXPORTER: &str = "192.0.2.142";

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

/// Cache populated the way a poller would: exporter `192_0_2_142`,
/// interface `n` named `Gi0/0/n`, described `Interface n`, 1 Gbps.
fn warm_metadata() -> MetadataCache {
    let cache = MetadataCache::new();
    fill_metadata(&cache);
    cache
}

fn fill_metadata(cache: &MetadataCache) {
    cache.insert_exporter(
        host_net(ip(EXPORTER)),
        ExporterInfo {
            name: "192_0_2_142".to_owned(),
            ..Default::default()
        },
    );
    for index in [100, 200] {
        cache.insert_interface(
            ip(EXPORTER),
            index,
            InterfaceInfo {
                name: format!("Gi0/0/{index}"),
                description: format!("Interface {index}"),
                speed: 1000,
                ..Default::default()
            },
        );
    }
}

fn flow() -> RawFlow {
    RawFlow {
        sampling_rate: 1000,
        exporter_address: ip("::ffff:192.0.2.142"),
        in_if: 100,
        out_if: 200,
        ..Default::default()
    }
}

struct Harness {
    enricher: Enricher,
    records: mpsc::Receiver<FlowRecord>,
}

impl Harness {
    fn new(config: EnricherConfig) -> Self {
        Self::with(config, warm_metadata(), None)
    }

    fn with(config: EnricherConfig, metadata: MetadataCache, routing: Option<Arc<Routing>>) -> Self {
        let (sink, records) = ChannelSink::new(64);
        let mut builder = Enricher::builder()
            .config(config)
            .topic("flows")
            .metadata(Arc::new(metadata))
            .sink(Arc::new(sink));
        if let Some(routing) = routing {
            builder = builder.routing(routing);
        }
        Self {
            enricher: builder.build().unwrap(),
            records,
        }
    }

    /// Process a flow and decode what reached the sink, if anything.
    fn run(&mut self, flow: &RawFlow) -> Option<EnrichedFlow> {
        match self.enricher.process(flow) {
            Outcome::Forwarded => {
                let record = self.records.try_recv().unwrap();
                assert_eq!(record.topic, "flows");
                Some(serde_json::from_slice(&record.payload).unwrap())
            }
            Outcome::Dropped(_) => {
                assert!(self.records.try_recv().is_err());
                None
            }
        }
    }
}

fn rules(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

// ─── classification ────────────────────────────────────────────────

#[test]
fn no_rule_keeps_metadata() {
    let out = Harness::new(EnricherConfig::default()).run(&flow()).unwrap();
    assert_eq!(out.flow.sampling_rate, 1000);
    assert_eq!(out.exporter.name, "192_0_2_142");
    assert_eq!(out.in_iface.name, "Gi0/0/100");
    assert_eq!(out.out_iface.name, "Gi0/0/200");
    assert_eq!(out.in_iface.description, "Interface 100");
    assert_eq!(out.out_iface.speed, 1000);
}

#[test]
fn exporter_rules_first_write_wins() {
    let mut harness = Harness::new(EnricherConfig {
        exporter_classifiers: rules(&[
            r#"Exporter.Name startsWith "hello" && ClassifyRegion("europe")"#,
            r#"Exporter.Name startsWith "192_" && ClassifyRegion("asia")"#,
            r#"ClassifyRegion("other") && ClassifySite("unknown") && ClassifyTenant("alfred")"#,
        ]),
        ..Default::default()
    });
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.exporter.region, "asia");
    assert_eq!(out.exporter.site, "unknown");
    assert_eq!(out.exporter.tenant, "alfred");
}

#[test]
fn exporter_rule_error_is_skipped() {
    let mut harness = Harness::new(EnricherConfig {
        exporter_classifiers: rules(&[r#"ClassifyTenant("alfred")"#, r#"Exporter.Name > "hello""#]),
        ..Default::default()
    });
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.exporter.tenant, "alfred");
}

#[test]
fn exporter_reject_drops_flow() {
    let mut harness = Harness::new(EnricherConfig {
        exporter_classifiers: rules(&["Reject()"]),
        ..Default::default()
    });
    assert!(harness.run(&flow()).is_none());
    assert_eq!(
        harness.enricher.process(&flow()),
        Outcome::Dropped(DropReason::RejectedByExporter)
    );
}

#[test]
fn interface_reject_drops_flow() {
    let mut harness = Harness::new(EnricherConfig {
        interface_classifiers: rules(&["Reject()"]),
        ..Default::default()
    });
    assert!(harness.run(&flow()).is_none());
    let stats = harness.enricher.stats().exporter(ip(EXPORTER));
    assert_eq!(stats.rejected.get("interface"), Some(&1));
}

#[test]
fn interface_rules_use_index() {
    let mut harness = Harness::new(EnricherConfig {
        interface_classifiers: rules(&[
            r#"Interface.Index == 100 && ClassifyProvider("index1")"#,
            r#"Interface.Index == 200 && ClassifyProvider("index2")"#,
        ]),
        ..Default::default()
    });
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.in_iface.provider, "index1");
    assert_eq!(out.out_iface.provider, "index2");
}

#[test]
fn interface_rename() {
    let mut harness = Harness::new(EnricherConfig {
        interface_classifiers: rules(&[
            r#"Interface.Name == "Gi0/0/100" && SetName("eth100")"#,
            r#"Interface.Name == "Gi0/0/200" && SetDescription("Super Speed")"#,
        ]),
        ..Default::default()
    });
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.in_iface.name, "eth100");
    assert_eq!(out.in_iface.description, "Interface 100");
    assert_eq!(out.out_iface.name, "Gi0/0/200");
    assert_eq!(out.out_iface.description, "Super Speed");
}

#[test]
fn interface_vlan_comes_from_flow_direction() {
    let mut harness = Harness::new(EnricherConfig {
        interface_classifiers: rules(&[
            r#"Interface.VLAN > 200 && SetName(Format("%s.%d", Interface.Name, Interface.VLAN))"#,
        ]),
        ..Default::default()
    });
    let out = harness
        .run(&RawFlow {
            src_vlan: 10,
            dst_vlan: 300,
            ..flow()
        })
        .unwrap();
    assert_eq!(out.in_iface.name, "Gi0/0/100");
    assert_eq!(out.out_iface.name, "Gi0/0/200.300");
    assert_eq!(out.flow.src_vlan, 10);
    assert_eq!(out.flow.dst_vlan, 300);
}

#[test]
fn interface_regex_and_boundary() {
    let cache = warm_metadata();
    cache.insert_interface(
        ip(EXPORTER),
        100,
        InterfaceInfo {
            name: "Gi0/0/100".to_owned(),
            description: "Transit: Telia (GTT-123)".to_owned(),
            speed: 1000,
            ..Default::default()
        },
    );
    let mut harness = Harness::with(
        EnricherConfig {
            interface_classifiers: rules(&[
                r#"Interface.Description startsWith "Transit:" &&
                   ClassifyConnectivity("transit") &&
                   ClassifyExternal() &&
                   ClassifyProviderRegex(Interface.Description, "^Transit: ([^ ]+)", "$1")"#,
                "ClassifyInternal()",
            ]),
            ..Default::default()
        },
        cache,
        None,
    );
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.in_iface.connectivity, "transit");
    assert_eq!(out.in_iface.provider, "telia");
    assert_eq!(out.in_iface.boundary, Boundary::External);
    assert_eq!(out.out_iface.connectivity, "");
    assert_eq!(out.out_iface.boundary, Boundary::Internal);
}

#[test]
fn metadata_boundary_is_fallback() {
    let cache = warm_metadata();
    cache.insert_interface(
        ip(EXPORTER),
        200,
        InterfaceInfo {
            name: "Gi0/0/200".to_owned(),
            boundary: Boundary::External,
            provider: "cogent".to_owned(),
            ..Default::default()
        },
    );
    let mut harness = Harness::with(
        EnricherConfig {
            interface_classifiers: rules(&["Interface.Index == 100 && ClassifyInternal()"]),
            ..Default::default()
        },
        cache,
        None,
    );
    let out = harness.run(&flow()).unwrap();
    assert_eq!(out.in_iface.boundary, Boundary::Internal);
    assert_eq!(out.out_iface.boundary, Boundary::External);
    assert_eq!(out.out_iface.provider, "cogent");
}

// ─── sampling rate ─────────────────────────────────────────────────

fn rates(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
    entries.iter().map(|(p, r)| ((*p).to_owned(), *r)).collect()
}

#[test]
fn override_beats_flow_rate() {
    let mut harness = Harness::new(EnricherConfig {
        override_sampling_rate: rates(&[("192.0.2.0/24", 100), ("192.0.2.128/25", 500)]),
        ..Default::default()
    });
    assert_eq!(harness.run(&flow()).unwrap().flow.sampling_rate, 500);
}

#[test]
fn default_scalar_when_flow_has_none() {
    let mut harness = Harness::new(EnricherConfig {
        default_sampling_rate: SamplingRateSetting::Single(500),
        ..Default::default()
    });
    let out = harness
        .run(&RawFlow {
            sampling_rate: 0,
            ..flow()
        })
        .unwrap();
    assert_eq!(out.flow.sampling_rate, 500);
}

#[test]
fn default_map_longest_prefix() {
    let mut harness = Harness::new(EnricherConfig {
        default_sampling_rate: SamplingRateSetting::PerPrefix(rates(&[
            ("192.0.2.0/24", 100),
            ("192.0.2.128/25", 500),
            ("192.0.2.141/32", 1000),
        ])),
        ..Default::default()
    });
    let out = harness
        .run(&RawFlow {
            sampling_rate: 0,
            ..flow()
        })
        .unwrap();
    assert_eq!(out.flow.sampling_rate, 500);
}

// ─── routing and provider priority ─────────────────────────────────

fn rib() -> Arc<Routing> {
    let rib = StaticRib::new();
    rib.insert(
        net("192.0.2.128/27"),
        Route {
            next_hop: ip("192.0.2.1"),
            asn: 1299,
            as_path: vec![64200, 1299],
            ..Default::default()
        },
    );
    rib.insert(
        net("198.51.100.192/27"),
        Route {
            next_hop: ip("203.0.113.1"),
            asn: 174,
            as_path: vec![64200, 1299, 174],
            communities: vec![100, 200, 400],
            large_communities: vec![LargeCommunity::new(64200, 2, 3)],
        },
    );
    Arc::new(Routing::new(Arc::new(rib)))
}

fn routed_flow() -> RawFlow {
    RawFlow {
        src_addr: ip("192.0.2.142"),
        dst_addr: ip("198.51.100.200"),
        src_as: 64500,
        dst_as: 64501,
        src_net_mask: 24,
        dst_net_mask: 24,
        next_hop: ip("198.51.100.1"),
        ..flow()
    }
}

#[test]
fn routing_first_providers() {
    let mut harness = Harness::with(
        EnricherConfig {
            asn_providers: vec![AsnProvider::Routing, AsnProvider::Flow],
            net_providers: vec![NetProvider::Routing, NetProvider::Flow],
            ..Default::default()
        },
        warm_metadata(),
        Some(rib()),
    );
    let out = harness.run(&routed_flow()).unwrap();
    assert_eq!(out.flow.src_as, 1299);
    assert_eq!(out.flow.dst_as, 174);
    assert_eq!(out.flow.src_net_mask, 27);
    assert_eq!(out.flow.dst_net_mask, 27);
    assert_eq!(out.flow.next_hop, ip("203.0.113.1"));
    assert_eq!(out.dst_as_path, vec![64200, 1299, 174]);
    assert_eq!(out.dst_communities, vec![100, 200, 400]);
    assert_eq!(out.dst_large_communities, vec![LargeCommunity::new(64200, 2, 3)]);
}

#[test]
fn flow_first_providers() {
    let mut harness = Harness::with(
        EnricherConfig::default(),
        warm_metadata(),
        Some(rib()),
    );
    let out = harness.run(&routed_flow()).unwrap();
    assert_eq!(out.flow.src_as, 64500);
    assert_eq!(out.flow.dst_as, 64501);
    assert_eq!(out.flow.src_net_mask, 24);
    assert_eq!(out.flow.next_hop, ip("198.51.100.1"));
    // Routing is still listed, so the path columns are filled.
    assert_eq!(out.dst_as_path, vec![64200, 1299, 174]);
}

#[test]
fn private_asn_falls_through_to_routing() {
    let mut harness = Harness::with(
        EnricherConfig {
            asn_providers: vec![AsnProvider::FlowExceptPrivate, AsnProvider::Routing],
            ..Default::default()
        },
        warm_metadata(),
        Some(rib()),
    );
    let out = harness
        .run(&RawFlow {
            src_as: 65536,
            dst_as: 4_200_000_121,
            ..routed_flow()
        })
        .unwrap();
    assert_eq!(out.flow.src_as, 65536);
    assert_eq!(out.flow.dst_as, 174);
}

#[test]
fn no_routing_columns_without_routing_provider() {
    let routing = rib();
    let mut harness = Harness::with(
        EnricherConfig {
            asn_providers: vec![AsnProvider::Flow],
            net_providers: vec![NetProvider::Flow],
            ..Default::default()
        },
        warm_metadata(),
        Some(Arc::clone(&routing)),
    );
    let out = harness.run(&routed_flow()).unwrap();
    assert!(out.dst_as_path.is_empty());
    assert!(out.dst_communities.is_empty());
    assert_eq!(routing.lookups(), 0);
}

struct BrokenProvider;

impl RouteProvider for BrokenProvider {
    fn lookup(&self, _: IpAddr, _: IpAddr, _: IpAddr) -> Result<LookupResult, RoutingError> {
        Err(RoutingError::Unavailable("session down".to_owned()))
    }

    fn lookup_routes(&self, _: IpAddr) -> Result<Vec<RouteEntry>, RoutingError> {
        Err(RoutingError::Unavailable("session down".to_owned()))
    }
}

#[test]
fn routing_failure_degrades_to_flow_values() {
    let routing = Arc::new(Routing::new(Arc::new(BrokenProvider)));
    let mut harness = Harness::with(
        EnricherConfig {
            asn_providers: vec![AsnProvider::Routing, AsnProvider::Flow],
            net_providers: vec![NetProvider::Routing, NetProvider::Flow],
            ..Default::default()
        },
        warm_metadata(),
        Some(Arc::clone(&routing)),
    );
    let out = harness.run(&routed_flow()).unwrap();
    assert_eq!(out.flow.src_as, 64500);
    assert_eq!(out.flow.dst_net_mask, 24);
    assert_eq!(out.flow.next_hop, ip("198.51.100.1"));
    assert!(out.dst_as_path.is_empty());
    assert_eq!(routing.lookups(), 2);
    assert_eq!(routing.failures(), 2);
}

// ─── end to end ────────────────────────────────────────────────────

#[test]
fn cold_exporter_then_warm() {
    let cache = Arc::new(MetadataCache::new());
    let (sink, mut records) = ChannelSink::new(8);
    let enricher = Enricher::builder()
        .config(EnricherConfig {
            exporter_classifiers: rules(&[r#"ClassifyRegion("europe")"#]),
            interface_classifiers: rules(&[r#"ClassifyExternal()"#]),
            ..Default::default()
        })
        .metadata(Arc::clone(&cache) as _)
        .routing(rib())
        .sink(Arc::new(sink))
        .build()
        .unwrap();

    assert_eq!(
        enricher.process(&routed_flow()),
        Outcome::Dropped(DropReason::MetadataCacheMiss)
    );
    assert!(records.try_recv().is_err());
    assert_eq!(cache.take_misses(), vec![(ip(EXPORTER), 0)]);

    fill_metadata(&cache);
    assert_eq!(enricher.process(&routed_flow()), Outcome::Forwarded);
    let out: EnrichedFlow =
        serde_json::from_slice(&records.try_recv().unwrap().payload).unwrap();
    assert_eq!(out.exporter.name, "192_0_2_142");
    assert_eq!(out.exporter.region, "europe");
    assert_eq!(out.in_iface.boundary, Boundary::External);
    assert_eq!(out.out_iface.name, "Gi0/0/200");
    assert_eq!(out.dst_communities, vec![100, 200, 400]);

    let stats = enricher.stats().exporter(ip(EXPORTER));
    assert_eq!(stats.received, 2);
    assert_eq!(stats.forwarded, 1);
    assert_eq!(stats.errors.get("metadata cache miss"), Some(&1));
}

#[test]
fn full_sink_counts_error() {
    let (sink, _records) = ChannelSink::new(1);
    let enricher = Enricher::builder()
        .metadata(Arc::new(warm_metadata()))
        .sink(Arc::new(sink))
        .build()
        .unwrap();
    assert_eq!(enricher.process(&flow()), Outcome::Forwarded);
    assert!(matches!(
        enricher.process(&flow()),
        Outcome::Dropped(DropReason::Sink(_))
    ));
    let stats = enricher.stats().exporter(ip(EXPORTER));
    assert_eq!(stats.errors.get("sink"), Some(&1));
}

#[tokio::test]
async fn pipeline_processes_concurrently() {
    let (sink, mut records) = ChannelSink::new(256);
    let enricher = Arc::new(
        Enricher::builder()
            .metadata(Arc::new(warm_metadata()))
            .sink(Arc::new(sink))
            .build()
            .unwrap(),
    );
    let mut pipeline = FlowPipeline::builder()
        .enricher(Arc::clone(&enricher))
        .workers(4)
        .queue_capacity(32)
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let tx = pipeline.sender();
    let producer = tokio::spawn(async move {
        for i in 0..100u64 {
            tx.send(RawFlow { bytes: i, ..flow() }).await.unwrap();
        }
    });

    let mut total = 0u64;
    for _ in 0..100 {
        let record = records.recv().await.unwrap();
        let out: EnrichedFlow = serde_json::from_slice(&record.payload).unwrap();
        total += out.flow.bytes;
    }
    producer.await.unwrap();
    pipeline.stop().await.unwrap();

    assert_eq!(total, (0..100).sum::<u64>());
    assert_eq!(enricher.stats().exporter(ip(EXPORTER)).forwarded, 100);
}
