//! Component assembly and lifecycle management.
//!
//! The [`Orchestrator`] wires the routing table, metadata cache, enricher,
//! worker pool and HTTP API together, starts them, and shuts them down on
//! SIGTERM/SIGINT.
//!
//! # Startup Order
//!
//! 1. Routing component (static RIB)
//! 2. Metadata cache
//! 3. Enricher (classifier compilation, fatal on error)
//! 4. Worker pool
//! 5. HTTP route lookup API
//! 6. Flow sources (stdin, when enabled)
//!
//! # Shutdown Order
//!
//! Flow sources and the HTTP API stop first, then the worker pool drains
//! its queue into the sink, then the record drain exits.

use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ironflow_core::config::IronflowConfig;
use ironflow_core::pipeline::{HealthStatus, Pipeline};
use ironflow_core::types::{FlowRecord, RawFlow};
use ironflow_enricher::classifier::{RuleScope, RuleSet};
use ironflow_enricher::{
    ChannelSink, Enricher, FlowPipeline, MetadataCache, SamplingRates,
};
use ironflow_routing::{Routing, StaticRib};

use crate::health::{ComponentHealth, DaemonHealth, FlowTotals, aggregate_status, routing_status};
use crate::metrics_server;

/// Capacity of the enriched-record channel between workers and producer.
const SINK_CHANNEL_CAPACITY: usize = 4096;
/// Interval between health reports and metadata miss summaries.
const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Compile everything the daemon would build from `config` without
/// starting anything. Used by `--validate`.
pub fn check_config(config: &IronflowConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    RuleSet::compile(RuleScope::Exporter, &config.enricher.exporter_classifiers)?;
    RuleSet::compile(RuleScope::Interface, &config.enricher.interface_classifiers)?;
    SamplingRates::new(
        &config.enricher.override_sampling_rate,
        &config.enricher.default_sampling_rate,
    )?;
    StaticRib::from_config(&config.routing.routes)?;
    MetadataCache::from_config(&config.metadata)?;
    Ok(())
}

pub struct Orchestrator {
    config: IronflowConfig,
    routing: Arc<Routing>,
    metadata: Arc<MetadataCache>,
    pipeline: FlowPipeline,
    records_rx: Option<mpsc::Receiver<FlowRecord>>,
    /// Stops flow sources and the HTTP API
    cancel: CancellationToken,
    /// Stops the record drain once the workers are done
    drain_cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    http_addr: Option<SocketAddr>,
    flows_from_stdin: bool,
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = IronflowConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: IronflowConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let rib = StaticRib::from_config(&config.routing.routes)
            .map_err(|e| anyhow::anyhow!("failed to load static routes: {}", e))?;
        tracing::info!(prefixes = rib.len(), "static routes loaded");
        let routing = Arc::new(Routing::new(Arc::new(rib)));

        let metadata = Arc::new(
            MetadataCache::from_config(&config.metadata)
                .map_err(|e| anyhow::anyhow!("failed to load static metadata: {}", e))?,
        );

        let (sink, records_rx) = ChannelSink::new(SINK_CHANNEL_CAPACITY);
        let enricher = Enricher::builder()
            .config(config.enricher.clone())
            .topic(config.kafka.topic.clone())
            .metadata(Arc::clone(&metadata) as _)
            .routing(Arc::clone(&routing))
            .sink(Arc::new(sink))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build enricher: {}", e))?;

        let pipeline = FlowPipeline::builder()
            .enricher(Arc::new(enricher))
            .workers(config.enricher.workers)
            .queue_capacity(config.enricher.queue_capacity)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build flow pipeline: {}", e))?;

        tracing::info!(
            workers = config.enricher.workers,
            topic = %config.kafka.topic,
            brokers = ?config.kafka.brokers,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            routing,
            metadata,
            pipeline,
            records_rx: Some(records_rx),
            cancel: CancellationToken::new(),
            drain_cancel: CancellationToken::new(),
            tasks: Vec::new(),
            http_addr: None,
            flows_from_stdin: false,
            start_time: Instant::now(),
        })
    }

    /// Read JSON flows from stdin once started.
    pub fn with_stdin_flows(mut self, enabled: bool) -> Self {
        self.flows_from_stdin = enabled;
        self
    }

    /// Sender feeding the worker pool.
    pub fn flow_sender(&self) -> mpsc::Sender<RawFlow> {
        self.pipeline.sender()
    }

    /// Take the enriched-record stream. When nobody takes it, `start`
    /// attaches a logging drain in place of the message-bus producer.
    pub fn take_records(&mut self) -> Option<mpsc::Receiver<FlowRecord>> {
        self.records_rx.take()
    }

    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    pub fn config(&self) -> &IronflowConfig {
        &self.config
    }

    /// Address the HTTP API is bound to, once started.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Start every component. Returns once all of them are running.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(records_rx) = self.records_rx.take() {
            self.tasks
                .push(tokio::spawn(drain_records(records_rx, self.drain_cancel.clone())));
        }

        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start flow pipeline: {}", e))?;

        let listener = tokio::net::TcpListener::bind(&self.config.http.listen)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", self.config.http.listen, e))?;
        let addr = listener.local_addr()?;
        self.http_addr = Some(addr);
        let app = ironflow_routing::http::router(Arc::clone(&self.routing));
        let shutdown = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                tracing::error!(error = %e, "http server failed");
            }
        }));
        tracing::info!(listen = %addr, "http api listening");

        if self.flows_from_stdin {
            spawn_flow_reader(
                BufReader::new(std::io::stdin()),
                self.pipeline.sender(),
                self.cancel.clone(),
            )?;
            tracing::info!("reading flows from stdin");
        }

        Ok(())
    }

    /// Start, wait for SIGTERM/SIGINT while reporting health, then stop.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let signal = {
            let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let shutdown = wait_for_shutdown_signal();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    signal = &mut shutdown => break signal?,
                    _ = ticker.tick() => self.report().await,
                }
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Stop every component, draining queued flows into the sink.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();
        let stop = self.pipeline.stop().await;
        self.drain_cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        stop.map_err(|e| anyhow::anyhow!("failed to stop flow pipeline: {}", e))?;
        tracing::info!("ironflow stopped");
        Ok(())
    }

    pub async fn health(&self) -> DaemonHealth {
        let components = vec![
            ComponentHealth {
                name: "enricher".to_owned(),
                status: self.pipeline.health_check().await,
            },
            ComponentHealth {
                name: "routing".to_owned(),
                status: routing_status(self.routing.lookups(), self.routing.failures()),
            },
        ];
        let snapshot = self.pipeline.enricher().stats().snapshot();
        let flows = snapshot.values().fold(
            FlowTotals {
                exporters: snapshot.len(),
                ..Default::default()
            },
            |mut totals, stats| {
                totals.received += stats.received;
                totals.forwarded += stats.forwarded;
                totals.dropped += stats.errors_total() + stats.rejected_total();
                totals
            },
        );
        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs: self.start_time.elapsed().as_secs(),
            components,
            flows,
        }
    }

    async fn report(&self) {
        let health = self.health().await;
        match &health.status {
            HealthStatus::Healthy => tracing::debug!(
                uptime_secs = health.uptime_secs,
                received = health.flows.received,
                forwarded = health.flows.forwarded,
                dropped = health.flows.dropped,
                "health check"
            ),
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => tracing::warn!(
                reason = %reason,
                received = health.flows.received,
                forwarded = health.flows.forwarded,
                dropped = health.flows.dropped,
                "daemon not healthy"
            ),
        }

        let misses = self.metadata.take_misses();
        if !misses.is_empty() {
            tracing::info!(
                count = misses.len(),
                sample = ?misses.iter().take(5).collect::<Vec<_>>(),
                "metadata missing for some exporters or interfaces"
            );
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Log enriched records in place of the message-bus producer.
async fn drain_records(mut records_rx: mpsc::Receiver<FlowRecord>, cancel: CancellationToken) {
    let mut forwarded = 0u64;
    loop {
        tokio::select! {
            record = records_rx.recv() => match record {
                Some(record) => {
                    forwarded += 1;
                    tracing::debug!(
                        topic = %record.topic,
                        key_len = record.key.len(),
                        payload_len = record.payload.len(),
                        "enriched flow"
                    );
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                // Pick up what the workers flushed while stopping.
                while let Ok(record) = records_rx.try_recv() {
                    forwarded += 1;
                    tracing::debug!(topic = %record.topic, "enriched flow");
                }
                break;
            }
        }
    }
    tracing::debug!(forwarded, "record drain stopped");
}

/// Parse one JSON-lines flow. Blank lines yield `None`.
fn parse_flow_line(line: &str) -> Option<Result<RawFlow, serde_json::Error>> {
    let line = line.trim();
    (!line.is_empty()).then(|| serde_json::from_str(line))
}

/// Read flows on a dedicated OS thread.
///
/// A blocked read cannot be cancelled, so the reader stays off the runtime:
/// on shutdown the thread is left parked on its read and dies with the
/// process instead of holding up runtime teardown.
fn spawn_flow_reader<R>(
    reader: R,
    flow_tx: mpsc::Sender<RawFlow>,
    cancel: CancellationToken,
) -> Result<std::thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("flow-input".to_owned())
        .spawn(move || read_flows(reader, flow_tx, cancel))
        .context("failed to spawn flow input thread")
}

/// Feed JSON-encoded flows from `reader` into the worker pool until the
/// input ends, the pool goes away or `cancel` fires.
fn read_flows<R: BufRead>(reader: R, flow_tx: mpsc::Sender<RawFlow>, cancel: CancellationToken) {
    let mut invalid = 0u64;
    for line in reader.lines() {
        if cancel.is_cancelled() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to read flow input");
                break;
            }
        };
        match parse_flow_line(&line) {
            None => {}
            Some(Ok(flow)) => {
                if flow_tx.blocking_send(flow).is_err() {
                    break;
                }
            }
            Some(Err(e)) => {
                invalid += 1;
                tracing::warn!(error = %e, invalid, "skipping invalid flow line");
            }
        }
    }
    tracing::info!("flow input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flow_lines() {
        assert!(parse_flow_line("   ").is_none());
        let flow = parse_flow_line(r#"{"exporter_address":"192.0.2.1","in_if":10}"#)
            .unwrap()
            .unwrap();
        assert_eq!(flow.in_if, 10);
        assert!(parse_flow_line("{not json").unwrap().is_err());
    }

    #[test]
    fn read_flows_skips_invalid_lines() {
        let input: &[u8] = b"{\"in_if\":1}\n\nnot json\n{\"in_if\":2}\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_flows(BufReader::new(input), tx, CancellationToken::new());

        assert_eq!(rx.try_recv().unwrap().in_if, 1);
        assert_eq!(rx.try_recv().unwrap().in_if, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn read_flows_stops_once_cancelled() {
        let input: &[u8] = b"{\"in_if\":1}\n{\"in_if\":2}\n";
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        read_flows(BufReader::new(input), tx, cancel);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn idle_flow_input_does_not_hold_up_runtime_shutdown() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (reader, mut writer) = UnixStream::pair().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        spawn_flow_reader(BufReader::new(reader), tx, cancel.clone()).unwrap();

        writer.write_all(b"{\"in_if\":3}\n").unwrap();
        let flow = runtime
            .block_on(async { tokio::time::timeout(Duration::from_secs(5), rx.recv()).await })
            .unwrap()
            .unwrap();
        assert_eq!(flow.in_if, 3);

        // The writer stays open, so the reader thread is parked on read.
        cancel.cancel();
        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(writer);
    }

    #[tokio::test]
    async fn drain_records_stops_on_cancel() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drain_records(rx, cancel.clone()));
        tx.send(FlowRecord {
            topic: "flows".to_owned(),
            key: Default::default(),
            payload: Default::default(),
        })
        .await
        .unwrap();
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok(), "drain should stop after cancel");
    }

    #[test]
    fn check_config_rejects_bad_rule() {
        let mut config = IronflowConfig::default();
        config.enricher.interface_classifiers = vec!["ClassifyRegion(\"eu\")".to_owned()];
        let err = check_config(&config).unwrap_err();
        assert!(err.to_string().contains("interface classifier rule #1"));
    }

    #[test]
    fn check_config_accepts_defaults() {
        check_config(&IronflowConfig::default()).unwrap();
    }
}
