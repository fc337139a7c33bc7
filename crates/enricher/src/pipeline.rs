//! Worker pool feeding flows through the [`Enricher`].
//!
//! ```text
//! producers -> mpsc (bounded) -> N workers -> Enricher::process -> FlowSink
//! ```
//!
//! [`FlowPipeline`] implements the core [`Pipeline`] trait so the daemon
//! manages it with the same start/stop/health_check lifecycle as the other
//! components.

use std::sync::Arc;

use ironflow_core::error::{IronflowError, PipelineError};
use ironflow_core::metrics as m;
use ironflow_core::pipeline::{HealthStatus, Pipeline};
use ironflow_core::types::RawFlow;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enricher::Enricher;
use crate::error::EnricherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<RawFlow>>>;

pub struct FlowPipeline {
    enricher: Arc<Enricher>,
    workers: usize,
    state: PipelineState,
    flow_tx: mpsc::Sender<RawFlow>,
    flow_rx: SharedReceiver,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl FlowPipeline {
    pub fn builder() -> FlowPipelineBuilder {
        FlowPipelineBuilder::new()
    }

    /// Sender for producers. Flows queued before `start` are processed once
    /// workers run.
    pub fn sender(&self) -> mpsc::Sender<RawFlow> {
        self.flow_tx.clone()
    }

    pub fn enricher(&self) -> &Arc<Enricher> {
        &self.enricher
    }

    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// Fraction of the inbound queue in use, 0.0 to 1.0.
    pub fn queue_utilization(&self) -> f64 {
        let max = self.flow_tx.max_capacity();
        let used = max.saturating_sub(self.flow_tx.capacity());
        used as f64 / max as f64
    }

    async fn worker(
        id: usize,
        enricher: Arc<Enricher>,
        flow_rx: SharedReceiver,
        cancel: CancellationToken,
    ) {
        metrics::gauge!(m::ENRICHER_WORKERS_ACTIVE).increment(1.0);
        debug!(worker = id, "enricher worker started");
        loop {
            let flow = tokio::select! {
                _ = cancel.cancelled() => break,
                flow = async { flow_rx.lock().await.recv().await } => flow,
            };
            match flow {
                Some(flow) => {
                    enricher.process(&flow);
                }
                None => {
                    debug!(worker = id, "inbound queue closed");
                    break;
                }
            }
        }
        metrics::gauge!(m::ENRICHER_WORKERS_ACTIVE).decrement(1.0);
        debug!(worker = id, "enricher worker stopped");
    }
}

impl Pipeline for FlowPipeline {
    async fn start(&mut self) -> Result<(), IronflowError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        info!(workers = self.workers, "starting flow pipeline");

        self.cancel = CancellationToken::new();
        for id in 0..self.workers {
            self.tasks.push(tokio::spawn(Self::worker(
                id,
                Arc::clone(&self.enricher),
                Arc::clone(&self.flow_rx),
                self.cancel.clone(),
            )));
        }

        self.state = PipelineState::Running;
        info!("flow pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), IronflowError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        info!("stopping flow pipeline");

        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "enricher worker ended abnormally");
            }
        }

        // Finish what producers already queued.
        let mut remaining = 0usize;
        {
            let mut rx = self.flow_rx.lock().await;
            while let Ok(flow) = rx.try_recv() {
                self.enricher.process(&flow);
                remaining += 1;
            }
        }
        if remaining > 0 {
            info!(count = remaining, "drained remaining queued flows");
        }

        self.state = PipelineState::Stopped;
        info!("flow pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let utilization = self.queue_utilization();
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "inbound queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl std::fmt::Debug for FlowPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowPipeline")
            .field("workers", &self.workers)
            .field("state", &self.state)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`FlowPipeline`].
pub struct FlowPipelineBuilder {
    enricher: Option<Arc<Enricher>>,
    workers: usize,
    queue_capacity: usize,
}

impl FlowPipelineBuilder {
    pub fn new() -> Self {
        Self {
            enricher: None,
            workers: 4,
            queue_capacity: 10_000,
        }
    }

    pub fn enricher(mut self, enricher: Arc<Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<FlowPipeline, EnricherError> {
        let enricher = self.enricher.ok_or_else(|| EnricherError::Config {
            field: "enricher".to_owned(),
            reason: "not set".to_owned(),
        })?;
        if self.workers == 0 {
            return Err(EnricherError::Config {
                field: "workers".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(EnricherError::Config {
                field: "queue_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let (flow_tx, flow_rx) = mpsc::channel(self.queue_capacity);
        Ok(FlowPipeline {
            enricher,
            workers: self.workers,
            state: PipelineState::Initialized,
            flow_tx,
            flow_rx: Arc::new(Mutex::new(flow_rx)),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl Default for FlowPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
