//! Flow enrichment for ironflow.
//!
//! # Modules
//! - [`classifier`]: rule language for exporter and interface classification
//! - [`providers`]: ordered provider lists for AS numbers, masks and next hop
//! - [`sampling`]: sampling-rate override and default tables
//! - [`metadata`]: in-memory exporter/interface metadata cache
//! - [`enricher`]: per-flow enrichment and forwarding
//! - [`pipeline`]: worker pool implementing the core `Pipeline` lifecycle
//! - [`sink`]: channel-backed forwarding sink
//! - [`stats`]: per-exporter counters

pub mod classifier;
pub mod enricher;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod providers;
pub mod sampling;
pub mod sink;
pub mod stats;

pub use classifier::{ClassifierError, ClassifierResult, RuleScope, RuleSet};
pub use enricher::{DropReason, Enricher, EnricherBuilder, Outcome};
pub use error::EnricherError;
pub use metadata::MetadataCache;
pub use pipeline::{FlowPipeline, FlowPipelineBuilder};
pub use sampling::SamplingRates;
pub use sink::{ChannelSink, encode_flow};
pub use stats::{ExporterStats, FlowStats};
