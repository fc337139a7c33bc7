//! Shared building blocks for ironflow: flow types, collaborator traits,
//! errors, configuration, metric names and log sampling.

pub mod config;
pub mod error;
pub mod metrics;
pub mod net;
pub mod pipeline;
pub mod sampler;
pub mod types;

// errors
pub use error::{ConfigError, IronflowError, MetadataError, PipelineError, SinkError};

// configuration
pub use config::{AsnProvider, IronflowConfig, NetProvider, SamplingRateSetting};

// pipeline traits
pub use pipeline::{FlowSink, HealthStatus, MetadataAnswer, MetadataLookup, Pipeline};

// domain types
pub use types::{
    Boundary, EnrichedFlow, ExporterInfo, FlowRecord, InterfaceInfo, LargeCommunity, RawFlow,
};
