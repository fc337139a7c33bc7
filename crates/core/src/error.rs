//! Error types shared by every ironflow crate.

use std::net::IpAddr;

/// Top-level ironflow error.
#[derive(Debug, thiserror::Error)]
pub enum IronflowError {
    /// Configuration could not be loaded or is invalid
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline lifecycle failure
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Classifier rules failed to compile
    #[error("classifier error: {0}")]
    Classifier(String),

    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML or does not match the schema
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds a value outside its allowed set
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Pipeline lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// `start` called on a running pipeline
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// `stop` called on a pipeline that is not running
    #[error("pipeline is not running")]
    NotRunning,
}

/// Metadata lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Exporter or one of the requested interfaces is not cached yet
    #[error("metadata cache miss for exporter {exporter}")]
    CacheMiss { exporter: IpAddr },
}

/// Forwarding sink errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Outbound queue is full
    #[error("sink queue is full")]
    Full,

    /// Outbound queue is closed
    #[error("sink is closed")]
    Closed,

    /// Flow could not be encoded
    #[error("failed to encode flow: {0}")]
    Encode(String),
}
