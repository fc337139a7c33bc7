//! Configuration: `ironflow.toml` parsing and runtime settings.
//!
//! [`IronflowConfig`] holds the settings of every component.
//!
//! # Precedence
//! 1. CLI arguments
//! 2. Environment variables (`IRONFLOW_ENRICHER_WORKERS=8`)
//! 3. Config file (`ironflow.toml`)
//! 4. Defaults
//!
//! ```no_run
//! # async fn example() -> Result<(), ironflow_core::error::IronflowError> {
//! use ironflow_core::config::IronflowConfig;
//!
//! let config = IronflowConfig::load("ironflow.toml").await?;
//! let config = IronflowConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, IronflowError};
use crate::net::parse_prefix;
use crate::types::{ExporterInfo, InterfaceInfo, LargeCommunity};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IronflowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub enricher: EnricherConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl IronflowConfig {
    /// Load from a TOML file, apply environment overrides, then validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IronflowError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IronflowError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IronflowError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                IronflowError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, IronflowError> {
        toml::from_str(toml_str).map_err(|e| {
            IronflowError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Override settings from `IRONFLOW_{SECTION}_{FIELD}` variables.
    ///
    /// Rule lists and prefix tables are file-only.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IRONFLOW_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IRONFLOW_GENERAL_LOG_FORMAT");

        // Enricher
        override_usize(&mut self.enricher.workers, "IRONFLOW_ENRICHER_WORKERS");
        override_usize(
            &mut self.enricher.queue_capacity,
            "IRONFLOW_ENRICHER_QUEUE_CAPACITY",
        );

        // Kafka
        override_string(&mut self.kafka.topic, "IRONFLOW_KAFKA_TOPIC");
        override_csv(&mut self.kafka.brokers, "IRONFLOW_KAFKA_BROKERS");
        override_string(&mut self.kafka.version, "IRONFLOW_KAFKA_VERSION");

        // HTTP
        override_string(&mut self.http.listen, "IRONFLOW_HTTP_LISTEN");

        // Metrics
        override_bool(&mut self.metrics.enabled, "IRONFLOW_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "IRONFLOW_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "IRONFLOW_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "IRONFLOW_METRICS_ENDPOINT");
    }

    /// Check every field against its allowed set.
    pub fn validate(&self) -> Result<(), IronflowError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.enricher.validate()?;

        if self.kafka.topic.is_empty() {
            return Err(invalid("kafka.topic", "must not be empty".to_owned()));
        }
        if self.kafka.brokers.is_empty() {
            return Err(invalid(
                "kafka.brokers",
                "at least one broker is required".to_owned(),
            ));
        }
        self.kafka
            .version
            .parse::<KafkaVersion>()
            .map_err(|reason| invalid("kafka.version", reason))?;

        self.http
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| invalid("http.listen", e.to_string()))?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0".to_owned()));
        }

        for (i, exporter) in self.metadata.exporters.iter().enumerate() {
            parse_prefix(&exporter.prefix)
                .map_err(|reason| invalid(&format!("metadata.exporters[{i}].prefix"), reason))?;
        }

        for (i, route) in self.routing.routes.iter().enumerate() {
            parse_prefix(&route.prefix)
                .map_err(|reason| invalid(&format!("routing.routes[{i}].prefix"), reason))?;
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> IronflowError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Source consulted when resolving AS numbers, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsnProvider {
    /// AS number reported by the exporter
    Flow,
    /// AS number reported by the exporter, unless private
    FlowExceptPrivate,
    /// AS number from the routing table
    #[serde(alias = "bmp")]
    Routing,
    /// Reserved; never yields a value
    #[serde(alias = "geo-ip")]
    Geoip,
}

/// Source consulted when resolving netmasks and next hops, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetProvider {
    Flow,
    #[serde(alias = "bmp")]
    Routing,
}

/// Default sampling rate: one value for everything or a per-prefix table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SamplingRateSetting {
    Single(u64),
    PerPrefix(BTreeMap<String, u64>),
}

impl Default for SamplingRateSetting {
    fn default() -> Self {
        Self::Single(0)
    }
}

/// Enricher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnricherConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Capacity of the inbound flow queue
    pub queue_capacity: usize,
    /// Rules evaluated against each exporter, in order
    pub exporter_classifiers: Vec<String>,
    /// Rules evaluated against each interface, in order
    pub interface_classifiers: Vec<String>,
    /// Exporter prefix to sampling rate; wins over the flow's own rate
    pub override_sampling_rate: BTreeMap<String, u64>,
    /// Used when neither an override nor the flow provides a rate
    pub default_sampling_rate: SamplingRateSetting,
    pub asn_providers: Vec<AsnProvider>,
    pub net_providers: Vec<NetProvider>,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 10_000,
            exporter_classifiers: Vec::new(),
            interface_classifiers: Vec::new(),
            override_sampling_rate: BTreeMap::new(),
            default_sampling_rate: SamplingRateSetting::default(),
            asn_providers: vec![AsnProvider::Flow, AsnProvider::Routing],
            net_providers: vec![NetProvider::Flow, NetProvider::Routing],
        }
    }
}

impl EnricherConfig {
    fn validate(&self) -> Result<(), IronflowError> {
        if self.workers == 0 || self.workers > 1024 {
            return Err(invalid(
                "enricher.workers",
                "must be between 1 and 1024".to_owned(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(invalid(
                "enricher.queue_capacity",
                "must be greater than 0".to_owned(),
            ));
        }
        for prefix in self.override_sampling_rate.keys() {
            parse_prefix(prefix)
                .map_err(|reason| invalid("enricher.override_sampling_rate", reason))?;
        }
        if let SamplingRateSetting::PerPrefix(map) = &self.default_sampling_rate {
            for prefix in map.keys() {
                parse_prefix(prefix)
                    .map_err(|reason| invalid("enricher.default_sampling_rate", reason))?;
            }
        }
        Ok(())
    }
}

/// Kafka protocol version, e.g. `2.8.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KafkaVersion(Vec<u32>);

impl FromStr for KafkaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("'{s}' is not a dotted numeric version"))?;
        if !(3..=4).contains(&parts.len()) {
            return Err(format!("'{s}' must have 3 or 4 components"));
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for KafkaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Message bus settings. The producer itself lives outside this workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub topic: String,
    pub brokers: Vec<String>,
    pub version: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            topic: "flows".to_owned(),
            brokers: vec!["127.0.0.1:9092".to_owned()],
            version: "2.8.1".to_owned(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    /// Only `/metrics` is served
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// Static metadata seeding the metadata cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub exporters: Vec<StaticExporterConfig>,
}

/// Metadata for every exporter inside `prefix`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticExporterConfig {
    pub prefix: String,
    #[serde(flatten)]
    pub exporter: ExporterInfo,
    /// Used for interfaces not listed in `interfaces`
    pub default_interface: Option<InterfaceInfo>,
    pub interfaces: Vec<StaticInterfaceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticInterfaceConfig {
    pub index: u32,
    #[serde(flatten)]
    pub interface: InterfaceInfo,
}

/// Static routes seeding the in-memory RIB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub routes: Vec<StaticRouteConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticRouteConfig {
    pub prefix: String,
    pub next_hop: Option<IpAddr>,
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
