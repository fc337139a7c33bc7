//! Routing error types.

use std::net::IpAddr;

use ironflow_core::error::{ConfigError, IronflowError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// No prefix covers the address
    #[error("no route found for {0}")]
    NoRoute(IpAddr),

    /// Provider could not answer (session down, backend timeout)
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Static route configuration is invalid
    #[error("invalid route '{prefix}': {reason}")]
    InvalidRoute { prefix: String, reason: String },
}

impl From<RoutingError> for IronflowError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::InvalidRoute { prefix, reason } => {
                IronflowError::Config(ConfigError::InvalidValue {
                    field: format!("routing.routes[{prefix}]"),
                    reason,
                })
            }
            other => IronflowError::Config(ConfigError::InvalidValue {
                field: "routing".to_owned(),
                reason: other.to_string(),
            }),
        }
    }
}
