//! Routing lookups for flow enrichment.
//!
//! - [`provider::RouteProvider`]: contract every routing source implements
//! - [`rib::StaticRib`]: in-memory longest-prefix-match table
//! - [`component::Routing`]: provider wrapper with metrics and error sampling
//! - [`http::router`]: route lookup HTTP endpoint

pub mod component;
pub mod error;
pub mod http;
pub mod provider;
pub mod rib;

pub use component::Routing;
pub use error::RoutingError;
pub use provider::{LookupResult, RouteEntry, RouteProvider};
pub use rib::{Route, StaticRib};
