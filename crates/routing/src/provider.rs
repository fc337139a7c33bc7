//! Route provider contract.

use std::net::{IpAddr, Ipv6Addr};

use ironflow_core::types::LargeCommunity;
use serde::Serialize;

use crate::error::RoutingError;

/// Routing attributes for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Origin AS
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
    /// Length of the matching prefix, in the address family of the match
    pub net_mask: u8,
    pub next_hop: IpAddr,
}

impl Default for LookupResult {
    fn default() -> Self {
        Self {
            asn: 0,
            as_path: Vec::new(),
            communities: Vec::new(),
            large_communities: Vec::new(),
            net_mask: 0,
            next_hop: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

/// A route as exposed by the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub prefix: String,
    pub next_hop: IpAddr,
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
}

/// Source of routing information.
///
/// `lookup` runs on the per-flow hot path and must not block. An address
/// without a covering prefix is not an error: it yields an empty result.
pub trait RouteProvider: Send + Sync {
    /// Best route for `ip`. `next_hop` is unspecified when unknown; `agent`
    /// is the exporter asking.
    fn lookup(
        &self,
        ip: IpAddr,
        next_hop: IpAddr,
        agent: IpAddr,
    ) -> Result<LookupResult, RoutingError>;

    /// All routes of the most specific prefix covering `ip`.
    fn lookup_routes(&self, ip: IpAddr) -> Result<Vec<RouteEntry>, RoutingError>;
}
