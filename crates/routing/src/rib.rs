//! In-memory routing table with longest-prefix match.
//!
//! Each prefix can hold several routes (one per next hop). A lookup picks
//! the most specific prefix, then prefers the route whose next hop matches
//! the one the exporter reported.

use std::net::{IpAddr, Ipv6Addr};

use ipnet::IpNet;
use ironflow_core::config::StaticRouteConfig;
use ironflow_core::net::{PrefixMap, parse_prefix};
use ironflow_core::types::LargeCommunity;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::RoutingError;
use crate::provider::{LookupResult, RouteEntry, RouteProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub next_hop: IpAddr,
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            next_hop: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            asn: 0,
            as_path: Vec::new(),
            communities: Vec::new(),
            large_communities: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticRib {
    table: RwLock<PrefixMap<Vec<Route>>>,
}

impl StaticRib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a RIB from `[[routing.routes]]` entries.
    pub fn from_config(routes: &[StaticRouteConfig]) -> Result<Self, RoutingError> {
        let rib = Self::new();
        for cfg in routes {
            let prefix =
                parse_prefix(&cfg.prefix).map_err(|reason| RoutingError::InvalidRoute {
                    prefix: cfg.prefix.clone(),
                    reason,
                })?;
            rib.insert(
                prefix,
                Route {
                    next_hop: cfg
                        .next_hop
                        .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
                    asn: cfg.asn,
                    as_path: cfg.as_path.clone(),
                    communities: cfg.communities.clone(),
                    large_communities: cfg.large_communities.clone(),
                },
            );
        }
        debug!(prefixes = rib.len(), "static RIB loaded");
        Ok(rib)
    }

    /// Add a route, replacing any route of the same prefix and next hop.
    pub fn insert(&self, prefix: IpNet, route: Route) {
        let mut table = self.table.write();
        if let Some(routes) = table.get_mut_exact(&prefix) {
            routes.retain(|r| r.next_hop != route.next_hop);
            routes.push(route);
            return;
        }
        table.insert(prefix, vec![route]);
    }

    /// Number of distinct prefixes.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl RouteProvider for StaticRib {
    fn lookup(
        &self,
        ip: IpAddr,
        next_hop: IpAddr,
        _agent: IpAddr,
    ) -> Result<LookupResult, RoutingError> {
        let table = self.table.read();
        let Some((prefix, routes)) = table.longest_match(ip) else {
            return Ok(LookupResult::default());
        };
        let next_hop = next_hop.to_canonical();
        let Some(route) = routes
            .iter()
            .find(|r| r.next_hop.to_canonical() == next_hop)
            .or_else(|| routes.first())
        else {
            return Ok(LookupResult::default());
        };
        Ok(LookupResult {
            asn: route.asn,
            as_path: route.as_path.clone(),
            communities: route.communities.clone(),
            large_communities: route.large_communities.clone(),
            net_mask: prefix.prefix_len(),
            next_hop: route.next_hop,
        })
    }

    fn lookup_routes(&self, ip: IpAddr) -> Result<Vec<RouteEntry>, RoutingError> {
        let table = self.table.read();
        let (prefix, routes) = table
            .longest_match(ip)
            .ok_or(RoutingError::NoRoute(ip))?;
        Ok(routes
            .iter()
            .map(|r| RouteEntry {
                prefix: prefix.to_string(),
                next_hop: r.next_hop,
                asn: r.asn,
                as_path: r.as_path.clone(),
                communities: r.communities.clone(),
                large_communities: r.large_communities.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn sample_rib() -> StaticRib {
        let rib = StaticRib::new();
        rib.insert(
            parse_prefix("192.0.2.0/27").unwrap(),
            Route {
                next_hop: ip("198.51.100.1"),
                asn: 174,
                as_path: vec![64200, 1299, 174],
                communities: vec![100, 200, 400],
                large_communities: vec![LargeCommunity::new(64200, 2, 3)],
            },
        );
        rib.insert(
            parse_prefix("192.0.2.0/27").unwrap(),
            Route {
                next_hop: ip("198.51.100.2"),
                asn: 174,
                as_path: vec![64201, 174],
                ..Default::default()
            },
        );
        rib.insert(
            parse_prefix("192.0.2.0/24").unwrap(),
            Route {
                asn: 64500,
                ..Default::default()
            },
        );
        rib
    }

    #[test]
    fn lookup_uses_most_specific_prefix() {
        let rib = sample_rib();
        let result = rib
            .lookup(ip("192.0.2.10"), ip("::"), ip("192.0.2.142"))
            .unwrap();
        assert_eq!(result.asn, 174);
        assert_eq!(result.net_mask, 27);
        assert_eq!(result.as_path, vec![64200, 1299, 174]);

        let wider = rib
            .lookup(ip("192.0.2.100"), ip("::"), ip("192.0.2.142"))
            .unwrap();
        assert_eq!(wider.asn, 64500);
        assert_eq!(wider.net_mask, 24);
    }

    #[test]
    fn lookup_prefers_matching_next_hop() {
        let rib = sample_rib();
        let result = rib
            .lookup(ip("192.0.2.10"), ip("198.51.100.2"), ip("192.0.2.142"))
            .unwrap();
        assert_eq!(result.as_path, vec![64201, 174]);
        assert_eq!(result.next_hop, ip("198.51.100.2"));
    }

    #[test]
    fn lookup_accepts_mapped_addresses() {
        let rib = sample_rib();
        let result = rib
            .lookup(ip("::ffff:192.0.2.10"), ip("::"), ip("::ffff:192.0.2.142"))
            .unwrap();
        assert_eq!(result.asn, 174);
        assert_eq!(result.net_mask, 27);
    }

    #[test]
    fn lookup_without_route_is_empty() {
        let rib = sample_rib();
        let result = rib
            .lookup(ip("203.0.113.1"), ip("::"), ip("192.0.2.142"))
            .unwrap();
        assert_eq!(result, LookupResult::default());
    }

    #[test]
    fn lookup_routes_lists_every_next_hop() {
        let rib = sample_rib();
        let routes = rib.lookup_routes(ip("192.0.2.10")).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.prefix == "192.0.2.0/27"));
    }

    #[test]
    fn lookup_routes_without_route_is_error() {
        let rib = sample_rib();
        let err = rib.lookup_routes(ip("203.0.113.1")).unwrap_err();
        assert_eq!(err, RoutingError::NoRoute(ip("203.0.113.1")));
    }

    #[test]
    fn insert_replaces_same_next_hop() {
        let rib = StaticRib::new();
        let prefix = parse_prefix("10.0.0.0/8").unwrap();
        rib.insert(prefix, Route { asn: 1, ..Default::default() });
        rib.insert(prefix, Route { asn: 2, ..Default::default() });
        let routes = rib.lookup_routes(ip("10.1.2.3")).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].asn, 2);
    }

    #[test]
    fn from_config_rejects_bad_prefix() {
        let routes = vec![StaticRouteConfig {
            prefix: "10.0.0.0/40".to_owned(),
            ..Default::default()
        }];
        let err = StaticRib::from_config(&routes).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidRoute { .. }));
    }
}
