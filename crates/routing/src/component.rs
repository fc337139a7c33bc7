//! Routing component: wraps a provider with accounting.
//!
//! Lookups never fail from the caller's point of view. A provider error is
//! counted, logged through a burst sampler and turned into an empty result,
//! so a routing outage degrades enrichment instead of stopping it.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ironflow_core::metrics as m;
use ironflow_core::sampler::LogSampler;
use tracing::{info, warn};

use crate::error::RoutingError;
use crate::provider::{LookupResult, RouteEntry, RouteProvider};

pub struct Routing {
    provider: Arc<dyn RouteProvider>,
    error_log: LogSampler,
    lookups: AtomicU64,
    failures: AtomicU64,
}

impl Routing {
    pub fn new(provider: Arc<dyn RouteProvider>) -> Self {
        info!("starting routing component");
        Self {
            provider,
            error_log: LogSampler::default(),
            lookups: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Look up `ip`, degrading to an empty result on provider failure.
    pub fn lookup(&self, ip: IpAddr, next_hop: IpAddr, agent: IpAddr) -> LookupResult {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::ROUTING_LOOKUPS_TOTAL).increment(1);
        match self.provider.lookup(ip, next_hop, agent) {
            Ok(result) => result,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::ROUTING_LOOKUPS_FAILED_TOTAL).increment(1);
                if self.error_log.allow() {
                    warn!(error = %e, ip = %ip, agent = %agent, "routing: error while looking up address");
                }
                LookupResult::default()
            }
        }
    }

    /// All routes covering `ip`, for the HTTP API.
    pub fn lookup_routes(&self, ip: IpAddr) -> Result<Vec<RouteEntry>, RoutingError> {
        self.provider.lookup_routes(ip)
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Routing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routing")
            .field("lookups", &self.lookups())
            .field("failures", &self.failures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::{Route, StaticRib};
    use ironflow_core::net::parse_prefix;

    struct Unavailable;

    impl RouteProvider for Unavailable {
        fn lookup(&self, _: IpAddr, _: IpAddr, _: IpAddr) -> Result<LookupResult, RoutingError> {
            Err(RoutingError::Unavailable("session down".to_owned()))
        }

        fn lookup_routes(&self, _: IpAddr) -> Result<Vec<RouteEntry>, RoutingError> {
            Err(RoutingError::Unavailable("session down".to_owned()))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn failure_degrades_to_empty_result() {
        let routing = Routing::new(Arc::new(Unavailable));
        for _ in 0..5 {
            let result = routing.lookup(ip("192.0.2.1"), ip("::"), ip("192.0.2.142"));
            assert_eq!(result, LookupResult::default());
        }
        assert_eq!(routing.lookups(), 5);
        assert_eq!(routing.failures(), 5);
    }

    #[test]
    fn success_is_counted_but_not_failed() {
        let rib = StaticRib::new();
        rib.insert(
            parse_prefix("192.0.2.0/24").unwrap(),
            Route {
                asn: 64500,
                ..Default::default()
            },
        );
        let routing = Routing::new(Arc::new(rib));
        let result = routing.lookup(ip("192.0.2.1"), ip("::"), ip("192.0.2.142"));
        assert_eq!(result.asn, 64500);
        assert_eq!(routing.lookups(), 1);
        assert_eq!(routing.failures(), 0);
    }
}
