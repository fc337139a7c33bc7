//! Priority merge of flow-reported and routing-derived attributes.
//!
//! Each provider list is walked in order; the first provider whose value is
//! acceptable wins, otherwise the attribute is zero. Providers are closed
//! enums dispatched through a table of plain functions.

use std::net::{IpAddr, Ipv6Addr};

use ironflow_core::config::{AsnProvider, NetProvider};

/// AS number candidates for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsnCandidates {
    pub flow: u32,
    pub routing: u32,
}

/// Netmask or next-hop candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCandidates<T> {
    pub flow: T,
    pub routing: T,
}

/// Private ASN ranges (RFC 6996).
pub fn is_private_asn(asn: u32) -> bool {
    (64_512..=65_534).contains(&asn) || (4_200_000_000..=4_294_967_294).contains(&asn)
}

type AsnFn = fn(&AsnCandidates) -> Option<u32>;

fn asn_provider_fn(provider: AsnProvider) -> AsnFn {
    match provider {
        AsnProvider::Flow => |c: &AsnCandidates| (c.flow != 0).then_some(c.flow),
        AsnProvider::FlowExceptPrivate => {
            |c: &AsnCandidates| (c.flow != 0 && !is_private_asn(c.flow)).then_some(c.flow)
        }
        AsnProvider::Routing => |c: &AsnCandidates| (c.routing != 0).then_some(c.routing),
        AsnProvider::Geoip => |_: &AsnCandidates| None,
    }
}

fn net_pick<T: Copy>(provider: NetProvider, candidates: &NetCandidates<T>) -> T {
    match provider {
        NetProvider::Flow => candidates.flow,
        NetProvider::Routing => candidates.routing,
    }
}

fn first_acceptable<P: Copy, T>(providers: &[P], provide: impl Fn(P) -> Option<T>) -> Option<T> {
    providers.iter().find_map(|p| provide(*p))
}

pub fn resolve_asn(providers: &[AsnProvider], candidates: AsnCandidates) -> u32 {
    first_acceptable(providers, |p| asn_provider_fn(p)(&candidates)).unwrap_or(0)
}

/// A netmask is acceptable when non-zero.
pub fn resolve_net_mask(providers: &[NetProvider], candidates: NetCandidates<u8>) -> u8 {
    first_acceptable(providers, |p| {
        let mask = net_pick(p, &candidates);
        (mask != 0).then_some(mask)
    })
    .unwrap_or(0)
}

/// A next hop is acceptable when not the unspecified address.
pub fn resolve_next_hop(providers: &[NetProvider], candidates: NetCandidates<IpAddr>) -> IpAddr {
    first_acceptable(providers, |p| {
        let next_hop = net_pick(p, &candidates);
        (!next_hop.is_unspecified()).then_some(next_hop)
    })
    .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED))
}

/// Whether any list consults routing, i.e. whether lookups are needed.
pub fn uses_routing(asn: &[AsnProvider], net: &[NetProvider]) -> bool {
    asn.contains(&AsnProvider::Routing) || net.contains(&NetProvider::Routing)
}
