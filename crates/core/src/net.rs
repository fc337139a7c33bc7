//! Prefix parsing and longest-prefix matching.
//!
//! IPv4-mapped IPv6 addresses and prefixes are folded to IPv4 so that
//! `::ffff:192.0.2.1` matches `192.0.2.0/24`. An IPv4 address is also
//! covered by IPv6 prefixes containing its mapped form, so `::/0` matches
//! everything. Specificity is compared in the IPv6 space (IPv4 /24 ranks
//! as /120).

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// Parse `addr/len` or a bare address (host prefix) into a canonical net.
pub fn parse_prefix(s: &str) -> Result<IpNet, String> {
    let s = s.trim();
    let net = if s.contains('/') {
        s.parse::<IpNet>()
            .map_err(|e| format!("invalid prefix '{s}': {e}"))?
    } else {
        let addr = s
            .parse::<IpAddr>()
            .map_err(|e| format!("invalid prefix '{s}': {e}"))?;
        host_net(addr)
    };
    Ok(canonical_net(net.trunc()))
}

/// Host prefix (`/32` or `/128`) for a single address.
pub fn host_net(addr: IpAddr) -> IpNet {
    IpNet::from(addr.to_canonical())
}

/// Fold an IPv4-mapped IPv6 prefix (`::ffff:a.b.c.d/96+n`) to `a.b.c.d/n`.
pub fn canonical_net(net: IpNet) -> IpNet {
    if let IpNet::V6(v6) = net
        && v6.prefix_len() >= 96
        && let Some(v4) = v6.network().to_ipv4_mapped()
        && let Ok(folded) = Ipv4Net::new(v4, v6.prefix_len() - 96)
    {
        return IpNet::V4(folded);
    }
    net
}

/// Prefix-keyed table answering longest-prefix-match queries.
///
/// Entries are bucketed by effective length; a lookup probes one hash
/// bucket per distinct length, most specific first.
#[derive(Debug, Clone)]
pub struct PrefixMap<T> {
    by_len: BTreeMap<u8, HashMap<IpNet, T>>,
    len: usize,
}

fn effective_len(net: &IpNet) -> u8 {
    match net {
        IpNet::V4(v4) => v4.prefix_len() + 96,
        IpNet::V6(v6) => v6.prefix_len(),
    }
}

/// The key `addr` would be stored under in the bucket of effective length `len`.
fn probe_key(addr: IpAddr, len: u8) -> Option<IpNet> {
    match addr {
        IpAddr::V4(v4) if len >= 96 => Ipv4Net::new(v4, len - 96).ok().map(|n| IpNet::V4(n.trunc())),
        IpAddr::V4(v4) => Ipv6Net::new(v4.to_ipv6_mapped(), len)
            .ok()
            .map(|n| IpNet::V6(n.trunc())),
        IpAddr::V6(v6) => Ipv6Net::new(v6, len).ok().map(|n| IpNet::V6(n.trunc())),
    }
}

impl<T> Default for PrefixMap<T> {
    fn default() -> Self {
        Self {
            by_len: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<T> PrefixMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value stored for `net`.
    pub fn insert(&mut self, net: IpNet, value: T) {
        let net = canonical_net(net.trunc());
        let bucket = self.by_len.entry(effective_len(&net)).or_default();
        if bucket.insert(net, value).is_none() {
            self.len += 1;
        }
    }

    /// Most specific entry containing `addr`.
    pub fn longest_match(&self, addr: IpAddr) -> Option<(&IpNet, &T)> {
        let addr = addr.to_canonical();
        self.by_len.iter().rev().find_map(|(&len, bucket)| {
            let key = probe_key(addr, len)?;
            bucket.get_key_value(&key)
        })
    }

    pub fn get(&self, addr: IpAddr) -> Option<&T> {
        self.longest_match(addr).map(|(_, value)| value)
    }

    pub fn get_mut_exact(&mut self, net: &IpNet) -> Option<&mut T> {
        let net = canonical_net(net.trunc());
        self.by_len.get_mut(&effective_len(&net))?.get_mut(&net)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries from most to least specific.
    pub fn iter(&self) -> impl Iterator<Item = (&IpNet, &T)> {
        self.by_len.values().rev().flat_map(|bucket| bucket.iter())
    }
}

impl<T> FromIterator<(IpNet, T)> for PrefixMap<T> {
    fn from_iter<I: IntoIterator<Item = (IpNet, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (net, value) in iter {
            map.insert(net, value);
        }
        map
    }
}
