//! Flow domain types.
//!
//! A [`RawFlow`] is what a decoder hands to the enricher. The enricher never
//! mutates it; it derives an [`EnrichedFlow`] carrying a resolved copy of the
//! flow plus exporter, interface and routing attributes.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which side of the network an interface faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    #[default]
    Undefined,
    External,
    Internal,
}

impl Boundary {
    /// Numeric code used on the wire (0 undefined, 1 external, 2 internal).
    pub fn code(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::External => 1,
            Self::Internal => 2,
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::External => write!(f, "external"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// BGP large community (RFC 8092).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LargeCommunity {
    pub asn: u32,
    pub local_data1: u32,
    pub local_data2: u32,
}

impl LargeCommunity {
    pub fn new(asn: u32, local_data1: u32, local_data2: u32) -> Self {
        Self {
            asn,
            local_data1,
            local_data2,
        }
    }
}

/// A decoded flow record as received from an exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFlow {
    /// Reception time, seconds since the Unix epoch
    pub time_received: u64,
    /// Sampling rate announced by the exporter, 0 when unknown
    pub sampling_rate: u64,
    pub exporter_address: IpAddr,
    /// Ingress interface index, 0 when absent
    pub in_if: u32,
    /// Egress interface index, 0 when absent
    pub out_if: u32,
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: u8,
    pub bytes: u64,
    pub packets: u64,
    pub src_vlan: u16,
    pub dst_vlan: u16,
    pub src_as: u32,
    pub dst_as: u32,
    pub src_net_mask: u8,
    pub dst_net_mask: u8,
    /// Unspecified address when the exporter did not report one
    pub next_hop: IpAddr,
}

impl Default for RawFlow {
    fn default() -> Self {
        let unspecified = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
        Self {
            time_received: 0,
            sampling_rate: 0,
            exporter_address: unspecified,
            in_if: 0,
            out_if: 0,
            src_addr: unspecified,
            dst_addr: unspecified,
            src_port: 0,
            dst_port: 0,
            proto: 0,
            bytes: 0,
            packets: 0,
            src_vlan: 0,
            dst_vlan: 0,
            src_as: 0,
            dst_as: 0,
            src_net_mask: 0,
            dst_net_mask: 0,
            next_hop: unspecified,
        }
    }
}

/// Exporter attributes, from metadata and exporter classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterInfo {
    pub name: String,
    pub region: String,
    pub role: String,
    pub tenant: String,
    pub site: String,
    pub group: String,
}

/// Interface attributes, from metadata and interface classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: String,
    /// Speed in Mbps
    pub speed: u64,
    pub provider: String,
    pub connectivity: String,
    pub boundary: Boundary,
}

/// Flow enriched with exporter, interface and routing attributes.
///
/// `flow` holds the resolved sampling rate, AS numbers, masks and next hop.
/// Ingress VLAN is `flow.src_vlan`, egress VLAN is `flow.dst_vlan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedFlow {
    #[serde(flatten)]
    pub flow: RawFlow,
    pub exporter: ExporterInfo,
    pub in_iface: InterfaceInfo,
    pub out_iface: InterfaceInfo,
    pub dst_as_path: Vec<u32>,
    pub dst_communities: Vec<u32>,
    pub dst_large_communities: Vec<LargeCommunity>,
}

/// A serialized flow ready for the message bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub topic: String,
    /// Exporter address octets, used as partitioning key
    pub key: Bytes,
    pub payload: Bytes,
}
