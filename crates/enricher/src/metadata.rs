//! In-memory exporter and interface metadata.
//!
//! Lookups never block: anything not cached is a cache miss, and the
//! missing `(exporter, ifindex)` pair is remembered so a poller can fetch it
//! and fill the cache with [`MetadataCache::insert_interface`].

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use ipnet::IpNet;
use ironflow_core::config::MetadataConfig;
use ironflow_core::error::MetadataError;
use ironflow_core::net::{PrefixMap, parse_prefix};
use ironflow_core::pipeline::{MetadataAnswer, MetadataLookup};
use ironflow_core::types::{ExporterInfo, InterfaceInfo};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::EnricherError;

#[derive(Debug, Clone, Default)]
struct ExporterEntry {
    info: ExporterInfo,
    interfaces: HashMap<u32, InterfaceInfo>,
    default_interface: Option<InterfaceInfo>,
}

impl ExporterEntry {
    fn interface(&self, index: u32) -> Option<&InterfaceInfo> {
        self.interfaces
            .get(&index)
            .or(self.default_interface.as_ref())
    }
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    exporters: RwLock<PrefixMap<ExporterEntry>>,
    misses: Mutex<HashSet<(IpAddr, u32)>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from `[[metadata.exporters]]`.
    pub fn from_config(config: &MetadataConfig) -> Result<Self, EnricherError> {
        let cache = Self::new();
        for exporter in &config.exporters {
            let prefix = parse_prefix(&exporter.prefix).map_err(|reason| EnricherError::Config {
                field: "metadata.exporters.prefix".to_owned(),
                reason,
            })?;
            let entry = ExporterEntry {
                info: exporter.exporter.clone(),
                interfaces: exporter
                    .interfaces
                    .iter()
                    .map(|i| (i.index, i.interface.clone()))
                    .collect(),
                default_interface: exporter.default_interface.clone(),
            };
            cache.exporters.write().insert(prefix, entry);
        }
        debug!(exporters = config.exporters.len(), "metadata cache seeded");
        Ok(cache)
    }

    /// Insert or replace exporter attributes for a prefix. Cached interfaces
    /// of an existing entry are kept.
    pub fn insert_exporter(&self, net: IpNet, info: ExporterInfo) {
        let mut exporters = self.exporters.write();
        match exporters.get_mut_exact(&net) {
            Some(entry) => entry.info = info,
            None => exporters.insert(
                net,
                ExporterEntry {
                    info,
                    ..Default::default()
                },
            ),
        }
    }

    /// Cache one interface. Returns `false` when the exporter is unknown.
    pub fn insert_interface(&self, exporter: IpAddr, index: u32, info: InterfaceInfo) -> bool {
        let mut exporters = self.exporters.write();
        let Some(net) = exporters.longest_match(exporter).map(|(net, _)| *net) else {
            return false;
        };
        if let Some(entry) = exporters.get_mut_exact(&net) {
            entry.interfaces.insert(index, info);
        }
        drop(exporters);
        self.misses.lock().remove(&(exporter.to_canonical(), index));
        true
    }

    /// Drain the `(exporter, ifindex)` pairs that missed since the last call.
    /// Index 0 stands for the exporter itself.
    pub fn take_misses(&self) -> Vec<(IpAddr, u32)> {
        self.misses.lock().drain().collect()
    }

    fn record_miss(&self, exporter: IpAddr, index: u32) {
        self.misses.lock().insert((exporter.to_canonical(), index));
    }
}

impl MetadataLookup for MetadataCache {
    fn lookup(
        &self,
        exporter: IpAddr,
        in_if: u32,
        out_if: u32,
    ) -> Result<MetadataAnswer, MetadataError> {
        let exporters = self.exporters.read();
        let Some(entry) = exporters.get(exporter) else {
            drop(exporters);
            self.record_miss(exporter, 0);
            return Err(MetadataError::CacheMiss { exporter });
        };

        let mut missing = Vec::new();
        let mut interface = |index: u32| {
            if index == 0 {
                return None;
            }
            let found = entry.interface(index).cloned();
            if found.is_none() {
                missing.push(index);
            }
            found
        };
        let in_info = interface(in_if);
        let out_info = interface(out_if);
        let info = entry.info.clone();
        drop(exporters);

        if !missing.is_empty() {
            for index in missing {
                self.record_miss(exporter, index);
            }
            return Err(MetadataError::CacheMiss { exporter });
        }
        Ok(MetadataAnswer {
            exporter: info,
            in_if: in_info,
            out_if: out_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_core::net::host_net;
    use ironflow_core::config::{StaticExporterConfig, StaticInterfaceConfig};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn iface(name: &str) -> InterfaceInfo {
        InterfaceInfo {
            name: name.to_owned(),
            speed: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn unknown_exporter_is_a_miss() {
        let cache = MetadataCache::new();
        let err = cache.lookup(ip("192.0.2.142"), 10, 20).unwrap_err();
        assert_eq!(
            err,
            MetadataError::CacheMiss {
                exporter: ip("192.0.2.142")
            }
        );
        assert_eq!(cache.take_misses(), vec![(ip("192.0.2.142"), 0)]);
        assert!(cache.take_misses().is_empty());
    }

    #[test]
    fn missing_interface_is_a_miss_until_filled() {
        let cache = MetadataCache::new();
        cache.insert_exporter(
            host_net(ip("192.0.2.142")),
            ExporterInfo {
                name: "edge1".to_owned(),
                ..Default::default()
            },
        );
        assert!(cache.lookup(ip("192.0.2.142"), 10, 0).is_err());
        assert_eq!(cache.take_misses(), vec![(ip("192.0.2.142"), 10)]);

        assert!(cache.insert_interface(ip("192.0.2.142"), 10, iface("Gi0/0/10")));
        let answer = cache.lookup(ip("192.0.2.142"), 10, 0).unwrap();
        assert_eq!(answer.exporter.name, "edge1");
        assert_eq!(answer.in_if.unwrap().name, "Gi0/0/10");
        assert!(answer.out_if.is_none());
    }

    #[test]
    fn zero_index_is_not_looked_up() {
        let cache = MetadataCache::new();
        cache.insert_exporter(host_net(ip("192.0.2.142")), ExporterInfo::default());
        let answer = cache.lookup(ip("192.0.2.142"), 0, 0).unwrap();
        assert!(answer.in_if.is_none());
        assert!(answer.out_if.is_none());
    }

    #[test]
    fn insert_interface_for_unknown_exporter_fails() {
        let cache = MetadataCache::new();
        assert!(!cache.insert_interface(ip("192.0.2.1"), 1, iface("x")));
    }

    #[test]
    fn static_config_with_default_interface() {
        let config = MetadataConfig {
            exporters: vec![StaticExporterConfig {
                prefix: "192.0.2.0/24".to_owned(),
                exporter: ExporterInfo {
                    name: "edge".to_owned(),
                    region: "europe".to_owned(),
                    ..Default::default()
                },
                default_interface: Some(iface("unknown")),
                interfaces: vec![StaticInterfaceConfig {
                    index: 10,
                    interface: iface("Gi0/0/10"),
                }],
            }],
        };
        let cache = MetadataCache::from_config(&config).unwrap();
        let answer = cache.lookup(ip("::ffff:192.0.2.7"), 10, 99).unwrap();
        assert_eq!(answer.exporter.region, "europe");
        assert_eq!(answer.in_if.unwrap().name, "Gi0/0/10");
        assert_eq!(answer.out_if.unwrap().name, "unknown");
    }
}
