//! Sampling-rate resolution.
//!
//! Precedence for an exporter address:
//! 1. the most specific override prefix containing it
//! 2. the rate the flow carries, when non-zero
//! 3. the default: a single value, or the most specific default prefix
//! 4. 0

use std::collections::BTreeMap;
use std::net::IpAddr;

use ironflow_core::config::SamplingRateSetting;
use ironflow_core::net::{PrefixMap, parse_prefix};

use crate::error::EnricherError;

#[derive(Debug, Clone)]
enum DefaultRate {
    Single(u64),
    PerPrefix(PrefixMap<u64>),
}

#[derive(Debug, Clone)]
pub struct SamplingRates {
    overrides: PrefixMap<u64>,
    default: DefaultRate,
}

impl SamplingRates {
    pub fn new(
        overrides: &BTreeMap<String, u64>,
        default: &SamplingRateSetting,
    ) -> Result<Self, EnricherError> {
        let overrides = prefix_map(overrides, "override_sampling_rate")?;
        let default = match default {
            SamplingRateSetting::Single(rate) => DefaultRate::Single(*rate),
            SamplingRateSetting::PerPrefix(map) => {
                DefaultRate::PerPrefix(prefix_map(map, "default_sampling_rate")?)
            }
        };
        Ok(Self { overrides, default })
    }

    pub fn resolve(&self, exporter: IpAddr, flow_rate: u64) -> u64 {
        if let Some(rate) = self.overrides.get(exporter) {
            return *rate;
        }
        if flow_rate != 0 {
            return flow_rate;
        }
        match &self.default {
            DefaultRate::Single(rate) => *rate,
            DefaultRate::PerPrefix(map) => map.get(exporter).copied().unwrap_or(0),
        }
    }
}

fn prefix_map(
    entries: &BTreeMap<String, u64>,
    field: &str,
) -> Result<PrefixMap<u64>, EnricherError> {
    entries
        .iter()
        .map(|(prefix, rate)| {
            parse_prefix(prefix)
                .map(|net| (net, *rate))
                .map_err(|reason| EnricherError::Config {
                    field: field.to_owned(),
                    reason,
                })
        })
        .collect()
}
