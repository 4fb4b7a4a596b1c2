// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Channel resolver.
//!
//! The catalog has no stable identifiers for the counters we want, so each
//! channel is found by matching metric names and result units against fixed
//! keyword rules. Rules are tried per metric in [`Channel::RULE_ORDER`]; the
//! first rule that matches an unclaimed channel takes the metric, and a
//! claimed channel never moves to a later metric.

use serde::Serialize;

use super::catalog::{MetricParams, MetricSet};
use crate::utils::{contains_any_ignore_case, contains_ignore_case};

const MEMORY_NAME_TERMS: &[&str] = &["memory", "vram", "local"];
const BYTE_UNIT_TERMS: &[&str] = &["byte", "kb", "mb", "gb"];

/// A semantic telemetry quantity extracted from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Temperature,
    Power,
    Utilization,
    VramUsed,
    VramTotal,
}

impl Channel {
    /// Order in which rules are tried for each metric.
    pub const RULE_ORDER: [Channel; 5] = [
        Channel::Temperature,
        Channel::Power,
        Channel::Utilization,
        Channel::VramUsed,
        Channel::VramTotal,
    ];

    /// Whether this channel's metric matches `name` and `units`.
    pub fn matches(self, name: &str, units: &str) -> bool {
        match self {
            Channel::Temperature => {
                contains_any_ignore_case(name, &["temp", "temperature"])
                    && contains_any_ignore_case(units, &["c", "celsius"])
            }
            Channel::Power => contains_ignore_case(name, "power") && contains_ignore_case(units, "w"),
            Channel::Utilization => {
                contains_any_ignore_case(name, &["gpu", "gt", "eu"])
                    && contains_any_ignore_case(name, &["util", "busy", "active"])
                    && contains_any_ignore_case(units, &["%", "percent"])
            }
            Channel::VramUsed => {
                contains_any_ignore_case(name, MEMORY_NAME_TERMS)
                    && contains_any_ignore_case(name, &["used", "util"])
                    && contains_any_ignore_case(units, BYTE_UNIT_TERMS)
            }
            Channel::VramTotal => {
                contains_any_ignore_case(name, MEMORY_NAME_TERMS)
                    && contains_any_ignore_case(name, &["total", "size", "capacity"])
                    && contains_any_ignore_case(units, BYTE_UNIT_TERMS)
            }
        }
    }

    /// Utilization is a ratio and is never rescaled.
    pub fn applies_unit_scale(self) -> bool {
        !matches!(self, Channel::Utilization)
    }

    /// Name used for readings emitted by the aggregator-facing collector.
    pub fn reading_name(self) -> &'static str {
        match self {
            Channel::Temperature => "temp",
            Channel::Power => "power",
            Channel::Utilization => "usage",
            Channel::VramUsed => "vram_used",
            Channel::VramTotal => "vram_total",
        }
    }

    pub fn reading_unit(self) -> &'static str {
        match self {
            Channel::Temperature => "C",
            Channel::Power => "W",
            Channel::Utilization => "pct",
            Channel::VramUsed | Channel::VramTotal => "bytes",
        }
    }
}

/// Metric index per channel. `None` means the channel is unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelIndices {
    pub temperature: Option<u32>,
    pub power: Option<u32>,
    pub utilization: Option<u32>,
    pub vram_used: Option<u32>,
    pub vram_total: Option<u32>,
}

impl ChannelIndices {
    pub fn get(&self, channel: Channel) -> Option<u32> {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Power => self.power,
            Channel::Utilization => self.utilization,
            Channel::VramUsed => self.vram_used,
            Channel::VramTotal => self.vram_total,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<u32> {
        match channel {
            Channel::Temperature => &mut self.temperature,
            Channel::Power => &mut self.power,
            Channel::Utilization => &mut self.utilization,
            Channel::VramUsed => &mut self.vram_used,
            Channel::VramTotal => &mut self.vram_total,
        }
    }

    /// Offer metric `index` to the rules. Returns the channel that took it.
    ///
    /// A metric without a name is never matched; missing units match nothing.
    pub fn claim(&mut self, index: u32, name: Option<&str>, units: Option<&str>) -> Option<Channel> {
        let name = name?;
        let units = units.unwrap_or("");
        for channel in Channel::RULE_ORDER {
            let slot = self.slot_mut(channel);
            if slot.is_none() && channel.matches(name, units) {
                *slot = Some(index);
                return Some(channel);
            }
        }
        None
    }

    /// Number of resolved channels, 0 to 5.
    pub fn score(&self) -> u32 {
        Channel::RULE_ORDER
            .iter()
            .filter(|channel| self.get(**channel).is_some())
            .count() as u32
    }

    pub fn resolved(&self) -> impl Iterator<Item = (Channel, u32)> + '_ {
        Channel::RULE_ORDER
            .into_iter()
            .filter_map(|channel| self.get(channel).map(|index| (channel, index)))
    }
}

/// Channel indices plus the set sizes needed to decode its reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
    pub channels: ChannelIndices,
    pub metrics_count: u32,
    pub information_count: u32,
}

impl Resolution {
    pub fn score(&self) -> u32 {
        self.channels.score()
    }
}

/// Run the rules over an ordered list of metrics.
pub fn resolve_metrics<'a, I>(metrics: I) -> ChannelIndices
where
    I: IntoIterator<Item = Option<&'a MetricParams>>,
{
    let mut channels = ChannelIndices::default();
    for (index, metric) in metrics.into_iter().enumerate() {
        if let Some(metric) = metric {
            channels.claim(
                index as u32,
                metric.display_name(),
                metric.result_units.as_deref(),
            );
        }
    }
    channels
}

/// Resolve channels for one metric set. `None` if the set has no params.
pub fn resolve_channels(set: &dyn MetricSet) -> Option<Resolution> {
    let params = set.params()?;
    let metrics: Vec<Option<MetricParams>> = (0..params.metrics_count)
        .map(|index| set.metric(index))
        .collect();
    Some(Resolution {
        channels: resolve_metrics(metrics.iter().map(Option::as_ref)),
        metrics_count: params.metrics_count,
        information_count: params.information_count,
    })
}
