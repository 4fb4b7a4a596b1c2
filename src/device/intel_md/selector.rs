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

//! Metric set selection.
//!
//! Walks every snapshot-capable concurrent group of a metrics device in
//! catalog order, scores each metric set by how many channels it resolves,
//! and keeps the best. Ties go to the set seen first.
//!
//! With [`SelectionPolicy::FirstToThreshold`] the walk stops as soon as any
//! set reaches the threshold, so a better set later in the catalog is never
//! looked at. This bounds init cost on catalogs with hundreds of sets.

use tracing::{debug, trace};

use super::catalog::{ConcurrentGroup, MetricSet, MetricsDevice};
use super::resolver::{resolve_channels, ChannelIndices, Resolution};
use crate::common::config::ProbeConfig;

/// How the metric set for an adapter is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Stop scanning once the best score reaches `threshold`.
    FirstToThreshold { threshold: u32 },
    /// Score every set and keep the first one with the highest score.
    Exhaustive,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::FirstToThreshold {
            threshold: ProbeConfig::SELECTION_EARLY_EXIT_SCORE,
        }
    }
}

impl SelectionPolicy {
    fn stops_at(self, best_score: u32) -> bool {
        match self {
            SelectionPolicy::FirstToThreshold { threshold } => best_score >= threshold,
            SelectionPolicy::Exhaustive => best_score >= ProbeConfig::MAX_CHANNEL_SCORE,
        }
    }
}

/// The metric set chosen for one adapter, with its resolved channels.
///
/// Built once at init and never changed by sampling.
pub struct Selection {
    pub group: Box<dyn ConcurrentGroup>,
    pub set: Box<dyn MetricSet>,
    pub group_index: u32,
    pub set_index: u32,
    pub resolution: Resolution,
}

impl Selection {
    pub fn channels(&self) -> &ChannelIndices {
        &self.resolution.channels
    }

    pub fn score(&self) -> u32 {
        self.resolution.score()
    }

    /// Number of typed values one decoded report produces.
    pub fn value_count(&self) -> usize {
        self.resolution.metrics_count as usize + self.resolution.information_count as usize
    }
}

struct Candidate {
    group_index: u32,
    set_index: u32,
    set: Box<dyn MetricSet>,
    resolution: Resolution,
}

/// Pick the metric set for `device`. `None` if no set resolves any channel.
pub fn select_metric_set(device: &dyn MetricsDevice, policy: SelectionPolicy) -> Option<Selection> {
    let mut best: Option<Candidate> = None;
    let mut best_score = 0;

    'groups: for group_index in 0..device.concurrent_group_count() {
        let Some(group) = device.concurrent_group(group_index) else {
            continue;
        };
        let Some(params) = group.params() else {
            continue;
        };
        if !params.supports_snapshot_io() {
            trace!(
                "MD: skipping group {:?} (mask {:#x})",
                params.symbol_name,
                params.measurement_type_mask
            );
            continue;
        }

        for set_index in 0..params.metric_set_count {
            let Some(set) = group.metric_set(set_index) else {
                continue;
            };
            let Some(resolution) = resolve_channels(set.as_ref()) else {
                continue;
            };

            let score = resolution.score();
            trace!("MD: group {group_index} set {set_index} scored {score}");
            if score > best_score {
                best_score = score;
                best = Some(Candidate {
                    group_index,
                    set_index,
                    set,
                    resolution,
                });
                if policy.stops_at(best_score) {
                    break 'groups;
                }
            }
        }
    }

    let best = best?;
    let group = device.concurrent_group(best.group_index)?;
    debug!(
        "MD: selected group {} set {} with {} channel(s)",
        best.group_index, best.set_index, best_score
    );
    Some(Selection {
        group,
        set: best.set,
        group_index: best.group_index,
        set_index: best.set_index,
        resolution: best.resolution,
    })
}
