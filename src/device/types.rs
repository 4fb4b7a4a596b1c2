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

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::device::intel_md::Channel;

/// One GPU sample. Each field is an output slot for one channel.
///
/// A sample only writes the channels its adapter resolved; any other slot
/// keeps whatever the caller put there. `None` means "no data", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GpuSample {
    pub temperature_c: Option<f64>,
    pub power_w: Option<f64>,
    pub vram_used_bytes: Option<f64>,
    pub vram_total_bytes: Option<f64>,
    pub utilization_pct: Option<f64>,
}

impl GpuSample {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Temperature => self.temperature_c,
            Channel::Power => self.power_w,
            Channel::VramUsed => self.vram_used_bytes,
            Channel::VramTotal => self.vram_total_bytes,
            Channel::Utilization => self.utilization_pct,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        let slot = match channel {
            Channel::Temperature => &mut self.temperature_c,
            Channel::Power => &mut self.power_w,
            Channel::VramUsed => &mut self.vram_used_bytes,
            Channel::VramTotal => &mut self.vram_total_bytes,
            Channel::Utilization => &mut self.utilization_pct,
        };
        *slot = Some(value);
    }
}

/// A single named measurement handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Device label, e.g. `gpu0` or `cpu`
    pub device: String,
    /// Measurement name, e.g. `temp`, `vram_used`
    pub name: String,
    pub value: f64,
    /// Unit label, e.g. `C`, `W`, `bytes`, `pct`
    pub unit: String,
    /// Which provider produced the value
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        device: impl Into<String>,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            value,
            unit: unit.into(),
            source: source.into(),
            timestamp,
        }
    }
}
