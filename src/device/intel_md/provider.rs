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

//! Intel GPU counter provider.
//!
//! Owns the loaded library, the adapter group, and one [`AdapterContext`] per
//! adapter. Metric set selection happens once in [`IntelGpuProvider::init`];
//! every later sample reuses it.
//!
//! The provider is a plain value: several may exist side by side, and all
//! lifecycle calls take `&mut self`, so callers serialize access themselves.

use chrono::Utc;
use tracing::{debug, warn};

use super::catalog::{AdapterGroup, LibraryLoader, MetricsDevice, MetricsLibrary};
use super::resolver::{Channel, ChannelIndices};
use super::sampler::sample_selection;
use super::selector::{select_metric_set, Selection, SelectionPolicy};
use crate::common::config::GpuProviderConfig;
use crate::device::{GpuSample, Reading, TelemetryProvider};
use crate::error::{Error, Result};

const SOURCE: &str = "intel-md";

/// Per-adapter state cached at init.
pub struct AdapterContext {
    device: Option<Box<dyn MetricsDevice>>,
    selection: Option<Selection>,
}

impl AdapterContext {
    fn open(group: &mut dyn AdapterGroup, index: u32, policy: SelectionPolicy) -> Self {
        let device = match group.open_metrics_device(index) {
            Ok(device) => device,
            Err(e) => {
                warn!("MD: adapter {index}: metrics device unavailable: {e}");
                return Self {
                    device: None,
                    selection: None,
                };
            }
        };

        let selection = select_metric_set(device.as_ref(), policy);
        if selection.is_none() {
            warn!("MD: adapter {index}: no metric set resolves any channel");
        }
        Self {
            device: Some(device),
            selection,
        }
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Resolved channels; all unresolved when nothing was selected.
    pub fn channels(&self) -> ChannelIndices {
        self.selection
            .as_ref()
            .map(|selection| *selection.channels())
            .unwrap_or_default()
    }

    fn close(mut self) {
        // Catalog handles die with the device.
        self.selection = None;
        if let Some(device) = self.device.take() {
            device.close();
        }
    }
}

struct ProviderState {
    adapters: Vec<AdapterContext>,
    group: Box<dyn AdapterGroup>,
    library: Box<dyn MetricsLibrary>,
}

impl ProviderState {
    fn close(self) {
        let ProviderState {
            adapters,
            mut group,
            library,
        } = self;
        for adapter in adapters {
            adapter.close();
        }
        group.close();
        drop(group);
        drop(library);
    }
}

/// GPU counter provider backed by the Metrics Discovery library.
pub struct IntelGpuProvider {
    config: GpuProviderConfig,
    loader: Box<dyn LibraryLoader>,
    state: Option<ProviderState>,
    init_failed: bool,
}

impl Default for IntelGpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IntelGpuProvider {
    pub fn new() -> Self {
        Self::with_config(GpuProviderConfig::default())
    }

    pub fn with_config(config: GpuProviderConfig) -> Self {
        let loader = super::system_loader(&config.library_paths);
        Self::with_loader(config, loader)
    }

    /// Build a provider around a custom library loader.
    pub fn with_loader(config: GpuProviderConfig, loader: Box<dyn LibraryLoader>) -> Self {
        Self {
            config,
            loader,
            state: None,
            init_failed: false,
        }
    }

    /// Load the library, enumerate adapters, and select a metric set for each.
    ///
    /// Returns immediately if already initialized. An adapter whose device
    /// can't be opened is kept with no selection rather than failing init.
    pub fn init(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }

        let library = self.loader.load()?;
        let mut group = library.open_adapter_group()?;

        let count = group.adapter_count();
        if count == 0 {
            group.close();
            return Err(Error::NoDevicesFound);
        }
        debug!("MD: {count} adapter(s) found");

        let policy = self.config.selection_policy;
        let adapters = (0..count)
            .map(|index| AdapterContext::open(group.as_mut(), index, policy))
            .collect();

        self.state = Some(ProviderState {
            adapters,
            group,
            library,
        });
        self.init_failed = false;
        Ok(())
    }

    /// Close every device, the adapter group, and unload the library.
    ///
    /// Safe to call when never initialized.
    pub fn shutdown(&mut self) {
        if let Some(state) = self.state.take() {
            state.close();
            debug!("MD: shut down");
        }
        self.init_failed = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn device_count(&self) -> Result<usize> {
        self.state
            .as_ref()
            .map(|state| state.adapters.len())
            .ok_or(Error::NotInitialized)
    }

    pub fn adapter(&self, index: usize) -> Result<&AdapterContext> {
        let state = self.state.as_ref().ok_or(Error::NotInitialized)?;
        state
            .adapters
            .get(index)
            .ok_or(Error::InvalidDevice(index))
    }

    /// Sample device `index`, writing only the channels it resolved.
    ///
    /// Slots in `out` for unresolved channels are left as they were, and
    /// nothing is written on error.
    pub fn sample(&self, index: usize, out: &mut GpuSample) -> Result<()> {
        let selection = self
            .adapter(index)?
            .selection()
            .ok_or(Error::NoSelection(index))?;
        sample_selection(selection, self.config.report_wait_timeout, out)
    }

    /// Sample device `index` into a fresh [`GpuSample`].
    pub fn read(&self, index: usize) -> Result<GpuSample> {
        let mut sample = GpuSample::default();
        self.sample(index, &mut sample)?;
        Ok(sample)
    }
}

impl TelemetryProvider for IntelGpuProvider {
    fn name(&self) -> &'static str {
        "gpu-intel"
    }

    /// Initialize on first use, then sample every adapter.
    ///
    /// A failed init is remembered; later calls return nothing until
    /// `shutdown` resets the provider.
    fn collect(&mut self) -> Vec<Reading> {
        if self.state.is_none() {
            if self.init_failed {
                return Vec::new();
            }
            if let Err(e) = self.init() {
                warn!("intel gpu metrics disabled: {e}");
                self.init_failed = true;
                return Vec::new();
            }
        }

        let count = self.device_count().unwrap_or(0);
        let now = Utc::now();
        let mut readings = Vec::with_capacity(count * Channel::RULE_ORDER.len());
        for index in 0..count {
            let sample = match self.read(index) {
                Ok(sample) => sample,
                Err(e) if e.is_transient() => {
                    debug!("MD: gpu{index}: {e}");
                    continue;
                }
                Err(e) => {
                    warn!("MD: gpu{index}: {e}");
                    continue;
                }
            };
            let device = format!("gpu{index}");
            for channel in Channel::RULE_ORDER {
                if let Some(value) = sample.get(channel) {
                    readings.push(Reading::new(
                        device.as_str(),
                        channel.reading_name(),
                        value,
                        channel.reading_unit(),
                        SOURCE,
                        now,
                    ));
                }
            }
        }
        readings
    }
}

impl Drop for IntelGpuProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
