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

//! In-memory catalog for tests, with resource tracking.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::catalog::*;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct FakeSet {
    pub metrics: Vec<MetricParams>,
    pub information_count: u32,
    pub raw_report_size: u32,
    pub values: Vec<TypedValue>,
    pub params_missing: bool,
}

impl FakeSet {
    pub fn with_metrics(metrics: &[(&str, &str)]) -> Self {
        Self {
            metrics: metrics
                .iter()
                .map(|(name, units)| MetricParams {
                    short_name: Some(name.to_string()),
                    symbol_name: None,
                    result_units: Some(units.to_string()),
                })
                .collect(),
            raw_report_size: 256,
            ..Default::default()
        }
    }

    pub fn values(mut self, values: &[TypedValue]) -> Self {
        self.values = values.to_vec();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeGroup {
    pub measurement_type_mask: u32,
    pub sets: Vec<FakeSet>,
}

impl FakeGroup {
    pub fn snapshot(sets: Vec<FakeSet>) -> Self {
        Self {
            measurement_type_mask: MEASUREMENT_TYPE_SNAPSHOT_IO,
            sets,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeAdapter {
    pub open_fails: bool,
    pub groups: Vec<FakeGroup>,
}

#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub stream_buffer_size: u32,
    pub reports_available: u32,
    pub decoded_reports: u32,
    pub open_stream_fails: bool,
    pub read_fails: bool,
    pub decode_fails: bool,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            stream_buffer_size: 512,
            reports_available: 1,
            decoded_reports: 1,
            open_stream_fails: false,
            read_fails: false,
            decode_fails: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub group_opens: AtomicUsize,
    pub group_closes: AtomicUsize,
    pub device_opens: AtomicUsize,
    pub device_closes: AtomicUsize,
    pub streams_opened: AtomicUsize,
    pub streams_closed: AtomicUsize,
    pub waits: AtomicUsize,
    pub last_read_len: AtomicUsize,
    pub last_decode_len: AtomicUsize,
    pub last_read_flags: AtomicU32,
    pub last_process_id: AtomicU32,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        Self::get(&self.streams_opened) - Self::get(&self.streams_closed)
    }

    pub fn open_devices(&self) -> usize {
        Self::get(&self.device_opens) - Self::get(&self.device_closes)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub adapters: Vec<FakeAdapter>,
    pub library_missing: bool,
    pub factory_fails: bool,
    pub behavior: Mutex<FakeBehavior>,
    pub counters: Counters,
}

impl FakeCatalog {
    pub fn new(adapters: Vec<FakeAdapter>) -> Arc<Self> {
        Arc::new(Self {
            adapters,
            ..Default::default()
        })
    }

    pub fn single(groups: Vec<FakeGroup>) -> Arc<Self> {
        Self::new(vec![FakeAdapter {
            open_fails: false,
            groups,
        }])
    }

    pub fn set_behavior(&self, f: impl FnOnce(&mut FakeBehavior)) {
        let mut behavior = self.behavior.lock().unwrap();
        f(&mut behavior);
    }

    fn behavior(&self) -> FakeBehavior {
        self.behavior.lock().unwrap().clone()
    }

    fn set(&self, adapter: u32, group: u32, set: u32) -> &FakeSet {
        &self.adapters[adapter as usize].groups[group as usize].sets[set as usize]
    }
}

pub struct FakeLoader(pub Arc<FakeCatalog>);

impl LibraryLoader for FakeLoader {
    fn load(&self) -> Result<Box<dyn MetricsLibrary>> {
        if self.0.library_missing {
            return Err(Error::PlatformInit("fake library missing".to_string()));
        }
        Counters::bump(&self.0.counters.loads);
        Ok(Box::new(FakeLibrary(Arc::clone(&self.0))))
    }
}

struct FakeLibrary(Arc<FakeCatalog>);

impl MetricsLibrary for FakeLibrary {
    fn open_adapter_group(&self) -> Result<Box<dyn AdapterGroup>> {
        if self.0.factory_fails {
            return Err(Error::PlatformInit("factory failed".to_string()));
        }
        Counters::bump(&self.0.counters.group_opens);
        Ok(Box::new(FakeAdapterGroup(Arc::clone(&self.0))))
    }
}

impl Drop for FakeLibrary {
    fn drop(&mut self) {
        Counters::bump(&self.0.counters.unloads);
    }
}

struct FakeAdapterGroup(Arc<FakeCatalog>);

impl AdapterGroup for FakeAdapterGroup {
    fn adapter_count(&self) -> u32 {
        self.0.adapters.len() as u32
    }

    fn open_metrics_device(&mut self, adapter: u32) -> Result<Box<dyn MetricsDevice>> {
        let model = self
            .0
            .adapters
            .get(adapter as usize)
            .ok_or(Error::InvalidDevice(adapter as usize))?;
        if model.open_fails {
            return Err(Error::DeviceAccess(format!("adapter {adapter} refused")));
        }
        Counters::bump(&self.0.counters.device_opens);
        Ok(Box::new(FakeDevice {
            catalog: Arc::clone(&self.0),
            adapter,
        }))
    }

    fn close(&mut self) {
        Counters::bump(&self.0.counters.group_closes);
    }
}

struct FakeDevice {
    catalog: Arc<FakeCatalog>,
    adapter: u32,
}

impl MetricsDevice for FakeDevice {
    fn concurrent_group_count(&self) -> u32 {
        self.catalog.adapters[self.adapter as usize].groups.len() as u32
    }

    fn concurrent_group(&self, index: u32) -> Option<Box<dyn ConcurrentGroup>> {
        if index >= self.concurrent_group_count() {
            return None;
        }
        Some(Box::new(FakeConcurrentGroup {
            catalog: Arc::clone(&self.catalog),
            adapter: self.adapter,
            group: index,
        }))
    }

    fn close(self: Box<Self>) {
        Counters::bump(&self.catalog.counters.device_closes);
    }
}

struct FakeConcurrentGroup {
    catalog: Arc<FakeCatalog>,
    adapter: u32,
    group: u32,
}

impl FakeConcurrentGroup {
    fn model(&self) -> &FakeGroup {
        &self.catalog.adapters[self.adapter as usize].groups[self.group as usize]
    }
}

impl ConcurrentGroup for FakeConcurrentGroup {
    fn params(&self) -> Option<ConcurrentGroupParams> {
        let model = self.model();
        Some(ConcurrentGroupParams {
            symbol_name: Some(format!("Group{}", self.group)),
            measurement_type_mask: model.measurement_type_mask,
            metric_set_count: model.sets.len() as u32,
        })
    }

    fn metric_set(&self, index: u32) -> Option<Box<dyn MetricSet>> {
        if index as usize >= self.model().sets.len() {
            return None;
        }
        Some(Box::new(FakeMetricSet {
            catalog: Arc::clone(&self.catalog),
            adapter: self.adapter,
            group: self.group,
            set: index,
        }))
    }

    fn open_io_stream(&self, _set: &dyn MetricSet, process_id: u32) -> Result<StreamParams> {
        let behavior = self.catalog.behavior();
        if behavior.open_stream_fails {
            return Err(Error::Stream("open refused".to_string()));
        }
        let counters = &self.catalog.counters;
        Counters::bump(&counters.streams_opened);
        counters.last_process_id.store(process_id, Ordering::SeqCst);
        Ok(StreamParams {
            timer_period_ns: 1_000_000,
            buffer_size: behavior.stream_buffer_size,
        })
    }

    fn wait_for_reports(&self, _timeout: Duration) -> Result<()> {
        Counters::bump(&self.catalog.counters.waits);
        Ok(())
    }

    fn read_io_stream(&self, buffer: &mut [u8], max_reports: u32, flags: u32) -> Result<u32> {
        let behavior = self.catalog.behavior();
        let counters = &self.catalog.counters;
        counters.last_read_len.store(buffer.len(), Ordering::SeqCst);
        counters.last_read_flags.store(flags, Ordering::SeqCst);
        if behavior.read_fails {
            return Err(Error::Stream("read failed".to_string()));
        }
        Ok(behavior.reports_available.min(max_reports))
    }

    fn close_io_stream(&self) {
        Counters::bump(&self.catalog.counters.streams_closed);
    }
}

struct FakeMetricSet {
    catalog: Arc<FakeCatalog>,
    adapter: u32,
    group: u32,
    set: u32,
}

impl FakeMetricSet {
    fn model(&self) -> &FakeSet {
        self.catalog.set(self.adapter, self.group, self.set)
    }
}

impl MetricSet for FakeMetricSet {
    fn params(&self) -> Option<MetricSetParams> {
        let model = self.model();
        if model.params_missing {
            return None;
        }
        Some(MetricSetParams {
            symbol_name: Some(format!("Set{}", self.set)),
            metrics_count: model.metrics.len() as u32,
            information_count: model.information_count,
            raw_report_size: model.raw_report_size,
        })
    }

    fn metric(&self, index: u32) -> Option<MetricParams> {
        self.model().metrics.get(index as usize).cloned()
    }

    fn calculate_metrics(&self, _raw: &[u8], out: &mut [TypedValue]) -> Result<u32> {
        let behavior = self.catalog.behavior();
        self.catalog
            .counters
            .last_decode_len
            .store(out.len(), Ordering::SeqCst);
        if behavior.decode_fails {
            return Err(Error::Decode("bad report".to_string()));
        }
        for (slot, value) in out.iter_mut().zip(self.model().values.iter()) {
            *slot = *value;
        }
        Ok(behavior.decoded_reports)
    }

    fn handle(&self) -> CatalogHandle {
        CatalogHandle(self.set as usize)
    }
}
