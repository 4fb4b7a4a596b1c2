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

//! Counter catalog abstraction.
//!
//! The vendor library exposes its catalog as a tree:
//!
//! ```text
//! AdapterGroup
//! └── Adapter ── MetricsDevice
//!                └── ConcurrentGroup   (measurement capability mask)
//!                    └── MetricSet     (sampled together in one report)
//!                        └── Metric    (name + result units)
//! ```
//!
//! Each level is a trait so selection and sampling run the same way against
//! the dynamically loaded library and against an in-memory catalog. All calls
//! are synchronous; handles stay valid until their metrics device is closed.

use std::time::Duration;

use crate::error::Result;

/// Concurrent group can serve point-in-time stream reads.
pub const MEASUREMENT_TYPE_SNAPSHOT_IO: u32 = 0x0000_0001;
pub const MEASUREMENT_TYPE_SNAPSHOT_QUERY: u32 = 0x0000_0002;
pub const MEASUREMENT_TYPE_DELTA_QUERY: u32 = 0x0000_0004;

/// Discard queued reports and return only the newest one.
pub const IO_READ_FLAG_DROP_OLD_REPORTS: u32 = 0x0000_0001;

/// Loads the vendor library. Resolved once per `init`.
pub trait LibraryLoader: Send {
    fn load(&self) -> Result<Box<dyn MetricsLibrary>>;
}

/// A loaded vendor library. Dropping it unloads the library.
pub trait MetricsLibrary: Send {
    /// Call the library's factory entry point.
    fn open_adapter_group(&self) -> Result<Box<dyn AdapterGroup>>;
}

pub trait AdapterGroup: Send {
    fn adapter_count(&self) -> u32;
    fn open_metrics_device(&mut self, adapter: u32) -> Result<Box<dyn MetricsDevice>>;
    fn close(&mut self);
}

pub trait MetricsDevice: Send {
    fn concurrent_group_count(&self) -> u32;
    fn concurrent_group(&self, index: u32) -> Option<Box<dyn ConcurrentGroup>>;
    /// Release the device through the adapter that opened it.
    fn close(self: Box<Self>);
}

pub trait ConcurrentGroup: Send {
    fn params(&self) -> Option<ConcurrentGroupParams>;
    fn metric_set(&self, index: u32) -> Option<Box<dyn MetricSet>>;

    /// Open a stream on `set` filtered to `process_id`.
    fn open_io_stream(&self, set: &dyn MetricSet, process_id: u32) -> Result<StreamParams>;
    fn wait_for_reports(&self, timeout: Duration) -> Result<()>;
    /// Read up to `max_reports` reports into `buffer`, returning how many
    /// were actually read.
    fn read_io_stream(&self, buffer: &mut [u8], max_reports: u32, flags: u32) -> Result<u32>;
    fn close_io_stream(&self);
}

pub trait MetricSet: Send {
    fn params(&self) -> Option<MetricSetParams>;
    fn metric(&self, index: u32) -> Option<MetricParams>;

    /// Decode `raw` into `out`, returning the number of reports produced.
    fn calculate_metrics(&self, raw: &[u8], out: &mut [TypedValue]) -> Result<u32>;

    /// Identity of the set inside its concurrent group.
    fn handle(&self) -> CatalogHandle;
}

/// Opaque identity of a catalog object, meaningful only to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogHandle(pub usize);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrentGroupParams {
    pub symbol_name: Option<String>,
    pub measurement_type_mask: u32,
    pub metric_set_count: u32,
}

impl ConcurrentGroupParams {
    pub fn supports_snapshot_io(&self) -> bool {
        self.measurement_type_mask & MEASUREMENT_TYPE_SNAPSHOT_IO != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSetParams {
    pub symbol_name: Option<String>,
    pub metrics_count: u32,
    pub information_count: u32,
    pub raw_report_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricParams {
    pub short_name: Option<String>,
    pub symbol_name: Option<String>,
    pub result_units: Option<String>,
}

impl MetricParams {
    /// Short name if the catalog has one, otherwise the symbol name.
    pub fn display_name(&self) -> Option<&str> {
        self.short_name
            .as_deref()
            .or(self.symbol_name.as_deref())
    }
}

/// Negotiated stream parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamParams {
    pub timer_period_ns: u32,
    pub buffer_size: u32,
}

/// One decoded metric or information value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum TypedValue {
    U32(u32),
    U64(u64),
    Float(f32),
    Bool(bool),
    /// Strings, byte arrays, or a slot the decoder never wrote.
    #[default]
    Other,
}

impl TypedValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            TypedValue::U32(v) => v as f64,
            TypedValue::U64(v) => v as f64,
            TypedValue::Float(v) => v as f64,
            TypedValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            TypedValue::Other => 0.0,
        }
    }
}
