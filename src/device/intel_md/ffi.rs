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

//! Minimal Metrics Discovery FFI.
//!
//! The library exports a single C function, `OpenAdapterGroup`. Everything
//! else is reached through C++ interface pointers, so methods are called by
//! indexing each object's virtual table.
//!
//! Note: This is a best-effort binding. Slot numbers follow the 1.x interface
//! revisions (`IAdapterGroup_1_6`, `IAdapter_1_6`, `IMetricsDevice_1_0`,
//! `IConcurrentGroup_1_0`, `IMetricSet_1_1`, `IMetric_1_0`). Later revisions
//! only append slots, so older drivers keep working, but a driver that
//! reorders them would break this table.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use libloading::{Library, Symbol};
use tracing::debug;

use super::catalog::*;
use crate::error::{Error, Result};

/// `TCompletionCode::CC_OK`
const CC_OK: u32 = 0;

const VALUE_TYPE_UINT32: u32 = 0;
const VALUE_TYPE_UINT64: u32 = 1;
const VALUE_TYPE_FLOAT: u32 = 2;
const VALUE_TYPE_BOOL: u32 = 3;
const VALUE_TYPE_LAST: u32 = 6;

/// MSVC emits one vtable entry for a virtual destructor, the Itanium ABI two.
#[cfg(target_env = "msvc")]
const DESTRUCTOR_SLOTS: usize = 1;
#[cfg(not(target_env = "msvc"))]
const DESTRUCTOR_SLOTS: usize = 2;

/// Virtual method slots, counted after the destructor.
mod slot {
    pub const ADAPTER_GROUP_GET_PARAMS: usize = 0;
    pub const ADAPTER_GROUP_GET_ADAPTER: usize = 1;
    pub const ADAPTER_GROUP_CLOSE: usize = 2;

    pub const ADAPTER_OPEN_METRICS_DEVICE: usize = 2;
    pub const ADAPTER_CLOSE_METRICS_DEVICE: usize = 4;

    pub const DEVICE_GET_PARAMS: usize = 0;
    pub const DEVICE_GET_CONCURRENT_GROUP: usize = 1;

    pub const GROUP_GET_PARAMS: usize = 0;
    pub const GROUP_GET_METRIC_SET: usize = 1;
    pub const GROUP_OPEN_IO_STREAM: usize = 2;
    pub const GROUP_READ_IO_STREAM: usize = 3;
    pub const GROUP_CLOSE_IO_STREAM: usize = 4;
    pub const GROUP_WAIT_FOR_REPORTS: usize = 5;

    pub const SET_GET_PARAMS: usize = 0;
    pub const SET_GET_METRIC: usize = 1;
    pub const SET_CALCULATE_METRICS: usize = 8;

    pub const METRIC_GET_PARAMS: usize = 0;
}

type OpenAdapterGroupFn = unsafe extern "C" fn(*mut *mut c_void) -> u32;
type GetParamsFn = unsafe extern "C" fn(*mut c_void) -> *const c_void;
type GetChildFn = unsafe extern "C" fn(*mut c_void, u32) -> *mut c_void;
type StatusFn = unsafe extern "C" fn(*mut c_void) -> u32;
type OpenMetricsDeviceFn = unsafe extern "C" fn(*mut c_void, *mut *mut c_void) -> u32;
type CloseMetricsDeviceFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> u32;
type OpenIoStreamFn = unsafe extern "C" fn(*mut c_void, *mut c_void, u32, *mut u32, *mut u32) -> u32;
type ReadIoStreamFn = unsafe extern "C" fn(*mut c_void, *mut u32, *mut c_char, u32) -> u32;
type WaitForReportsFn = unsafe extern "C" fn(*mut c_void, u32) -> u32;
type CalculateMetricsFn =
    unsafe extern "C" fn(*mut c_void, *const u8, u32, *mut RawTypedValue, u32, *mut u32, bool) -> u32;

// --- Parameter structs (leading fields only; the rest is never read) ---

#[repr(C)]
struct ApiVersion {
    major: u32,
    minor: u32,
    build: u32,
}

#[repr(C)]
struct RawAdapterGroupParams {
    version: ApiVersion,
    adapter_count: u32,
}

#[repr(C)]
struct RawMetricsDeviceParams {
    version: ApiVersion,
    concurrent_groups_count: u32,
}

#[repr(C)]
struct RawConcurrentGroupParams {
    symbol_name: *const c_char,
    description: *const c_char,
    measurement_type_mask: u32,
    metric_sets_count: u32,
}

#[repr(C)]
struct RawMetricSetParams {
    symbol_name: *const c_char,
    short_name: *const c_char,
    api_mask: u32,
    category_mask: u32,
    raw_report_size: u32,
    query_report_size: u32,
    metrics_count: u32,
    information_count: u32,
}

#[repr(C)]
struct RawMetricParams {
    id_in_set: u32,
    group_id: u32,
    symbol_name: *const c_char,
    short_name: *const c_char,
    group_name: *const c_char,
    long_name: *const c_char,
    dx_to_ogl_alias: *const c_char,
    usage_flags_mask: u32,
    api_mask: u32,
    result_type: u32,
    metric_result_units: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
union RawValue {
    uint32: u32,
    uint64: u64,
    float: f32,
    boolean: bool,
    pointer: *const c_void,
}

/// `TTypedValue_1_0`
#[repr(C)]
#[derive(Clone, Copy)]
struct RawTypedValue {
    value_type: u32,
    value: RawValue,
}

const _: () = assert!(
    std::mem::size_of::<RawTypedValue>() == 16,
    "RawTypedValue size mismatch - expected 16 bytes"
);

impl RawTypedValue {
    const EMPTY: Self = Self {
        value_type: VALUE_TYPE_LAST,
        value: RawValue { uint64: 0 },
    };

    fn to_typed(self) -> TypedValue {
        // SAFETY: the tag says which union field the library wrote.
        unsafe {
            match self.value_type {
                VALUE_TYPE_UINT32 => TypedValue::U32(self.value.uint32),
                VALUE_TYPE_UINT64 => TypedValue::U64(self.value.uint64),
                VALUE_TYPE_FLOAT => TypedValue::Float(self.value.float),
                VALUE_TYPE_BOOL => TypedValue::Bool(self.value.boolean),
                _ => TypedValue::Other,
            }
        }
    }
}

/// Fetch virtual method `slot` of the interface behind `this`.
///
/// # Safety
/// `this` must be a live interface pointer whose vtable has the slot, and `F`
/// must be the method's exact signature.
unsafe fn method<F: Copy>(this: *mut c_void, slot: usize) -> F {
    let vtable = *(this as *const *const *const c_void);
    let entry = *vtable.add(DESTRUCTOR_SLOTS + slot);
    std::mem::transmute_copy(&entry)
}

unsafe fn params<T>(this: *mut c_void, slot: usize) -> Option<&'static T> {
    let get: GetParamsFn = method(this, slot);
    (get(this) as *const T).as_ref()
}

unsafe fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

// --- Library bootstrap ---

pub struct MdLibraryLoader {
    paths: Vec<String>,
}

impl MdLibraryLoader {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }
}

impl LibraryLoader for MdLibraryLoader {
    fn load(&self) -> Result<Box<dyn MetricsLibrary>> {
        for path in &self.paths {
            debug!("MD: Trying to load library at: {}", path);
            // SAFETY: loading runs the library's initializers; we only load
            // the vendor's Metrics Discovery library by its fixed name.
            let library = match unsafe { Library::new(path) } {
                Ok(library) => library,
                Err(e) => {
                    debug!("MD: Failed to load library: {} - Error: {}", path, e);
                    continue;
                }
            };

            // SAFETY: signature matches the exported C function.
            let symbol: std::result::Result<Symbol<OpenAdapterGroupFn>, _> =
                unsafe { library.get(b"OpenAdapterGroup\0") };
            let open_adapter_group = match symbol {
                Ok(symbol) => *symbol,
                Err(e) => {
                    debug!("MD: {} has no OpenAdapterGroup - Error: {}", path, e);
                    continue;
                }
            };

            debug!("MD: Successfully loaded library: {}", path);
            return Ok(Box::new(MdLibrary {
                library: Arc::new(library),
                open_adapter_group,
            }));
        }

        Err(Error::PlatformInit(format!(
            "Metrics Discovery library not found (tried {})",
            self.paths.join(", ")
        )))
    }
}

struct MdLibrary {
    library: Arc<Library>,
    open_adapter_group: OpenAdapterGroupFn,
}

impl MetricsLibrary for MdLibrary {
    fn open_adapter_group(&self) -> Result<Box<dyn AdapterGroup>> {
        let mut group: *mut c_void = ptr::null_mut();
        // SAFETY: the entry point writes an interface pointer on success.
        let code = unsafe { (self.open_adapter_group)(&mut group) };
        if code != CC_OK || group.is_null() {
            return Err(Error::PlatformInit(format!(
                "OpenAdapterGroup failed with completion code {code}"
            )));
        }

        // SAFETY: `group` is a live IAdapterGroup.
        let adapter_count = unsafe {
            params::<RawAdapterGroupParams>(group, slot::ADAPTER_GROUP_GET_PARAMS)
                .map(|p| p.adapter_count)
                .unwrap_or(0)
        };

        Ok(Box::new(MdAdapterGroup {
            this: group,
            adapter_count,
            library: Arc::clone(&self.library),
        }))
    }
}

// --- Catalog objects ---
//
// Every wrapper holds the library alive. The raw pointers are only touched
// from the thread that owns the provider.

struct MdAdapterGroup {
    this: *mut c_void,
    adapter_count: u32,
    library: Arc<Library>,
}

unsafe impl Send for MdAdapterGroup {}

impl AdapterGroup for MdAdapterGroup {
    fn adapter_count(&self) -> u32 {
        self.adapter_count
    }

    fn open_metrics_device(&mut self, adapter: u32) -> Result<Box<dyn MetricsDevice>> {
        unsafe {
            let get_adapter: GetChildFn = method(self.this, slot::ADAPTER_GROUP_GET_ADAPTER);
            let adapter_ptr = get_adapter(self.this, adapter);
            if adapter_ptr.is_null() {
                return Err(Error::DeviceAccess(format!("adapter {adapter} not present")));
            }

            let open: OpenMetricsDeviceFn = method(adapter_ptr, slot::ADAPTER_OPEN_METRICS_DEVICE);
            let mut device: *mut c_void = ptr::null_mut();
            let code = open(adapter_ptr, &mut device);
            if code != CC_OK || device.is_null() {
                return Err(Error::DeviceAccess(format!(
                    "OpenMetricsDevice failed on adapter {adapter} with completion code {code}"
                )));
            }

            let group_count = params::<RawMetricsDeviceParams>(device, slot::DEVICE_GET_PARAMS)
                .map(|p| p.concurrent_groups_count)
                .unwrap_or(0);

            Ok(Box::new(MdMetricsDevice {
                adapter: adapter_ptr,
                this: device,
                group_count,
                library: Arc::clone(&self.library),
            }))
        }
    }

    fn close(&mut self) {
        if self.this.is_null() {
            return;
        }
        unsafe {
            let close: StatusFn = method(self.this, slot::ADAPTER_GROUP_CLOSE);
            close(self.this);
        }
        self.this = ptr::null_mut();
    }
}

struct MdMetricsDevice {
    adapter: *mut c_void,
    this: *mut c_void,
    group_count: u32,
    library: Arc<Library>,
}

unsafe impl Send for MdMetricsDevice {}

impl MetricsDevice for MdMetricsDevice {
    fn concurrent_group_count(&self) -> u32 {
        self.group_count
    }

    fn concurrent_group(&self, index: u32) -> Option<Box<dyn ConcurrentGroup>> {
        let group = unsafe {
            let get: GetChildFn = method(self.this, slot::DEVICE_GET_CONCURRENT_GROUP);
            get(self.this, index)
        };
        if group.is_null() {
            return None;
        }
        Some(Box::new(MdConcurrentGroup {
            this: group,
            library: Arc::clone(&self.library),
        }))
    }

    fn close(self: Box<Self>) {
        unsafe {
            let close: CloseMetricsDeviceFn = method(self.adapter, slot::ADAPTER_CLOSE_METRICS_DEVICE);
            close(self.adapter, self.this);
        }
    }
}

struct MdConcurrentGroup {
    this: *mut c_void,
    library: Arc<Library>,
}

unsafe impl Send for MdConcurrentGroup {}

impl ConcurrentGroup for MdConcurrentGroup {
    fn params(&self) -> Option<ConcurrentGroupParams> {
        unsafe {
            let raw = params::<RawConcurrentGroupParams>(self.this, slot::GROUP_GET_PARAMS)?;
            Some(ConcurrentGroupParams {
                symbol_name: c_string(raw.symbol_name),
                measurement_type_mask: raw.measurement_type_mask,
                metric_set_count: raw.metric_sets_count,
            })
        }
    }

    fn metric_set(&self, index: u32) -> Option<Box<dyn MetricSet>> {
        let set = unsafe {
            let get: GetChildFn = method(self.this, slot::GROUP_GET_METRIC_SET);
            get(self.this, index)
        };
        if set.is_null() {
            return None;
        }
        Some(Box::new(MdMetricSet {
            this: set,
            _library: Arc::clone(&self.library),
        }))
    }

    fn open_io_stream(&self, set: &dyn MetricSet, process_id: u32) -> Result<StreamParams> {
        let mut timer_period_ns = 0u32;
        let mut buffer_size = 0u32;
        let code = unsafe {
            let open: OpenIoStreamFn = method(self.this, slot::GROUP_OPEN_IO_STREAM);
            open(
                self.this,
                set.handle().0 as *mut c_void,
                process_id,
                &mut timer_period_ns,
                &mut buffer_size,
            )
        };
        if code != CC_OK {
            return Err(Error::Stream(format!(
                "OpenIoStream failed with completion code {code}"
            )));
        }
        Ok(StreamParams {
            timer_period_ns,
            buffer_size,
        })
    }

    fn wait_for_reports(&self, timeout: Duration) -> Result<()> {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let code = unsafe {
            let wait: WaitForReportsFn = method(self.this, slot::GROUP_WAIT_FOR_REPORTS);
            wait(self.this, millis)
        };
        if code != CC_OK {
            return Err(Error::Stream(format!(
                "WaitForReports returned completion code {code}"
            )));
        }
        Ok(())
    }

    fn read_io_stream(&self, buffer: &mut [u8], max_reports: u32, flags: u32) -> Result<u32> {
        let mut report_count = max_reports;
        let code = unsafe {
            let read: ReadIoStreamFn = method(self.this, slot::GROUP_READ_IO_STREAM);
            read(
                self.this,
                &mut report_count,
                buffer.as_mut_ptr() as *mut c_char,
                flags,
            )
        };
        if code != CC_OK {
            return Err(Error::Stream(format!(
                "ReadIoStream failed with completion code {code}"
            )));
        }
        Ok(report_count)
    }

    fn close_io_stream(&self) {
        unsafe {
            let close: StatusFn = method(self.this, slot::GROUP_CLOSE_IO_STREAM);
            close(self.this);
        }
    }
}

struct MdMetricSet {
    this: *mut c_void,
    _library: Arc<Library>,
}

unsafe impl Send for MdMetricSet {}

impl MetricSet for MdMetricSet {
    fn params(&self) -> Option<MetricSetParams> {
        unsafe {
            let raw = params::<RawMetricSetParams>(self.this, slot::SET_GET_PARAMS)?;
            Some(MetricSetParams {
                symbol_name: c_string(raw.symbol_name),
                metrics_count: raw.metrics_count,
                information_count: raw.information_count,
                raw_report_size: raw.raw_report_size,
            })
        }
    }

    fn metric(&self, index: u32) -> Option<MetricParams> {
        unsafe {
            let get: GetChildFn = method(self.this, slot::SET_GET_METRIC);
            let metric = get(self.this, index);
            if metric.is_null() {
                return None;
            }
            let raw = params::<RawMetricParams>(metric, slot::METRIC_GET_PARAMS)?;
            Some(MetricParams {
                short_name: c_string(raw.short_name),
                symbol_name: c_string(raw.symbol_name),
                result_units: c_string(raw.metric_result_units),
            })
        }
    }

    fn calculate_metrics(&self, raw: &[u8], out: &mut [TypedValue]) -> Result<u32> {
        let raw_len = u32::try_from(raw.len())
            .map_err(|_| Error::Decode(format!("report of {} bytes is too large", raw.len())))?;
        let mut values = vec![RawTypedValue::EMPTY; out.len()];
        let mut report_count = 0u32;
        let code = unsafe {
            let calculate: CalculateMetricsFn = method(self.this, slot::SET_CALCULATE_METRICS);
            calculate(
                self.this,
                raw.as_ptr(),
                raw_len,
                values.as_mut_ptr(),
                values.len() as u32,
                &mut report_count,
                false,
            )
        };
        if code != CC_OK {
            return Err(Error::Decode(format!(
                "CalculateMetrics failed with completion code {code}"
            )));
        }
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = value.to_typed();
        }
        Ok(report_count)
    }

    fn handle(&self) -> CatalogHandle {
        CatalogHandle(self.this as usize)
    }
}
