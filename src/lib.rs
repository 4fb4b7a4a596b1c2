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

//! # hwprobe
//!
//! Telemetry providers for closed, vendor-specific hardware monitoring
//! interfaces:
//!
//! - [`IntelGpuProvider`]: Intel GPU temperature, power, VRAM and utilization
//!   counters through the Metrics Discovery library (Windows and Linux).
//! - [`SmcSensor`]: CPU temperature registers of the Apple SMC (macOS).
//!
//! Both are synchronous and poll-driven. On a platform without the backing
//! interface, `init`/`open` fail with [`Error::NotSupported`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hwprobe::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut gpu = IntelGpuProvider::new();
//!     gpu.init()?;
//!
//!     for index in 0..gpu.device_count()? {
//!         let sample = gpu.read(index)?;
//!         if let Some(power) = sample.power_w {
//!             println!("gpu{index}: {power:.1} W");
//!         }
//!     }
//!
//!     gpu.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Aggregator use
//!
//! Both providers implement [`TelemetryProvider`], which turns one poll into
//! a list of [`Reading`]s:
//!
//! ```rust,no_run
//! use hwprobe::prelude::*;
//!
//! let mut providers: Vec<Box<dyn TelemetryProvider>> = vec![
//!     Box::new(IntelGpuProvider::new()),
//!     Box::new(SmcSensor::new()),
//! ];
//! for provider in providers.iter_mut() {
//!     for reading in provider.collect() {
//!         println!("{} {} {} {}", reading.device, reading.name, reading.value, reading.unit);
//!     }
//! }
//! ```

pub mod common {
    pub mod config;
}
pub mod device;
pub mod error;
pub mod prelude;
pub mod utils;

pub use common::config::{GpuProviderConfig, ProbeConfig};
pub use device::intel_md::{Channel, SelectionPolicy};
pub use device::{GpuSample, IntelGpuProvider, Reading, SmcSensor, TelemetryProvider};
pub use error::{Error, Result};
