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

//! Intel GPU telemetry through the Metrics Discovery API
//!
//! The driver publishes hardware counters as a versioned catalog with no
//! stable identifiers. This module finds the counters for temperature, power,
//! VRAM and utilization by name/unit heuristics, then samples them on demand.
//!
//! ## Modules
//! - `catalog`: traits over the adapter → device → group → set → metric tree
//! - `resolver`: keyword rules mapping metrics to channels
//! - `selector`: scores metric sets and picks one per adapter
//! - `sampler`: one-shot stream open/wait/read/close and decode
//! - `provider`: lifecycle and the public sampling surface

pub mod catalog;
pub mod provider;
pub mod resolver;
pub mod sampler;
pub mod selector;

#[cfg(any(target_os = "windows", target_os = "linux"))]
mod ffi;

#[cfg(test)]
pub(crate) mod fake;

pub use catalog::{LibraryLoader, TypedValue};
pub use provider::{AdapterContext, IntelGpuProvider};
pub use resolver::{Channel, ChannelIndices};
pub use selector::{Selection, SelectionPolicy};

/// Loader for the platform's Metrics Discovery library.
pub fn system_loader(paths: &[String]) -> Box<dyn LibraryLoader> {
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    {
        Box::new(ffi::MdLibraryLoader::new(paths.to_vec()))
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = paths;
        Box::new(UnsupportedLoader)
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
struct UnsupportedLoader;

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
impl LibraryLoader for UnsupportedLoader {
    fn load(&self) -> crate::error::Result<Box<dyn catalog::MetricsLibrary>> {
        Err(crate::error::Error::NotSupported(
            "Intel Metrics Discovery".to_string(),
        ))
    }
}
