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

//! Apple SMC (System Management Controller) temperature registers
//!
//! ## SMC Key Format
//! SMC keys are 4-character codes (FourCC) that identify specific sensors:
//! - `TC0P`, `TC0D`: CPU proximity/die temperature
//! - `TC1C`..`TC5C`: per-core temperature
//!
//! Temperature registers hold `sp78` signed fixed point: the high byte is the
//! integer part, the low byte 1/256ths of a degree.
//!
//! The kernel allows one user client per process, so every [`SmcSensor`]
//! shares a single underlying connection on macOS.

pub mod connection;
pub mod key;
pub mod protocol;
pub mod sensor;

#[cfg(target_os = "macos")]
mod iokit;

pub use key::{decode_sp78, RegisterKey, SMC_TYPE_SP78};
pub use protocol::{KeyData, RegisterValue, SmcService, SmcTransport};
pub use sensor::{SmcSensor, DEFAULT_CPU_TEMP_KEYS};

/// The platform's SMC service.
pub fn system_service() -> Box<dyn SmcService> {
    #[cfg(target_os = "macos")]
    {
        Box::new(iokit::IoKitService)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(UnsupportedService)
    }
}

#[cfg(not(target_os = "macos"))]
struct UnsupportedService;

#[cfg(not(target_os = "macos"))]
impl SmcService for UnsupportedService {
    fn connect(&self) -> crate::error::Result<std::sync::Arc<dyn SmcTransport>> {
        Err(crate::error::Error::NotSupported("Apple SMC".to_string()))
    }
}
