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

//! IOKit transport to the AppleSMC user client.

use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use super::connection::SharedConnection;
use super::protocol::{KeyData, SmcService, SmcTransport, KERNEL_INDEX_SMC};
use crate::common::config::ProbeConfig;
use crate::error::{Error, Result};

// IOKit framework linkage
#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    fn mach_task_self() -> u32;
    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingService(main_port: u32, matching: *mut c_void) -> u32;
    fn IOServiceOpen(device: u32, owning_task: u32, conn_type: u32, conn: *mut u32) -> i32;
    fn IOServiceClose(conn: u32) -> i32;
    fn IOObjectRelease(object: u32) -> i32;
    fn IOConnectCallStructMethod(
        conn: u32,
        selector: u32,
        input: *const c_void,
        input_size: usize,
        output: *mut c_void,
        output_size: *mut usize,
    ) -> i32;
}

/// `kIOMainPortDefault`
const MAIN_PORT_DEFAULT: u32 = 0;
const KERN_SUCCESS: i32 = 0;

/// The one SMC connection of this process.
static CONNECTION: Lazy<SharedConnection<IoKitConnection>> = Lazy::new(SharedConnection::new);

struct IoKitConnection {
    conn: u32,
}

impl IoKitConnection {
    fn open() -> Result<Self> {
        let name = CString::new(ProbeConfig::SMC_SERVICE_NAME)
            .map_err(|e| Error::PlatformInit(e.to_string()))?;
        unsafe {
            // The matching dictionary is consumed by IOServiceGetMatchingService.
            let matching = IOServiceMatching(name.as_ptr());
            if matching.is_null() {
                return Err(Error::PlatformInit(
                    "Failed to create IOService matching dictionary".to_string(),
                ));
            }

            let service = IOServiceGetMatchingService(MAIN_PORT_DEFAULT, matching);
            if service == 0 {
                return Err(Error::PlatformInit(format!(
                    "{} service not found",
                    ProbeConfig::SMC_SERVICE_NAME
                )));
            }

            let mut conn: u32 = 0;
            let result = IOServiceOpen(service, mach_task_self(), 0, &mut conn);
            IOObjectRelease(service);
            if result != KERN_SUCCESS {
                return Err(Error::ServiceCall(result));
            }

            debug!("SMC: connection opened");
            Ok(Self { conn })
        }
    }
}

impl SmcTransport for IoKitConnection {
    fn call(&self, input: &KeyData) -> Result<KeyData> {
        let mut output = KeyData::default();
        let mut output_size = std::mem::size_of::<KeyData>();
        // SAFETY: both buffers are `KeyData`, the layout the user client expects.
        let result = unsafe {
            IOConnectCallStructMethod(
                self.conn,
                KERNEL_INDEX_SMC,
                input as *const KeyData as *const c_void,
                std::mem::size_of::<KeyData>(),
                &mut output as *mut KeyData as *mut c_void,
                &mut output_size,
            )
        };
        if result != KERN_SUCCESS {
            return Err(Error::ServiceCall(result));
        }
        Ok(output)
    }
}

impl Drop for IoKitConnection {
    fn drop(&mut self) {
        unsafe {
            IOServiceClose(self.conn);
        }
        debug!("SMC: connection closed");
    }
}

/// Connects through the shared process-wide AppleSMC connection.
pub struct IoKitService;

impl SmcService for IoKitService {
    fn connect(&self) -> Result<Arc<dyn SmcTransport>> {
        let connection = CONNECTION.acquire(IoKitConnection::open)?;
        Ok(connection)
    }
}
