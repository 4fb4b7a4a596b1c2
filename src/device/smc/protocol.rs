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

//! SMC wire structures and the two-phase key read.
//!
//! Every request and reply is one [`KeyData`] struct passed through the
//! SMC user client's struct method. A read asks for the key's metadata
//! first, then for its bytes using the size the metadata reported.

use std::sync::Arc;

use tracing::trace;

use super::key::{decode_sp78, fourcc_to_string, RegisterKey, SMC_TYPE_SP78};
use crate::common::config::ProbeConfig;
use crate::error::{Error, Result};

/// SMC command selectors, sent in `KeyData::data8`
pub const SMC_CMD_READ_BYTES: u8 = 5;
pub const SMC_CMD_READ_KEYINFO: u8 = 9;

/// Struct method index of the SMC user client
pub const KERNEL_INDEX_SMC: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyInfo {
    pub data_size: u32,
    pub data_type: u32,
    pub data_attributes: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDataVer {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub reserved: u8,
    pub release: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PLimitData {
    pub version: u16,
    pub length: u16,
    pub cpu_p_limit: u32,
    pub gpu_p_limit: u32,
    pub mem_p_limit: u32,
}

/// Request and reply layout of the SMC struct method.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyData {
    pub key: u32,
    pub vers: KeyDataVer,
    pub p_limit_data: PLimitData,
    pub key_info: KeyInfo,
    pub result: u8,
    pub status: u8,
    pub data8: u8,
    pub data32: u32,
    pub bytes: [u8; 32],
}

const _: () = assert!(
    std::mem::size_of::<KeyData>() == 80,
    "KeyData size mismatch - expected 80 bytes"
);

impl KeyData {
    pub fn key_info_request(key: RegisterKey) -> Self {
        Self {
            key: key.code(),
            data8: SMC_CMD_READ_KEYINFO,
            ..Default::default()
        }
    }

    pub fn read_bytes_request(key: RegisterKey, data_size: u32) -> Self {
        Self {
            key: key.code(),
            key_info: KeyInfo {
                data_size,
                ..Default::default()
            },
            data8: SMC_CMD_READ_BYTES,
            ..Default::default()
        }
    }
}

/// One round-trip to the system management controller.
pub trait SmcTransport: Send + Sync {
    fn call(&self, input: &KeyData) -> Result<KeyData>;
}

/// Opens a connection to the system management controller.
pub trait SmcService: Send {
    fn connect(&self) -> Result<Arc<dyn SmcTransport>>;
}

/// Raw register contents after a two-phase read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue {
    pub key: RegisterKey,
    pub data_size: u32,
    pub data_type: u32,
    pub bytes: [u8; 32],
}

impl RegisterValue {
    /// Decode as an sp78 temperature in Celsius.
    ///
    /// Size is checked before type, so a one-byte register of the wrong type
    /// reports [`Error::RegisterSize`].
    pub fn temperature(&self) -> Result<f64> {
        if self.data_size < ProbeConfig::SMC_MIN_TEMPERATURE_BYTES {
            return Err(Error::RegisterSize(self.data_size));
        }
        if self.data_type != SMC_TYPE_SP78 {
            return Err(Error::RegisterType(fourcc_to_string(self.data_type)));
        }
        Ok(decode_sp78([self.bytes[0], self.bytes[1]]))
    }
}

/// Read `key`: metadata first, then the bytes.
///
/// A key the controller doesn't know reports [`Error::NoData`].
pub fn read_key(transport: &dyn SmcTransport, key: RegisterKey) -> Result<RegisterValue> {
    let info = transport.call(&KeyData::key_info_request(key))?;
    if info.result != 0 {
        trace!("SMC: {key}: key info result {}", info.result);
        return Err(Error::NoData);
    }
    let KeyInfo {
        data_size,
        data_type,
        ..
    } = info.key_info;

    let data = transport.call(&KeyData::read_bytes_request(key, data_size))?;
    Ok(RegisterValue {
        key,
        data_size,
        data_type,
        bytes: data.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies from a fixed register and records every request.
    struct Recorder {
        info: KeyInfo,
        result: u8,
        bytes: [u8; 32],
        requests: Mutex<Vec<KeyData>>,
    }

    impl Recorder {
        fn new(data_size: u32, data_type: &[u8; 4], head: [u8; 2]) -> Self {
            let mut bytes = [0u8; 32];
            bytes[..2].copy_from_slice(&head);
            Self {
                info: KeyInfo {
                    data_size,
                    data_type: u32::from_be_bytes(*data_type),
                    data_attributes: 0,
                },
                result: 0,
                bytes,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl SmcTransport for Recorder {
        fn call(&self, input: &KeyData) -> Result<KeyData> {
            self.requests.lock().unwrap().push(*input);
            let mut out = KeyData {
                key: input.key,
                result: self.result,
                ..Default::default()
            };
            match input.data8 {
                SMC_CMD_READ_KEYINFO => out.key_info = self.info,
                SMC_CMD_READ_BYTES => out.bytes = self.bytes,
                other => panic!("unexpected command {other}"),
            }
            Ok(out)
        }
    }

    fn key() -> RegisterKey {
        RegisterKey::parse("TC0P").unwrap()
    }

    #[test]
    fn test_two_phase_read() {
        let smc = Recorder::new(2, b"sp78", [0x16, 0x00]);
        let value = read_key(&smc, key()).unwrap();
        assert_eq!(value.temperature().unwrap(), 22.0);

        let requests = smc.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].data8, SMC_CMD_READ_KEYINFO);
        assert_eq!(requests[1].data8, SMC_CMD_READ_BYTES);
        assert_eq!(requests[1].key_info.data_size, 2);
        assert!(requests.iter().all(|r| r.key == key().code()));
    }

    #[test]
    fn test_wrong_size() {
        let smc = Recorder::new(1, b"sp78", [0x16, 0x00]);
        let value = read_key(&smc, key()).unwrap();
        assert!(matches!(value.temperature(), Err(Error::RegisterSize(1))));
    }

    #[test]
    fn test_wrong_type_regardless_of_bytes() {
        let smc = Recorder::new(4, b"flt ", [0x16, 0x00]);
        let value = read_key(&smc, key()).unwrap();
        match value.temperature() {
            Err(Error::RegisterType(tag)) => assert_eq!(tag, "flt "),
            other => panic!("expected RegisterType, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_key_is_no_data() {
        let mut smc = Recorder::new(0, b"\0\0\0\0", [0, 0]);
        smc.result = 132;
        assert!(matches!(read_key(&smc, key()), Err(Error::NoData)));
        assert_eq!(smc.requests.lock().unwrap().len(), 1);
    }
}
