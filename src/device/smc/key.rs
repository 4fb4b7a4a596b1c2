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

//! SMC key and type codes.
//!
//! Both register keys (`TC0P`) and data type tags (`sp78`) are FourCC codes:
//! four ASCII bytes packed big-endian into a `u32`.

use std::fmt;
use std::str::FromStr;

use crate::common::config::ProbeConfig;
use crate::error::{Error, Result};

/// Signed 7.8 fixed point, used by temperature registers.
pub const SMC_TYPE_SP78: u32 = u32::from_be_bytes(*b"sp78");

/// A four character register key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterKey(u32);

impl RegisterKey {
    /// Encode `key`. Only the first four bytes are used; they must be ASCII.
    pub fn parse(key: &str) -> Result<Self> {
        let bytes = key.as_bytes();
        if bytes.len() < ProbeConfig::SMC_KEY_LENGTH {
            return Err(Error::InvalidKey(key.to_string()));
        }
        let code = &bytes[..ProbeConfig::SMC_KEY_LENGTH];
        if !code.is_ascii() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(Self(u32::from_be_bytes([code[0], code[1], code[2], code[3]])))
    }

    pub fn code(self) -> u32 {
        self.0
    }
}

impl FromStr for RegisterKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&fourcc_to_string(self.0))
    }
}

/// Render a FourCC code, e.g. a register's type tag.
pub fn fourcc_to_string(code: u32) -> String {
    String::from_utf8_lossy(&code.to_be_bytes()).into_owned()
}

/// Decode signed 7.8 fixed point from the first two bytes, big-endian.
pub fn decode_sp78(bytes: [u8; 2]) -> f64 {
    i16::from_be_bytes(bytes) as f64 / 256.0
}
