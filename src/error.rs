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

//! Unified error types for the hwprobe library.
//!
//! Every failure a provider can report is a variant of [`enum@Error`]. Callers
//! that need the flat integer contract of the aggregator can use
//! [`Error::status`], which maps each failure class to a distinct negative
//! code.
//!
//! # Example
//!
//! ```rust,no_run
//! use hwprobe::{Error, IntelGpuProvider};
//!
//! let mut gpu = IntelGpuProvider::new();
//! match gpu.init() {
//!     Ok(()) => println!("{} adapter(s)", gpu.device_count().unwrap_or(0)),
//!     Err(Error::NotSupported(what)) => println!("unsupported: {what}"),
//!     Err(e) => println!("init failed ({}): {e}", e.status()),
//! }
//! ```

use thiserror::Error;

/// Generic failure: setup, lifecycle misuse, or a stream/driver error.
pub const STATUS_FAILURE: i32 = -1;
/// The register key is missing or shorter than four characters.
pub const STATUS_INVALID_KEY: i32 = -2;
/// The register reported fewer bytes than the decoder needs.
pub const STATUS_WRONG_SIZE: i32 = -3;
/// The register's type tag is not the expected fixed-point type.
pub const STATUS_WRONG_TYPE: i32 = -4;
/// The hardware produced no report inside the wait window.
pub const STATUS_NO_DATA: i32 = -5;
/// The hardware produced a report that decoded to nothing.
pub const STATUS_EMPTY_REPORT: i32 = -6;

/// The main error type for hwprobe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The vendor library or system service could not be brought up.
    #[error("Platform initialization failed: {0}")]
    PlatformInit(String),

    /// The running platform has no backend for this provider.
    #[error("Feature not supported on this platform: {0}")]
    NotSupported(String),

    /// The vendor catalog reported zero adapters.
    #[error("No supported devices found")]
    NoDevicesFound,

    /// A query was issued before `init`/`open` succeeded.
    #[error("Provider is not initialized")]
    NotInitialized,

    /// The device index is outside the enumerated adapter range.
    #[error("Invalid device index: {0}")]
    InvalidDevice(usize),

    /// An adapter or metrics device could not be opened.
    #[error("Device access error: {0}")]
    DeviceAccess(String),

    /// The adapter has no metric set able to serve snapshot queries.
    #[error("No metric set selected for device {0}")]
    NoSelection(usize),

    /// Opening, reading, or sizing the telemetry stream failed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// No hardware report arrived inside the wait window.
    #[error("No report available from hardware")]
    NoData,

    /// The report decoded to zero output reports.
    #[error("Hardware returned an empty report")]
    EmptyReport,

    /// The raw report could not be turned into metric values.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The register key is not a four character ASCII code.
    #[error("Invalid register key: {0:?}")]
    InvalidKey(String),

    /// The system controller call returned a non-success code.
    #[error("System controller call failed with code {0:#x}")]
    ServiceCall(i32),

    /// The register is too small to hold the requested value.
    #[error("Register data size {0} is too small")]
    RegisterSize(u32),

    /// The register does not hold the requested value type.
    #[error("Unexpected register type {0:?}")]
    RegisterType(String),
}

impl Error {
    /// Flat status code for this error, always negative.
    ///
    /// Decode validation failures get their own codes so a caller can tell a
    /// wrong register from an empty hardware report. System controller call
    /// failures pass the platform return code through when it is negative.
    pub fn status(&self) -> i32 {
        match self {
            Error::InvalidKey(_) => STATUS_INVALID_KEY,
            Error::RegisterSize(_) => STATUS_WRONG_SIZE,
            Error::RegisterType(_) => STATUS_WRONG_TYPE,
            Error::NoData => STATUS_NO_DATA,
            Error::EmptyReport => STATUS_EMPTY_REPORT,
            Error::ServiceCall(code) if *code < 0 => *code,
            _ => STATUS_FAILURE,
        }
    }

    /// True for per-call sampling failures that leave the provider usable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Stream(_) | Error::NoData | Error::EmptyReport | Error::Decode(_)
        )
    }
}

/// A specialized Result type for hwprobe operations.
pub type Result<T> = std::result::Result<T, Error>;
