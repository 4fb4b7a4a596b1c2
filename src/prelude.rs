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

//! The hwprobe prelude.
//!
//! Import everything commonly needed with:
//!
//! ```rust
//! use hwprobe::prelude::*;
//! ```

// Providers
pub use crate::device::{IntelGpuProvider, SmcSensor, TelemetryProvider};

// Configuration
pub use crate::common::config::GpuProviderConfig;
pub use crate::device::intel_md::SelectionPolicy;

// Error types
pub use crate::error::{Error, Result};

// Data types
pub use crate::device::intel_md::Channel;
pub use crate::device::{GpuSample, Reading};
