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

use std::sync::{Arc, Mutex, Weak};

use crate::error::Result;

/// Process-wide slot for a connection that must exist at most once.
///
/// Holders share one `Arc`; the connection closes when the last holder drops
/// it, and the next `acquire` opens a fresh one.
pub struct SharedConnection<T> {
    slot: Mutex<Weak<T>>,
}

impl<T> Default for SharedConnection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedConnection<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Weak::new()),
        }
    }

    pub fn acquire(&self, open: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slot.upgrade() {
            return Ok(existing);
        }
        let connection = Arc::new(open()?);
        *slot = Arc::downgrade(&connection);
        Ok(connection)
    }

    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .strong_count()
            > 0
    }
}
