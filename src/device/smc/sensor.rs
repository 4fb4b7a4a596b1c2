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

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use super::key::RegisterKey;
use super::protocol::{read_key, SmcService, SmcTransport};
use crate::device::{Reading, TelemetryProvider};
use crate::error::{Error, Result};

/// CPU proximity, die and per-core temperature keys across Intel Macs.
pub const DEFAULT_CPU_TEMP_KEYS: &[&str] = &[
    "TC0P", "TC0E", "TC0F", "TC0D", "TC0H", "TC1C", "TC2C", "TC3C", "TC4C", "TC5C",
];

const SOURCE: &str = "smc";

/// Temperature sensor backed by SMC registers.
pub struct SmcSensor {
    service: Box<dyn SmcService>,
    connection: Option<Arc<dyn SmcTransport>>,
    keys: Vec<String>,
}

impl Default for SmcSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SmcSensor {
    pub fn new() -> Self {
        Self::with_service(super::system_service())
    }

    /// Build a sensor around a custom SMC service.
    pub fn with_service(service: Box<dyn SmcService>) -> Self {
        Self {
            service,
            connection: None,
            keys: DEFAULT_CPU_TEMP_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Replace the keys `collect` reads.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Connect to the controller. Returns immediately if already open.
    pub fn open(&mut self) -> Result<()> {
        if self.connection.is_none() {
            self.connection = Some(self.service.connect()?);
        }
        Ok(())
    }

    /// Release the connection. Safe to call when not open.
    pub fn close(&mut self) {
        self.connection = None;
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Read the sp78 temperature register `key`, in Celsius.
    ///
    /// The key is validated before anything is sent to the controller.
    pub fn read_temperature(&self, key: &str) -> Result<f64> {
        let connection = self.connection.as_deref().ok_or(Error::NotInitialized)?;
        let key = RegisterKey::parse(key)?;
        read_key(connection, key)?.temperature()
    }

    /// Hottest of `keys`, skipping any that fail to read.
    pub fn max_temperature<S: AsRef<str>>(&self, keys: &[S]) -> Option<f64> {
        keys.iter()
            .filter_map(|key| match self.read_temperature(key.as_ref()) {
                Ok(value) => Some(value),
                Err(e) => {
                    trace!("SMC: {}: {e}", key.as_ref());
                    None
                }
            })
            .reduce(f64::max)
    }
}

impl TelemetryProvider for SmcSensor {
    fn name(&self) -> &'static str {
        "temps"
    }

    /// One `cpu`/`temp` reading: the maximum over the configured keys.
    ///
    /// A connection opened by the caller stays open; one opened here is
    /// released before returning.
    fn collect(&mut self) -> Vec<Reading> {
        let was_open = self.is_open();
        if let Err(e) = self.open() {
            debug!("SMC: unavailable: {e}");
            return Vec::new();
        }
        let max = self.max_temperature(self.keys.as_slice());
        if !was_open {
            self.close();
        }

        match max {
            Some(value) => vec![Reading::new("cpu", "temp", value, "C", SOURCE, Utc::now())],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::protocol::{KeyData, SMC_CMD_READ_BYTES, SMC_CMD_READ_KEYINFO};
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSmc {
        registers: HashMap<u32, (u32, u32, [u8; 2])>,
        calls: AtomicUsize,
        connects: AtomicUsize,
        refuse: bool,
    }

    impl FakeSmc {
        fn with(mut self, key: &str, size: u32, data_type: &[u8; 4], head: [u8; 2]) -> Self {
            let code = RegisterKey::parse(key).unwrap().code();
            self.registers
                .insert(code, (size, u32::from_be_bytes(*data_type), head));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SmcTransport for FakeSmc {
        fn call(&self, input: &KeyData) -> Result<KeyData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = KeyData {
                key: input.key,
                ..Default::default()
            };
            let Some(&(size, data_type, head)) = self.registers.get(&input.key) else {
                out.result = 132;
                return Ok(out);
            };
            match input.data8 {
                SMC_CMD_READ_KEYINFO => {
                    out.key_info.data_size = size;
                    out.key_info.data_type = data_type;
                }
                SMC_CMD_READ_BYTES => out.bytes[..2].copy_from_slice(&head),
                _ => return Err(Error::ServiceCall(-536870206)),
            }
            Ok(out)
        }
    }

    struct FakeService(Arc<FakeSmc>);

    impl SmcService for FakeService {
        fn connect(&self) -> Result<Arc<dyn SmcTransport>> {
            if self.0.refuse {
                return Err(Error::PlatformInit("AppleSMC service not found".into()));
            }
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.clone())
        }
    }

    fn sensor(smc: FakeSmc) -> (SmcSensor, Arc<FakeSmc>) {
        let smc = Arc::new(smc);
        (
            SmcSensor::with_service(Box::new(FakeService(Arc::clone(&smc)))),
            smc,
        )
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let (mut temps, smc) = sensor(FakeSmc::default());
        temps.close();
        temps.open().unwrap();
        temps.open().unwrap();
        assert_eq!(smc.connects.load(Ordering::SeqCst), 1);
        assert!(temps.is_open());
        temps.close();
        temps.close();
        assert!(!temps.is_open());
        // The fixture and the service keep theirs; the sensor's is gone.
        assert_eq!(Arc::strong_count(&smc), 2);
    }

    #[test]
    fn test_read_requires_open() {
        let (temps, smc) = sensor(FakeSmc::default().with("TC0P", 2, b"sp78", [0x16, 0]));
        assert!(matches!(
            temps.read_temperature("TC0P"),
            Err(Error::NotInitialized)
        ));
        assert_eq!(smc.calls(), 0);
    }

    #[test]
    fn test_read_temperature() {
        let (mut temps, smc) = sensor(FakeSmc::default().with("TC0P", 2, b"sp78", [0x16, 0]));
        temps.open().unwrap();
        assert_eq!(temps.read_temperature("TC0P").unwrap(), 22.0);
        assert_eq!(smc.calls(), 2);
    }

    #[test]
    fn test_short_key_fails_before_any_call() {
        let (mut temps, smc) = sensor(FakeSmc::default());
        temps.open().unwrap();
        let err = temps.read_temperature("TC0").unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert_eq!(err.status(), crate::error::STATUS_INVALID_KEY);
        assert_eq!(smc.calls(), 0);
    }

    #[test]
    fn test_validation_codes() {
        let (mut temps, _smc) = sensor(
            FakeSmc::default()
                .with("TC0P", 1, b"sp78", [0x16, 0])
                .with("TC0D", 4, b"flt ", [0x16, 0]),
        );
        temps.open().unwrap();
        assert_eq!(
            temps.read_temperature("TC0P").unwrap_err().status(),
            crate::error::STATUS_WRONG_SIZE
        );
        assert_eq!(
            temps.read_temperature("TC0D").unwrap_err().status(),
            crate::error::STATUS_WRONG_TYPE
        );
        assert_eq!(
            temps.read_temperature("TC9Z").unwrap_err().status(),
            crate::error::STATUS_NO_DATA
        );
    }

    #[test]
    fn test_max_temperature_skips_failures() {
        let (mut temps, _smc) = sensor(
            FakeSmc::default()
                .with("TC0P", 2, b"sp78", [0x16, 0x00])
                .with("TC0D", 2, b"sp78", [0x2A, 0x80])
                .with("TC1C", 2, b"flt ", [0x7F, 0x00]),
        );
        temps.open().unwrap();
        assert_eq!(
            temps.max_temperature(&["TC0P", "TC0D", "TC1C", "TC"]),
            Some(42.5)
        );
        assert_eq!(temps.max_temperature(&["TC1C"]), None);
    }

    #[test]
    fn test_collect_emits_cpu_reading_and_closes() {
        let (mut temps, smc) = sensor(
            FakeSmc::default()
                .with("TC0P", 2, b"sp78", [0x30, 0x00])
                .with("TC2C", 2, b"sp78", [0x38, 0x40]),
        );
        let readings = temps.collect();
        assert_eq!(readings.len(), 1);
        let reading = &readings[0];
        assert_eq!(reading.device, "cpu");
        assert_eq!(reading.name, "temp");
        assert_eq!(reading.unit, "C");
        assert_eq!(reading.source, "smc");
        assert_eq!(reading.value, 56.25);
        assert!(!temps.is_open());
        assert_eq!(Arc::strong_count(&smc), 2);
    }

    #[test]
    fn test_collect_keeps_caller_connection_open() {
        let (mut temps, smc) = sensor(FakeSmc::default().with("TC0P", 2, b"sp78", [0x16, 0x00]));
        temps.open().unwrap();
        assert_eq!(temps.collect().len(), 1);
        assert!(temps.is_open());
        assert_eq!(temps.read_temperature("TC0P").unwrap(), 22.0);
        assert_eq!(smc.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_collect_with_custom_keys() {
        let (temps, _smc) = sensor(FakeSmc::default().with("Tp09", 2, b"sp78", [0x20, 0]));
        let mut temps = temps.with_keys(["Tp09"]);
        assert_eq!(temps.keys(), ["Tp09".to_string()]);
        assert_eq!(temps.collect()[0].value, 32.0);
    }

    #[test]
    fn test_collect_without_service_is_empty() {
        let (mut temps, _smc) = sensor(FakeSmc {
            refuse: true,
            ..Default::default()
        });
        assert!(temps.collect().is_empty());
        assert!(matches!(temps.open(), Err(Error::PlatformInit(_))));
    }
}
