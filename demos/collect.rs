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

//! Poll every provider a few times and print the readings as JSON lines.
//!
//! ```sh
//! RUST_LOG=hwprobe=debug cargo run --example collect
//! ```

use std::thread;
use std::time::Duration;

use hwprobe::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hwprobe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut providers: Vec<Box<dyn TelemetryProvider>> = vec![
        Box::new(IntelGpuProvider::new()),
        Box::new(SmcSensor::new()),
    ];

    for _ in 0..3 {
        for provider in providers.iter_mut() {
            let readings = provider.collect();
            if readings.is_empty() {
                println!("{}: no readings", provider.name());
            }
            for reading in readings {
                match serde_json::to_string(&reading) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("{}: {e}", provider.name()),
                }
            }
        }
        thread::sleep(Duration::from_secs(1));
    }
}
