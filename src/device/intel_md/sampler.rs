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

//! One-shot sampling pipeline.
//!
//! Each sample opens a stream on the selected metric set, waits for the
//! hardware to produce a report, reads only the freshest one, closes the
//! stream, and decodes. Nothing is kept between calls: the stream is closed
//! before decoding starts and the report buffers are dropped on every path.

use std::time::Duration;

use tracing::{debug, trace};

use super::catalog::{ConcurrentGroup, MetricSet, StreamParams, TypedValue, IO_READ_FLAG_DROP_OLD_REPORTS};
use super::selector::Selection;
use crate::common::config::ProbeConfig;
use crate::device::GpuSample;
use crate::error::{Error, Result};
use crate::utils::apply_unit_scale;

/// An open I/O stream. Closed when dropped.
pub struct IoStream<'a> {
    group: &'a dyn ConcurrentGroup,
    params: StreamParams,
}

impl<'a> IoStream<'a> {
    pub fn open(group: &'a dyn ConcurrentGroup, set: &dyn MetricSet, process_id: u32) -> Result<Self> {
        let params = group.open_io_stream(set, process_id)?;
        trace!(
            "MD: stream open (timer {}ns, buffer {} bytes)",
            params.timer_period_ns,
            params.buffer_size
        );
        Ok(Self { group, params })
    }

    pub fn params(&self) -> StreamParams {
        self.params
    }

    /// Wait for a report, then read the newest one into `buffer`.
    ///
    /// The wait result is advisory: the read decides whether data arrived.
    pub fn read_latest(&self, buffer: &mut [u8], timeout: Duration) -> Result<u32> {
        if let Err(e) = self.group.wait_for_reports(timeout) {
            debug!("MD: wait for reports: {e}");
        }
        self.group.read_io_stream(
            buffer,
            ProbeConfig::REPORTS_PER_SAMPLE,
            IO_READ_FLAG_DROP_OLD_REPORTS,
        )
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for IoStream<'_> {
    fn drop(&mut self) {
        self.group.close_io_stream();
    }
}

/// Take one sample from `selection` and write its resolved channels.
///
/// On error `out` is left exactly as it was.
pub fn sample_selection(selection: &Selection, timeout: Duration, out: &mut GpuSample) -> Result<()> {
    let raw = read_report(selection, timeout)?;
    let values = decode_report(selection, &raw)?;
    drop(raw);
    write_channels(selection, &values, out);
    Ok(())
}

fn read_report(selection: &Selection, timeout: Duration) -> Result<Vec<u8>> {
    let stream = IoStream::open(
        selection.group.as_ref(),
        selection.set.as_ref(),
        std::process::id(),
    )?;

    let mut size = stream.params().buffer_size;
    if size == 0 {
        size = selection
            .set
            .params()
            .map(|params| params.raw_report_size)
            .unwrap_or(0);
    }
    if size == 0 {
        return Err(Error::Stream("metric set reports a zero-sized report".to_string()));
    }

    let mut raw = vec![0u8; size as usize];
    let read = stream.read_latest(&mut raw, timeout);
    stream.close();

    match read? {
        0 => Err(Error::NoData),
        _ => Ok(raw),
    }
}

fn decode_report(selection: &Selection, raw: &[u8]) -> Result<Vec<TypedValue>> {
    let count = selection.value_count();
    if count == 0 {
        return Err(Error::Decode("metric set has no values".to_string()));
    }

    let mut values = vec![TypedValue::default(); count];
    let reports = selection.set.calculate_metrics(raw, &mut values)?;
    if reports == 0 {
        return Err(Error::EmptyReport);
    }
    Ok(values)
}

fn write_channels(selection: &Selection, values: &[TypedValue], out: &mut GpuSample) {
    let metrics_count = selection.resolution.metrics_count;
    for (channel, index) in selection.channels().resolved() {
        if index >= metrics_count {
            continue;
        }
        let Some(value) = values.get(index as usize) else {
            continue;
        };

        let mut value = value.as_f64();
        if channel.applies_unit_scale() {
            if let Some(units) = selection
                .set
                .metric(index)
                .and_then(|metric| metric.result_units)
            {
                value = apply_unit_scale(value, &units);
            }
        }
        out.set(channel, value);
    }
}
