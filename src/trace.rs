//! Rolling sensor trace for charting.
//!
//! One hour of 1 Hz readings kept in parallel fixed-capacity ring buffers
//! (timestamp, three probes, humidity).  Every `record` writes to all five
//! buffers, so they always hold the same number of samples and index `i`
//! of each buffer belongs to the same reading.

use chrono::{DateTime, Utc};
use heapless::HistoryBuffer;
use serde::Serialize;

use crate::sensors::Reading;

/// One hour at one sample per second.
pub const TRACE_CAPACITY: usize = 3600;

/// Points returned per series by [`SensorTrace::query`].
pub const QUERY_POINTS: usize = 60;

/// Subsampling stride applied before the last [`QUERY_POINTS`] are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Raw = 1,
    Quarter = 15,
    Hour = 60,
}

impl Granularity {
    /// Map an interval name (`1m`, `15m`, `1h`) to a stride.
    pub fn from_interval(interval: &str) -> Option<Self> {
        match interval {
            "1m" => Some(Self::Raw),
            "15m" => Some(Self::Quarter),
            "1h" => Some(Self::Hour),
            _ => None,
        }
    }

    pub fn stride(self) -> usize {
        self as usize
    }
}

/// Index-aligned series returned to the charting front end.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TraceSeries {
    /// Milliseconds since the Unix epoch.
    pub timestamps: Vec<i64>,
    pub temp1: Vec<f32>,
    pub temp2: Vec<f32>,
    pub temp3: Vec<f32>,
    pub humidity: Vec<f32>,
}

pub struct SensorTrace {
    timestamps: HistoryBuffer<i64, TRACE_CAPACITY>,
    temp1: HistoryBuffer<f32, TRACE_CAPACITY>,
    temp2: HistoryBuffer<f32, TRACE_CAPACITY>,
    temp3: HistoryBuffer<f32, TRACE_CAPACITY>,
    humidity: HistoryBuffer<f32, TRACE_CAPACITY>,
}

impl Default for SensorTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// Every `stride`-th sample from the oldest, then the newest `keep`.
fn subsample<T: Copy>(buf: &HistoryBuffer<T, TRACE_CAPACITY>, stride: usize, keep: usize) -> Vec<T> {
    let picked: Vec<T> = buf.oldest_ordered().step_by(stride).copied().collect();
    let skip = picked.len().saturating_sub(keep);
    picked.into_iter().skip(skip).collect()
}

impl SensorTrace {
    pub fn new() -> Self {
        Self {
            timestamps: HistoryBuffer::new(),
            temp1: HistoryBuffer::new(),
            temp2: HistoryBuffer::new(),
            temp3: HistoryBuffer::new(),
            humidity: HistoryBuffer::new(),
        }
    }

    /// Append a reading; the oldest sample is evicted once full.
    pub fn record(&mut self, reading: &Reading, at: DateTime<Utc>) {
        let [t1, t2, t3] = reading.temperatures;
        self.timestamps.write(at.timestamp_millis());
        self.temp1.write(t1);
        self.temp2.write(t2);
        self.temp3.write(t3);
        self.humidity.write(reading.humidity);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent [`QUERY_POINTS`] samples at the given stride.
    pub fn query(&self, granularity: Granularity) -> TraceSeries {
        let stride = granularity.stride();
        TraceSeries {
            timestamps: subsample(&self.timestamps, stride, QUERY_POINTS),
            temp1: subsample(&self.temp1, stride, QUERY_POINTS),
            temp2: subsample(&self.temp2, stride, QUERY_POINTS),
            temp3: subsample(&self.temp3, stride, QUERY_POINTS),
            humidity: subsample(&self.humidity, stride, QUERY_POINTS),
        }
    }
}
