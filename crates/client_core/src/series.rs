//! Bounded history of one scalar metric, sampled once per poll tick.

use std::{collections::VecDeque, time::Duration};

/// How much history the graphs keep.
pub const DEFAULT_HISTORY_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_ms: u64,
    pub value: f64,
}

/// Capacity-bounded FIFO of samples with a wraparound-tolerant time axis.
///
/// Every append advances the series clock by exactly one tick interval, so
/// sample timestamps are strictly increasing and evenly spaced. Once the buffer
/// holds `capacity` samples each append evicts the oldest one.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    capacity: usize,
    tick_interval_ms: u64,
    elapsed_ms: u64,
    samples: VecDeque<Sample>,
}

impl RollingSeries {
    pub fn new(capacity: usize, tick_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tick_interval_ms: duration_ms(tick_interval).max(1),
            elapsed_ms: 0,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Sizes the buffer to hold `window` worth of ticks.
    pub fn for_window(window: Duration, tick_interval: Duration) -> Self {
        let tick_ms = duration_ms(tick_interval).max(1);
        let capacity = (duration_ms(window) / tick_ms) as usize;
        Self::new(capacity, tick_interval)
    }

    pub fn append(&mut self, value: f64) {
        self.elapsed_ms += self.tick_interval_ms;
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            elapsed_ms: self.elapsed_ms,
            value,
        });
    }

    /// Axis label, in seconds, for the sample at `index`.
    ///
    /// Before the first rollover labels count up from zero by tick. After it,
    /// labels are absolute elapsed time shifted back by the window span, which
    /// keeps the axis monotonic while the buffer itself wraps.
    pub fn label_for(&self, index: usize, current_elapsed_ms: u64) -> f64 {
        let tick = self.tick_interval_ms as f64;
        let boundary = self.boundary_ms();
        if current_elapsed_ms < boundary {
            index as f64 * tick / 1000.0
        } else {
            (current_elapsed_ms as f64 - (boundary as f64 - tick * index as f64)) / 1000.0
        }
    }

    pub fn labels(&self) -> Vec<f64> {
        (0..self.samples.len())
            .map(|index| self.label_for(index, self.elapsed_ms))
            .collect()
    }

    pub fn boundary_ms(&self) -> u64 {
        self.capacity as u64 * self.tick_interval_ms
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.value).collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|sample| sample.value)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.elapsed_ms = 0;
    }

    pub fn view(&self) -> SeriesView {
        SeriesView {
            labels: self.labels(),
            values: self.values(),
            capacity: self.capacity,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Owned copy of a series, ready to render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesView {
    pub labels: Vec<f64>,
    pub values: Vec<f64>,
    pub capacity: usize,
    pub elapsed_ms: u64,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "tests/series_tests.rs"]
mod tests;
