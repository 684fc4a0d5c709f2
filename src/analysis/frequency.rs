//! Frequency estimation from positive-going zero crossings.
//!
//! Each crossing is located by linear interpolation between the two samples
//! that straddle zero; the reciprocal of the spacing between consecutive
//! crossings gives one frequency estimate per cycle.

use itertools::Itertools;
use serde::Serialize;

/// One frequency estimate, reported at the later of its two crossings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyPoint {
    /// Seconds since the start of the record
    pub time: f64,
    pub hz: f64,
}

fn sign(x: f64) -> Option<f64> {
    if x.is_nan() {
        None
    } else if x > 0.0 {
        Some(1.0)
    } else if x < 0.0 {
        Some(-1.0)
    } else {
        Some(0.0)
    }
}

/// Interpolated times (s) of upward zero crossings
pub fn rising_crossings(samples: &[f64], sample_period: f64) -> Vec<f64> {
    samples
        .iter()
        .tuple_windows()
        .enumerate()
        .filter_map(|(i, (&a, &b))| {
            let rising = sign(b)? - sign(a)? > 0.0;
            rising.then(|| i as f64 * sample_period - a * sample_period / (b - a))
        })
        .collect()
}

/// Cycle-by-cycle frequency; fewer than two crossings yields an empty series
pub fn zero_crossing_frequency(samples: &[f64], sample_period: f64) -> Vec<FrequencyPoint> {
    rising_crossings(samples, sample_period)
        .into_iter()
        .tuple_windows()
        .filter_map(|(t0, t1)| {
            let dt = t1 - t0;
            (dt > 0.0).then(|| FrequencyPoint { time: t1, hz: 1.0 / dt })
        })
        .collect()
}

/// Index of the channel used as the frequency reference
pub fn default_reference(channel_count: usize, preferred: usize) -> Option<usize> {
    channel_count.checked_sub(1).map(|last| preferred.min(last))
}
