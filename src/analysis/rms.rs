//! Trailing one-cycle RMS.

/// Samples per nominal cycle, at least one
pub fn cycle_window(sample_period: f64, nominal_frequency_hz: f64) -> usize {
    if sample_period <= 0.0 || nominal_frequency_hz <= 0.0 {
        return 1;
    }
    let samples = (1.0 / nominal_frequency_hz) / sample_period;
    ((samples + 1e-9).floor() as usize).max(1)
}

/// Rolling RMS over `window` samples ending at each point.
///
/// The first `window - 1` points, and any window containing a missing (NaN)
/// sample, are `None`.
pub fn rolling_rms(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut missing = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            missing += 1;
        } else {
            sum += v * v;
        }
        if i >= window {
            let old = values[i - window];
            if old.is_nan() {
                missing -= 1;
            } else {
                sum -= old * old;
            }
        }
        let full = i + 1 >= window && missing == 0;
        out.push(full.then(|| (sum / window as f64).max(0.0).sqrt()));
    }
    out
}
