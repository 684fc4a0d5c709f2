//! Status channel activity and on-interval extraction.

use serde::{Deserialize, Serialize};

/// Label prefix for channels that never assert
pub const EMPTY_PREFIX: &str = "[EMPTY] ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalMeta {
    pub id: String,
    pub label: String,
    pub empty: bool,
}

impl DigitalMeta {
    pub fn from_samples(id: &str, samples: &[u8]) -> Self {
        let empty = is_empty(samples);
        Self {
            id: id.to_string(),
            label: if empty {
                format!("{EMPTY_PREFIX}{id}")
            } else {
                id.to_string()
            },
            empty,
        }
    }
}

/// A channel is empty when it holds a single value and that value is not 1
pub fn is_empty(samples: &[u8]) -> bool {
    match samples.first() {
        None => true,
        Some(&first) => first != 1 && samples.iter().all(|&s| s == first),
    }
}

/// Channel id behind a display label
pub fn strip_label(label: &str) -> &str {
    label.strip_prefix(EMPTY_PREFIX).unwrap_or(label)
}

/// Labels of the first `limit` channels that show activity
pub fn default_selection(meta: &[DigitalMeta], limit: usize) -> Vec<String> {
    meta.iter()
        .filter(|m| !m.empty)
        .take(limit)
        .map(|m| m.label.clone())
        .collect()
}

/// An interval during which a status channel was high
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitalEvent {
    pub signal: String,
    /// Seconds since the start of the record
    pub start: f64,
    pub finish: f64,
}

/// Pair rising and falling edges into on-intervals.
///
/// A channel already high at the first sample starts there; one still high
/// at the last sample finishes there.
pub fn events(signal: &str, samples: &[u8], times: &[f64]) -> Vec<DigitalEvent> {
    let n = samples.len().min(times.len());
    if n == 0 {
        return Vec::new();
    }

    let mut starts = Vec::new();
    let mut finishes = Vec::new();
    if samples[0] == 1 {
        starts.push(times[0]);
    }
    for i in 1..n {
        match i16::from(samples[i]) - i16::from(samples[i - 1]) {
            1 => starts.push(times[i]),
            -1 => finishes.push(times[i]),
            _ => {}
        }
    }
    if samples[n - 1] == 1 {
        finishes.push(times[n - 1]);
    }

    starts
        .into_iter()
        .zip(finishes)
        .map(|(start, finish)| DigitalEvent {
            signal: signal.to_string(),
            start,
            finish,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn times(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.001).collect()
    }

    #[rstest]
    #[case(&[0, 0, 0], true)]
    #[case(&[1, 1, 1], false)]
    #[case(&[0, 1, 0], false)]
    #[case(&[1], false)]
    #[case(&[], true)]
    fn test_is_empty(#[case] samples: &[u8], #[case] expected: bool) {
        assert_eq!(is_empty(samples), expected);
    }

    #[test]
    fn test_meta_labels() {
        let quiet = DigitalMeta::from_samples("52A", &[0, 0]);
        assert_eq!(quiet.label, "[EMPTY] 52A");
        assert!(quiet.empty);
        assert_eq!(strip_label(&quiet.label), "52A");

        let active = DigitalMeta::from_samples("TRIP", &[0, 1]);
        assert_eq!(active.label, "TRIP");
        assert_eq!(strip_label("TRIP"), "TRIP");
    }

    #[test]
    fn test_default_selection_skips_empty() {
        let meta: Vec<DigitalMeta> = (0..12)
            .map(|i| {
                let samples: &[u8] = if i % 3 == 0 { &[0, 0] } else { &[0, 1] };
                DigitalMeta::from_samples(&format!("D{i}"), samples)
            })
            .collect();
        let selected = default_selection(&meta, 8);
        assert_eq!(selected.len(), 8);
        assert!(selected.iter().all(|l| !l.starts_with(EMPTY_PREFIX)));
        assert_eq!(selected[0], "D1");
    }

    #[test]
    fn test_events_inner_pulse() {
        let ev = events("TRIP", &[0, 1, 1, 0, 0], &times(5));
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].signal, "TRIP");
        assert!((ev[0].start - 0.001).abs() < 1e-12);
        assert!((ev[0].finish - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_events_open_ends() {
        let ev = events("CB", &[1, 0, 1, 1], &times(4));
        assert_eq!(ev.len(), 2);
        let t = times(4);
        assert_eq!((ev[0].start, ev[0].finish), (t[0], t[1]));
        assert_eq!((ev[1].start, ev[1].finish), (t[2], t[3]));
    }

    #[test]
    fn test_events_quiet_channel() {
        assert!(events("X", &[0, 0, 0], &times(3)).is_empty());
        assert!(events("X", &[], &[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_events_cover_each_run(samples in proptest::collection::vec(0u8..=1, 1..200)) {
            let t = times(samples.len());
            let ev = events("S", &samples, &t);

            let runs = samples
                .iter()
                .enumerate()
                .filter(|&(i, &s)| s == 1 && (i == 0 || samples[i - 1] == 0))
                .count();
            prop_assert_eq!(ev.len(), runs);

            for e in &ev {
                prop_assert!(e.start <= e.finish);
            }
            for pair in ev.windows(2) {
                prop_assert!(pair[0].finish <= pair[1].start);
            }
        }
    }
}
