use chrono::{Duration, NaiveDateTime};
use std::path::Path;
use tracing::debug;

use super::cfg::{self, ComtradeConfig};
use super::dat::{self, DataTable};
use super::error::ComtradeError;

/// A fully decoded disturbance record
#[derive(Debug, Clone)]
pub struct Record {
    pub cfg: ComtradeConfig,
    /// Seconds since the start timestamp, one per sample
    pub time: Vec<f64>,
    /// Scaled analog values per channel
    pub analog: Vec<Vec<f64>>,
    /// Status values per channel
    pub status: Vec<Vec<u8>>,
}

impl Record {
    /// Decode a record from the CFG text and the raw DAT bytes
    pub fn from_bytes(cfg_text: &str, dat_bytes: &[u8]) -> Result<Self, ComtradeError> {
        let cfg = cfg::parse(cfg_text)?;
        let table = dat::decode(&cfg, dat_bytes)?;
        let time = time_axis(&cfg, &table)?;
        if let Some(&last) = time.last() {
            datetime_at(cfg.start_timestamp, last)?;
        }
        debug!(
            station = %cfg.station_name,
            analog = cfg.analog_count(),
            status = cfg.status_count(),
            samples = time.len(),
            format = %cfg.data_format,
            "decoded COMTRADE record"
        );
        Ok(Self {
            cfg,
            time,
            analog: table.analog,
            status: table.status,
        })
    }

    /// Read and decode a `.CFG` / `.DAT` pair from disk
    pub fn load(cfg_path: impl AsRef<Path>, dat_path: impl AsRef<Path>) -> Result<Self, ComtradeError> {
        let cfg_bytes = std::fs::read(cfg_path)?;
        let dat_bytes = std::fs::read(dat_path)?;
        Self::from_bytes(&String::from_utf8_lossy(&cfg_bytes), &dat_bytes)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn analog_channel_ids(&self) -> Vec<String> {
        self.cfg.analog_channel_ids()
    }

    pub fn status_channel_ids(&self) -> Vec<String> {
        self.cfg.status_channel_ids()
    }

    pub fn start_timestamp(&self) -> NaiveDateTime {
        self.cfg.start_timestamp
    }

    pub fn trigger_timestamp(&self) -> NaiveDateTime {
        self.cfg.trigger_timestamp
    }

    /// Trigger offset from the start of the record (s)
    pub fn trigger_time(&self) -> f64 {
        seconds(self.cfg.trigger_timestamp - self.cfg.start_timestamp)
    }

    /// Interval between the first two samples (s)
    pub fn sample_period(&self) -> Result<f64, ComtradeError> {
        match self.time.as_slice() {
            [first, second, ..] => Ok(second - first),
            other => Err(ComtradeError::TooFewSamples(other.len())),
        }
    }

    /// Wall-clock time of an offset into the record
    pub fn datetime_at(&self, t: f64) -> Result<NaiveDateTime, ComtradeError> {
        datetime_at(self.cfg.start_timestamp, t)
    }
}

/// `start + t` seconds, rounded to the nanosecond
pub fn datetime_at(start: NaiveDateTime, t: f64) -> Result<NaiveDateTime, ComtradeError> {
    start
        .checked_add_signed(Duration::nanoseconds((t * 1e9).round() as i64))
        .ok_or(ComtradeError::TimeOutOfRange(t))
}

fn seconds(d: Duration) -> f64 {
    d.num_nanoseconds()
        .map(|n| n as f64 / 1e9)
        .unwrap_or_else(|| d.num_milliseconds() as f64 / 1e3)
}

/// Build the time axis, preferring the rate table over per-sample timestamps
fn time_axis(cfg: &ComtradeConfig, table: &DataTable) -> Result<Vec<f64>, ComtradeError> {
    let n = table.len();
    if cfg.has_sample_rate() {
        let mut time = Vec::with_capacity(n);
        let mut t = 0.0;
        let mut segment = 0;
        for i in 0..n {
            if i > 0 {
                // Sample numbers are 1-based: sample `i + 1` belongs to the first
                // segment whose end is at or beyond it.
                while segment + 1 < cfg.sample_rates.len()
                    && (i as u64 + 1) > cfg.sample_rates[segment].end_sample
                {
                    segment += 1;
                }
                let rate = cfg.sample_rates[segment].rate;
                if rate > 0.0 {
                    t += 1.0 / rate;
                } else if let (Some(prev), Some(cur)) = (table.timestamps[i - 1], table.timestamps[i]) {
                    t += (cur - prev) * cfg.time_multiplier * 1e-6;
                } else {
                    return Err(ComtradeError::MissingTime(i + 1));
                }
            }
            time.push(t);
        }
        Ok(time)
    } else {
        table
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                ts.map(|ts| ts * cfg.time_multiplier * 1e-6)
                    .ok_or(ComtradeError::MissingTime(i + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cfg_text(rates: &str, format: &str, timemult: &str) -> String {
        format!(
            "\
FEEDER 12,DFR,1999
2,1A,1D
1,VA,A,,V,1,0,0,-100,100,1000,1,S
1,TRIP,,,0
50
{rates}
01/01/2024,12:00:00.000000
01/01/2024,12:00:00.002000
{format}
{timemult}
"
        )
    }

    #[test]
    fn test_time_from_single_rate() {
        let cfg = cfg_text("1\n1000,4", "ASCII", "1");
        let dat = "1,,1,0\n2,,2,0\n3,,3,1\n4,,4,1\n";
        let rec = Record::from_bytes(&cfg, dat.as_bytes()).unwrap();
        assert_eq!(rec.len(), 4);
        assert!((rec.time[3] - 0.003).abs() < 1e-12);
        assert!((rec.sample_period().unwrap() - 0.001).abs() < 1e-12);
        assert!((rec.trigger_time() - 0.002).abs() < 1e-12);
        assert_eq!(rec.status[0], vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_time_from_rate_segments() {
        let cfg = cfg_text("2\n1000,2\n500,4", "ASCII", "1");
        let dat = "1,,0,0\n2,,0,0\n3,,0,0\n4,,0,0\n";
        let rec = Record::from_bytes(&cfg, dat.as_bytes()).unwrap();
        let expected = [0.0, 0.001, 0.003, 0.005];
        for (t, e) in rec.time.iter().zip(expected) {
            assert!((t - e).abs() < 1e-12, "{t} != {e}");
        }
    }

    #[test]
    fn test_time_from_timestamps_and_multiplier() {
        let cfg = cfg_text("0\n0,3", "ASCII", "10");
        let dat = "1,0,0,0\n2,100,0,0\n3,250,0,0\n";
        let rec = Record::from_bytes(&cfg, dat.as_bytes()).unwrap();
        assert!((rec.time[1] - 0.001).abs() < 1e-12);
        assert!((rec.time[2] - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn test_missing_timestamp_without_rate() {
        let cfg = cfg_text("0\n0,2", "ASCII", "1");
        let err = Record::from_bytes(&cfg, b"1,0,0,0\n2,,0,0\n").unwrap_err();
        assert!(matches!(err, ComtradeError::MissingTime(2)));
    }

    #[test]
    fn test_single_sample_has_no_period() {
        let cfg = cfg_text("1\n1000,1", "ASCII", "1");
        let rec = Record::from_bytes(&cfg, b"1,,5,0\n").unwrap();
        assert!(matches!(rec.sample_period(), Err(ComtradeError::TooFewSamples(1))));
    }

    #[test]
    fn test_datetime_at() {
        let cfg = cfg_text("1\n1000,2", "ASCII", "1");
        let rec = Record::from_bytes(&cfg, b"1,,0,0\n2,,0,0\n").unwrap();
        let t = rec.datetime_at(0.0015).unwrap();
        assert_eq!((t - rec.start_timestamp()).num_microseconds(), Some(1500));
    }

    #[test]
    fn test_record_past_the_last_date_is_rejected() {
        let cfg = cfg_text("1\n1000,2", "ASCII", "1")
            .replace("01/01/2024,12:00:00.000000", "31/12/262142,23:59:59.999999");
        let err = Record::from_bytes(&cfg, b"1,,0,0\n2,,0,0\n").unwrap_err();
        assert!(matches!(err, ComtradeError::TimeOutOfRange(_)), "{err}");
    }

    #[test]
    fn test_datetime_at_overflow_is_an_error() {
        let start = NaiveDateTime::MAX;
        assert!(matches!(datetime_at(start, 1.0), Err(ComtradeError::TimeOutOfRange(_))));
        assert_eq!(datetime_at(start, 0.0).unwrap(), start);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("rec.cfg");
        let dat_path = dir.path().join("rec.dat");
        std::fs::write(&cfg_path, cfg_text("1\n1000,2", "ASCII", "1")).unwrap();
        let mut dat = std::fs::File::create(&dat_path).unwrap();
        writeln!(dat, "1,,1,0").unwrap();
        writeln!(dat, "2,,-1,1").unwrap();

        let rec = Record::load(&cfg_path, &dat_path).unwrap();
        assert_eq!(rec.analog_channel_ids(), vec!["VA"]);
        assert_eq!(rec.status_channel_ids(), vec!["TRIP"]);
        assert_eq!(rec.analog[0], vec![1.0, -1.0]);
    }
}
