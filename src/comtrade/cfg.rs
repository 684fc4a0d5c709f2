//! `.CFG` configuration file parser.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::warn;

use super::error::ComtradeError;

/// Standard revision declared on the first CFG line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Revision {
    #[strum(serialize = "1991")]
    #[serde(rename = "1991")]
    R1991,
    #[strum(serialize = "1999")]
    #[serde(rename = "1999")]
    R1999,
    #[strum(serialize = "2013")]
    #[serde(rename = "2013")]
    R2013,
}

/// Encoding of the `.DAT` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFormat {
    Ascii,
    Binary,
    Binary32,
    Float32,
}

/// Side of the instrument transformer the recorded values refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ScalingSide {
    #[strum(serialize = "P")]
    Primary,
    #[default]
    #[strum(serialize = "S")]
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogChannel {
    pub index: usize,
    pub id: String,
    pub phase: String,
    pub circuit_component: String,
    pub unit: String,
    /// Multiplier `a` in `a * x + b`
    pub multiplier: f64,
    /// Offset `b` in `a * x + b`
    pub offset: f64,
    /// Time skew between channels (µs)
    pub skew: f64,
    pub min: f64,
    pub max: f64,
    /// Instrument transformer primary ratio factor
    pub primary: f64,
    /// Instrument transformer secondary ratio factor
    pub secondary: f64,
    pub scaling: ScalingSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChannel {
    pub index: usize,
    pub id: String,
    pub phase: String,
    pub circuit_component: String,
    /// Normal (non-alarm) state
    pub normal_state: u8,
}

/// One entry of the sample rate table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRate {
    /// Sampling frequency (Hz), 0 when samples are timestamped instead
    pub rate: f64,
    /// Number of the last sample recorded at this rate (1-based)
    pub end_sample: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComtradeConfig {
    pub station_name: String,
    pub device_id: String,
    pub revision: Revision,
    pub analog_channels: Vec<AnalogChannel>,
    pub status_channels: Vec<StatusChannel>,
    /// Nominal line frequency (Hz)
    pub line_frequency: f64,
    pub sample_rates: Vec<SampleRate>,
    pub start_timestamp: NaiveDateTime,
    pub trigger_timestamp: NaiveDateTime,
    pub data_format: DataFormat,
    /// Multiplication factor applied to DAT timestamps (µs per tick)
    pub time_multiplier: f64,
    pub time_code: Option<String>,
    pub local_code: Option<String>,
    pub time_quality: Option<String>,
    pub leap_second: Option<u8>,
}

impl ComtradeConfig {
    pub fn analog_count(&self) -> usize {
        self.analog_channels.len()
    }

    pub fn status_count(&self) -> usize {
        self.status_channels.len()
    }

    pub fn analog_channel_ids(&self) -> Vec<String> {
        self.analog_channels.iter().map(|c| c.id.clone()).collect()
    }

    pub fn status_channel_ids(&self) -> Vec<String> {
        self.status_channels.iter().map(|c| c.id.clone()).collect()
    }

    /// Whether the time axis can be derived from the rate table
    pub fn has_sample_rate(&self) -> bool {
        self.sample_rates.iter().any(|r| r.rate > 0.0)
    }

    /// Sample count announced by the rate table
    pub fn declared_samples(&self) -> Option<usize> {
        self.sample_rates
            .last()
            .map(|r| r.end_sample as usize)
            .filter(|n| *n > 0)
    }
}

impl FromStr for ComtradeConfig {
    type Err = ComtradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse the text of a `.CFG` file
pub fn parse(text: &str) -> Result<ComtradeConfig, ComtradeError> {
    let mut lines = CfgLines::new(text);

    let (line, f) = lines.next("station line")?;
    let station_name = field(&f, 0).to_string();
    let device_id = field(&f, 1).to_string();
    let revision = match field(&f, 2) {
        "" => Revision::R1991,
        rev => Revision::from_str(rev).unwrap_or_else(|_| {
            warn!(line, revision = rev, "unknown COMTRADE revision, reading as 1999");
            Revision::R1999
        }),
    };

    let (line, f) = lines.next("channel counts")?;
    let total: usize = number(line, field(&f, 0), "total channel count")?;
    let analog_count: usize = counted(line, field(&f, 1), 'A')?;
    let status_count: usize = counted(line, field(&f, 2), 'D')?;
    if total != analog_count + status_count {
        return Err(ComtradeError::cfg(
            line,
            format!("total {total} does not match {analog_count}A + {status_count}D"),
        ));
    }

    let mut analog_channels = Vec::new();
    for _ in 0..analog_count {
        let (line, f) = lines.next("analog channel")?;
        analog_channels.push(analog_channel(line, &f)?);
    }

    let mut status_channels = Vec::new();
    for _ in 0..status_count {
        let (line, f) = lines.next("status channel")?;
        status_channels.push(status_channel(line, &f)?);
    }

    let (line, f) = lines.next("line frequency")?;
    let line_frequency = number_or(line, field(&f, 0), "line frequency", 0.0)?;

    let (line, f) = lines.next("sample rate count")?;
    let nrates: usize = number_or(line, field(&f, 0), "nrates", 0)?;
    // A zero count is still followed by one `0,endsamp` line.
    let mut sample_rates = Vec::new();
    for _ in 0..nrates.max(1) {
        let (line, f) = lines.next("sample rate")?;
        sample_rates.push(SampleRate {
            rate: number_or(line, field(&f, 0), "samp", 0.0)?,
            end_sample: number_or(line, field(&f, 1), "endsamp", 0)?,
        });
    }

    let (line, f) = lines.next("start timestamp")?;
    let start_timestamp = timestamp(line, &f, revision)?;
    let (line, f) = lines.next("trigger timestamp")?;
    let trigger_timestamp = timestamp(line, &f, revision)?;

    let (line, f) = lines.next("data file type")?;
    let data_format = DataFormat::from_str(field(&f, 0)).map_err(|_| {
        ComtradeError::cfg(line, format!("unknown data file type '{}'", field(&f, 0)))
    })?;

    let time_multiplier = match lines.next_optional() {
        Some((line, f)) => number_or(line, field(&f, 0), "timemult", 1.0)?,
        None => 1.0,
    };

    let mut time_code = None;
    let mut local_code = None;
    let mut time_quality = None;
    let mut leap_second = None;
    if revision == Revision::R2013 {
        if let Some((_, f)) = lines.next_optional() {
            time_code = non_empty(field(&f, 0));
            local_code = non_empty(field(&f, 1));
        }
        if let Some((line, f)) = lines.next_optional() {
            time_quality = non_empty(field(&f, 0));
            leap_second = match field(&f, 1) {
                "" => None,
                v => Some(number(line, v, "leapsec")?),
            };
        }
    }

    Ok(ComtradeConfig {
        station_name,
        device_id,
        revision,
        analog_channels,
        status_channels,
        line_frequency,
        sample_rates,
        start_timestamp,
        trigger_timestamp,
        data_format,
        time_multiplier: if time_multiplier > 0.0 { time_multiplier } else { 1.0 },
        time_code,
        local_code,
        time_quality,
        leap_second,
    })
}

struct CfgLines<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> CfgLines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.trim_start_matches('\u{feff}').lines().collect(),
            pos: 0,
        }
    }

    /// Next line as trimmed fields, with its 1-based line number
    fn next(&mut self, what: &'static str) -> Result<(usize, Vec<&'a str>), ComtradeError> {
        let line = *self
            .lines
            .get(self.pos)
            .ok_or(ComtradeError::CfgTruncated(what))?;
        self.pos += 1;
        Ok((self.pos, split_fields(line)))
    }

    fn next_optional(&mut self) -> Option<(usize, Vec<&'a str>)> {
        let line = *self.lines.get(self.pos)?;
        if line.trim().is_empty() {
            return None;
        }
        self.pos += 1;
        Some((self.pos, split_fields(line)))
    }
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn field<'a>(fields: &[&'a str], i: usize) -> &'a str {
    fields.get(i).copied().unwrap_or("")
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn number<T: FromStr>(line: usize, value: &str, name: &str) -> Result<T, ComtradeError> {
    value
        .parse()
        .map_err(|_| ComtradeError::cfg(line, format!("invalid {name} '{value}'")))
}

fn number_or<T: FromStr>(line: usize, value: &str, name: &str, default: T) -> Result<T, ComtradeError> {
    if value.is_empty() {
        Ok(default)
    } else {
        number(line, value, name)
    }
}

/// Parse a channel count such as `4A` or `12D`
fn counted(line: usize, value: &str, suffix: char) -> Result<usize, ComtradeError> {
    let digits = value
        .strip_suffix(suffix)
        .or_else(|| value.strip_suffix(suffix.to_ascii_lowercase()))
        .ok_or_else(|| ComtradeError::cfg(line, format!("expected count ending in '{suffix}', got '{value}'")))?;
    number(line, digits, "channel count")
}

fn analog_channel(line: usize, f: &[&str]) -> Result<AnalogChannel, ComtradeError> {
    if f.len() < 10 {
        return Err(ComtradeError::cfg(
            line,
            format!("analog channel needs at least 10 fields, found {}", f.len()),
        ));
    }
    let scaling = match field(f, 12) {
        "" => ScalingSide::Secondary,
        v => ScalingSide::from_str(v)
            .map_err(|_| ComtradeError::cfg(line, format!("invalid P/S flag '{v}'")))?,
    };
    Ok(AnalogChannel {
        index: number(line, f[0], "channel index")?,
        id: f[1].to_string(),
        phase: f[2].to_string(),
        circuit_component: f[3].to_string(),
        unit: f[4].to_string(),
        multiplier: number_or(line, f[5], "multiplier", 1.0)?,
        offset: number_or(line, f[6], "offset", 0.0)?,
        skew: number_or(line, f[7], "skew", 0.0)?,
        min: number_or(line, f[8], "min", 0.0)?,
        max: number_or(line, f[9], "max", 0.0)?,
        primary: number_or(line, field(f, 10), "primary", 1.0)?,
        secondary: number_or(line, field(f, 11), "secondary", 1.0)?,
        scaling,
    })
}

fn status_channel(line: usize, f: &[&str]) -> Result<StatusChannel, ComtradeError> {
    // 1991 layout is `Dn,ch_id,y`; later revisions add phase and circuit component.
    let (phase, circuit_component, state) = match f.len() {
        0..=1 => {
            return Err(ComtradeError::cfg(line, "status channel needs an index and an id"));
        }
        2 => ("", "", ""),
        3 => ("", "", f[2]),
        _ => (f[2], f[3], field(f, 4)),
    };
    Ok(StatusChannel {
        index: number(line, f[0], "channel index")?,
        id: f[1].to_string(),
        phase: phase.to_string(),
        circuit_component: circuit_component.to_string(),
        normal_state: number_or::<u8>(line, state, "normal state", 0)?.min(1),
    })
}

fn timestamp(line: usize, f: &[&str], revision: Revision) -> Result<NaiveDateTime, ComtradeError> {
    let date = field(f, 0);
    let time = field(f, 1);
    let parts: Vec<&str> = date.split('/').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ComtradeError::cfg(line, format!("invalid date '{date}'")));
    }
    let first: u32 = number(line, parts[0], "date")?;
    let second: u32 = number(line, parts[1], "date")?;
    let year = year(line, parts[2])?;

    // 1991 writes mm/dd/yy, later revisions dd/mm/yyyy.
    let (mut month, mut day) = match revision {
        Revision::R1991 => (first, second),
        _ => (second, first),
    };
    if month > 12 && day <= 12 {
        std::mem::swap(&mut month, &mut day);
    }

    let (hour, minute, mut second, mut nanos) = time_of_day(line, time)?;
    if second == 60 {
        second = 59;
        nanos += 1_000_000_000;
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_nano_opt(hour, minute, second, nanos))
        .ok_or_else(|| ComtradeError::cfg(line, format!("invalid timestamp '{date},{time}'")))
}

fn year(line: usize, value: &str) -> Result<i32, ComtradeError> {
    let year: i32 = number(line, value, "year")?;
    Ok(match value.len() {
        1 | 2 if year >= 70 => 1900 + year,
        1 | 2 => 2000 + year,
        _ => year,
    })
}

fn time_of_day(line: usize, value: &str) -> Result<(u32, u32, u32, u32), ComtradeError> {
    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ComtradeError::cfg(line, format!("invalid time '{value}'")));
    };
    let (secs, fraction) = s.split_once('.').unwrap_or((s, ""));
    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().take(9).collect();
        number(line, &format!("{digits:0<9}"), "fractional seconds")?
    };
    Ok((
        number(line, h, "hour")?,
        number(line, m, "minute")?,
        number(line, secs, "second")?,
        nanos,
    ))
}
