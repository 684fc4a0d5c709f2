//! Turn a decoded record into the primary/secondary tables the viewer plots.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use strum::{Display, EnumString};
use tracing::info;

use super::digital::DigitalMeta;
use crate::comtrade::cfg::{AnalogChannel, DataFormat, Revision, ScalingSide};
use crate::comtrade::{record, ComtradeError, Record};

/// Unit system for analog traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Units {
    /// Power-system side, voltages in kV
    #[default]
    Primary,
    /// Instrument transformer side
    Secondary,
}

impl Units {
    pub fn label(&self) -> &'static str {
        match self {
            Units::Primary => "Primary (kV/A)",
            Units::Secondary => "Secondary (V/A)",
        }
    }
}

/// Processed, immutable view of one record
#[derive(Debug, Clone)]
pub struct ProcessedRecording {
    pub station: String,
    pub device_id: String,
    pub revision: Revision,
    pub data_format: DataFormat,
    pub line_frequency: f64,
    pub start_time: NaiveDateTime,
    pub trigger_time: NaiveDateTime,
    pub sample_period: f64,
    /// Seconds since `start_time`
    pub time: Vec<f64>,
    pub analog_ids: Vec<String>,
    pub analog_units: Vec<String>,
    pub primary: Vec<Vec<f64>>,
    pub secondary: Vec<Vec<f64>>,
    pub status_ids: Vec<String>,
    pub status: Vec<Vec<u8>>,
    pub digital_meta: Vec<DigitalMeta>,
}

impl ProcessedRecording {
    pub fn sample_count(&self) -> usize {
        self.time.len()
    }

    pub fn analog_index(&self, id: &str) -> Option<usize> {
        self.analog_ids.iter().position(|c| c == id)
    }

    pub fn status_index(&self, id: &str) -> Option<usize> {
        self.status_ids.iter().position(|c| c == id)
    }

    pub fn analog(&self, units: Units, index: usize) -> &[f64] {
        match units {
            Units::Primary => &self.primary[index],
            Units::Secondary => &self.secondary[index],
        }
    }

    pub fn datetime_at(&self, t: f64) -> Result<NaiveDateTime, ComtradeError> {
        record::datetime_at(self.start_time, t)
    }

    /// Wall-clock time of every sample
    pub fn datetimes(&self) -> Result<Vec<NaiveDateTime>, ComtradeError> {
        self.time.iter().map(|&t| self.datetime_at(t)).collect()
    }
}

/// Primary and secondary values of one channel.
///
/// Secondary-side recordings are lifted by the CT/VT ratio and expressed in
/// thousands; primary-side recordings are reduced by the inverse ratio.
pub fn scale_channel(channel: &AnalogChannel, values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (p, s) = (channel.primary, channel.secondary);
    match channel.scaling {
        ScalingSide::Secondary => {
            let primary = if s != 0.0 {
                values.iter().map(|v| v * (p / s) / 1000.0).collect()
            } else {
                values.to_vec()
            };
            (primary, values.to_vec())
        }
        ScalingSide::Primary => {
            let secondary = if p != 0.0 {
                values.iter().map(|v| v * s / p).collect()
            } else {
                values.to_vec()
            };
            (values.iter().map(|v| v / 1000.0).collect(), secondary)
        }
    }
}

/// Decode and scale a record
pub fn process(cfg_text: &str, dat_bytes: &[u8], station: &str) -> Result<ProcessedRecording, ComtradeError> {
    let started = Instant::now();
    let rec = Record::from_bytes(cfg_text, dat_bytes)?;
    let sample_period = rec.sample_period()?;

    let (primary, secondary): (Vec<_>, Vec<_>) = rec
        .cfg
        .analog_channels
        .iter()
        .zip(&rec.analog)
        .map(|(channel, values)| scale_channel(channel, values))
        .unzip();

    let status_ids = rec.status_channel_ids();
    let digital_meta = status_ids
        .iter()
        .zip(&rec.status)
        .map(|(id, samples)| DigitalMeta::from_samples(id, samples))
        .collect();

    let processed = ProcessedRecording {
        station: station.to_string(),
        device_id: rec.cfg.device_id.clone(),
        revision: rec.cfg.revision,
        data_format: rec.cfg.data_format,
        line_frequency: rec.cfg.line_frequency,
        start_time: rec.start_timestamp(),
        trigger_time: rec.trigger_timestamp(),
        sample_period,
        analog_ids: rec.analog_channel_ids(),
        analog_units: rec.cfg.analog_channels.iter().map(|c| c.unit.clone()).collect(),
        primary,
        secondary,
        status_ids,
        status: rec.status,
        digital_meta,
        time: rec.time,
    };

    info!(
        station = %processed.station,
        analog = processed.analog_ids.len(),
        status = processed.status_ids.len(),
        samples = processed.sample_count(),
        duration_ms = started.elapsed().as_millis() as u64,
        "processed COMTRADE record"
    );
    Ok(processed)
}
