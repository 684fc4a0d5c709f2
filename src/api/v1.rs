use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ApiError;
use crate::{
    analysis::{
        digital::{self, DigitalMeta},
        frequency, process, rms, Units,
    },
    bundle::{Bundle, UploadedFile},
    comtrade::{ComtradeError, DataFormat, Revision},
    config::ViewerConfig,
    state::AppState,
    store::{recording_id, Recording},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/recordings", post(upload_recording))
        .route("/recordings/:id", get(get_recording))
        .route("/recordings/:id/frequency", get(get_frequency))
        .route("/recordings/:id/waveforms", get(get_waveforms))
        .route("/recordings/:id/digitals", get(get_digitals))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct AnalogSummary {
    pub id: String,
    pub unit: String,
}

/// Initial selections for the three views
#[derive(Debug, Serialize)]
pub struct ViewDefaults {
    pub frequency_reference: Option<String>,
    pub units: Units,
    pub analog_channels: Vec<String>,
    pub digital_channels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordingSummary {
    pub id: String,
    pub message: String,
    pub station: String,
    pub device_id: String,
    pub revision: Revision,
    pub data_format: DataFormat,
    pub line_frequency: f64,
    pub start_time: NaiveDateTime,
    pub trigger_time: NaiveDateTime,
    pub sample_period: f64,
    pub sample_count: usize,
    pub analog_channels: Vec<AnalogSummary>,
    pub digital_channels: Vec<DigitalMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub defaults: ViewDefaults,
}

impl RecordingSummary {
    fn new(recording: &Recording, viewer: &ViewerConfig) -> Self {
        let data = &recording.data;
        let frequency_reference =
            frequency::default_reference(data.analog_ids.len(), viewer.frequency_reference_index)
                .map(|i| data.analog_ids[i].clone());
        Self {
            id: recording.id.clone(),
            message: format!(
                "Loaded Station: {} | Event Time: {}",
                data.station, data.start_time
            ),
            station: data.station.clone(),
            device_id: data.device_id.clone(),
            revision: data.revision,
            data_format: data.data_format,
            line_frequency: data.line_frequency,
            start_time: data.start_time,
            trigger_time: data.trigger_time,
            sample_period: data.sample_period,
            sample_count: data.sample_count(),
            analog_channels: data
                .analog_ids
                .iter()
                .zip(&data.analog_units)
                .map(|(id, unit)| AnalogSummary {
                    id: id.clone(),
                    unit: unit.clone(),
                })
                .collect(),
            digital_channels: data.digital_meta.clone(),
            header: recording.header.clone(),
            info: recording.info.clone(),
            defaults: ViewDefaults {
                frequency_reference,
                units: Units::default(),
                analog_channels: data
                    .analog_ids
                    .iter()
                    .take(viewer.default_analog_channels)
                    .cloned()
                    .collect(),
                digital_channels: digital::default_selection(
                    &data.digital_meta,
                    viewer.default_digital_channels,
                ),
            },
        }
    }
}

/// POST /api/v1/recordings - multipart upload of a COMTRADE bundle
pub async fn upload_recording(
    State(st): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecordingSummary>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field
            .file_name()
            .or_else(|| field.name())
            .unwrap_or_default()
            .to_string();
        let bytes = field.bytes().await?;
        debug!(file = %name, size = bytes.len(), "received upload part");
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    let bundle = Bundle::from_files(files)?;
    let id = recording_id(&bundle);
    let Bundle {
        cfg_text,
        dat,
        header,
        info,
        station,
    } = bundle;

    // Only the decoded record is cached; header and info follow each upload.
    let data = match st.store.get(&id) {
        Some(cached) => {
            debug!(%id, "serving cached recording");
            cached.data.clone()
        }
        None => {
            let data =
                tokio::task::spawn_blocking(move || process(&cfg_text, &dat, &station)).await??;
            info!(%id, station = %data.station, "recording loaded");
            Arc::new(data)
        }
    };
    let recording = st.store.insert(Recording {
        id,
        header,
        info,
        data,
    });

    Ok(Json(RecordingSummary::new(&recording, &st.cfg.viewer)))
}

fn lookup(st: &AppState, id: &str) -> Result<Arc<Recording>, ApiError> {
    st.store
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("recording '{id}'")))
}

/// Comma separated selection; `None` when the parameter is absent
fn selection(raw: &Option<String>) -> Option<Vec<String>> {
    raw.as_ref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

/// GET /api/v1/recordings/:id
pub async fn get_recording(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordingSummary>, ApiError> {
    let recording = lookup(&st, &id)?;
    Ok(Json(RecordingSummary::new(&recording, &st.cfg.viewer)))
}

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FrequencySample {
    pub time: NaiveDateTime,
    /// Seconds since the start of the record
    pub offset: f64,
    pub hz: f64,
}

#[derive(Debug, Serialize)]
pub struct FrequencyResponse {
    pub channel: String,
    pub y_range: [f64; 2],
    pub points: Vec<FrequencySample>,
}

/// GET /api/v1/recordings/:id/frequency
pub async fn get_frequency(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<FrequencyQuery>,
) -> Result<Json<FrequencyResponse>, ApiError> {
    let recording = lookup(&st, &id)?;
    let data = &recording.data;
    let viewer = &st.cfg.viewer;

    let index = match &q.channel {
        Some(channel) => data
            .analog_index(channel)
            .ok_or_else(|| ApiError::NotFound(format!("analog channel '{channel}'")))?,
        None => frequency::default_reference(data.analog_ids.len(), viewer.frequency_reference_index)
            .ok_or_else(|| ApiError::BadRequest("recording has no analog channels".into()))?,
    };

    let points = frequency::zero_crossing_frequency(data.analog(Units::Secondary, index), data.sample_period)
        .into_iter()
        .map(|p| {
            Ok(FrequencySample {
                time: data.datetime_at(p.time)?,
                offset: p.time,
                hz: p.hz,
            })
        })
        .collect::<Result<Vec<_>, ComtradeError>>()?;

    Ok(Json(FrequencyResponse {
        channel: data.analog_ids[index].clone(),
        y_range: [viewer.frequency_axis_min, viewer.frequency_axis_max],
        points,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WaveformQuery {
    pub channels: Option<String>,
    pub units: Option<Units>,
    pub rms: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct Trace {
    pub channel: String,
    pub unit: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Serialize)]
pub struct WaveformResponse {
    pub units: Units,
    pub units_label: &'static str,
    pub rms: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_window: Option<usize>,
    pub time: Vec<NaiveDateTime>,
    pub traces: Vec<Trace>,
}

/// GET /api/v1/recordings/:id/waveforms
pub async fn get_waveforms(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<WaveformQuery>,
) -> Result<Json<WaveformResponse>, ApiError> {
    let recording = lookup(&st, &id)?;
    let data = &recording.data;
    let viewer = &st.cfg.viewer;
    let units = q.units.unwrap_or_default();
    let show_rms = q.rms.unwrap_or(false);

    let channels = selection(&q.channels).unwrap_or_else(|| {
        data.analog_ids
            .iter()
            .take(viewer.default_analog_channels)
            .cloned()
            .collect()
    });
    let window = show_rms.then(|| rms::cycle_window(data.sample_period, viewer.nominal_frequency_hz));

    let traces = channels
        .into_iter()
        .map(|channel| -> Result<Trace, ApiError> {
            let index = data
                .analog_index(&channel)
                .ok_or_else(|| ApiError::NotFound(format!("analog channel '{channel}'")))?;
            let samples = data.analog(units, index);
            let values = match window {
                Some(window) => rms::rolling_rms(samples, window),
                None => samples.iter().map(|v| (!v.is_nan()).then_some(*v)).collect(),
            };
            Ok(Trace {
                unit: data.analog_units[index].clone(),
                channel,
                values,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(WaveformResponse {
        units,
        units_label: units.label(),
        rms: show_rms,
        rms_window: window,
        time: data.datetimes()?,
        traces,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DigitalQuery {
    pub signals: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DigitalInterval {
    pub signal: String,
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct DigitalResponse {
    pub labels: Vec<String>,
    pub selected: Vec<String>,
    pub events: Vec<DigitalInterval>,
}

/// GET /api/v1/recordings/:id/digitals
pub async fn get_digitals(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<DigitalQuery>,
) -> Result<Json<DigitalResponse>, ApiError> {
    let recording = lookup(&st, &id)?;
    let data = &recording.data;

    let labels = selection(&q.signals).unwrap_or_else(|| {
        digital::default_selection(&data.digital_meta, st.cfg.viewer.default_digital_channels)
    });
    let selected: Vec<String> = labels
        .iter()
        .map(|l| digital::strip_label(l).to_string())
        .collect();

    let mut events = Vec::new();
    for signal in &selected {
        let index = data
            .status_index(signal)
            .ok_or_else(|| ApiError::NotFound(format!("digital channel '{signal}'")))?;
        for e in digital::events(signal, &data.status[index], &data.time) {
            events.push(DigitalInterval {
                start: data.datetime_at(e.start)?,
                finish: data.datetime_at(e.finish)?,
                signal: e.signal,
            });
        }
    }

    Ok(Json(DigitalResponse {
        labels: data.digital_meta.iter().map(|m| m.label.clone()).collect(),
        selected,
        events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parsing() {
        assert_eq!(selection(&None), None);
        assert_eq!(selection(&Some(String::new())), Some(vec![]));
        assert_eq!(
            selection(&Some("IA, IB,,VC".into())),
            Some(vec!["IA".to_string(), "IB".to_string(), "VC".to_string()])
        );
    }
}
