#![allow(dead_code)]
//! Synthetic disturbance record shared by the integration tests.
//!
//! Five analog channels carry a 50 Hz sine sampled at 1 kHz for 200 samples.
//! TRIP is high for samples 50..120, CB OPEN from the first sample to 80 and
//! SPARE never changes.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use byteorder::{LittleEndian, WriteBytesExt};
use comtrade_viewer::{api, config::Config, state::AppState};
use std::f64::consts::PI;
use tower::ServiceExt;

pub const SAMPLES: usize = 200;
pub const RATE: f64 = 1000.0;
pub const STATION: &str = "FEEDER 7";
pub const ANALOGS: [&str; 5] = ["IA", "IB", "IC", "IN", "VA"];
pub const DIGITALS: [&str; 3] = ["TRIP", "CB OPEN", "SPARE"];
const MULTIPLIER: f64 = 0.01;
const AMPLITUDES: [f64; 5] = [10.0, 10.0, 10.0, 1.0, 63.5];

pub fn cfg_text(format: &str) -> String {
    let mut text = format!("{STATION},DFR-1,1999\n8,5A,3D\n");
    for (i, id) in ANALOGS.iter().enumerate() {
        let (unit, primary, secondary) = if *id == "VA" {
            ("V", 132000.0, 110.0)
        } else {
            ("A", 600.0, 5.0)
        };
        text.push_str(&format!(
            "{},{id},{},,{unit},{MULTIPLIER},0,0,-32767,32767,{primary},{secondary},S\n",
            i + 1,
            ["A", "B", "C", "N", "A"][i],
        ));
    }
    for (i, id) in DIGITALS.iter().enumerate() {
        text.push_str(&format!("{},{id},,,0\n", i + 1));
    }
    text.push_str(&format!(
        "50\n1\n{RATE},{SAMPLES}\n13/02/2024,10:15:30.123456\n13/02/2024,10:15:30.173456\n{format}\n1\n"
    ));
    text
}

/// Raw integer sample of analog channel `ch` at sample `i`
pub fn raw_analog(ch: usize, i: usize) -> i16 {
    let phase = 0.3 - ch as f64 * 2.0 * PI / 3.0;
    let value = AMPLITUDES[ch] * (2.0 * PI * 50.0 * i as f64 / RATE + phase).sin();
    (value / MULTIPLIER).round() as i16
}

pub fn digital(ch: usize, i: usize) -> u8 {
    match ch {
        0 => u8::from((50..120).contains(&i)),
        1 => u8::from(i < 80),
        _ => 0,
    }
}

pub fn ascii_dat() -> Vec<u8> {
    let mut text = String::new();
    for i in 0..SAMPLES {
        let analog: Vec<String> = (0..ANALOGS.len()).map(|c| raw_analog(c, i).to_string()).collect();
        let status: Vec<String> = (0..DIGITALS.len()).map(|c| digital(c, i).to_string()).collect();
        text.push_str(&format!(
            "{},{},{},{}\n",
            i + 1,
            i * 1000,
            analog.join(","),
            status.join(",")
        ));
    }
    text.into_bytes()
}

pub fn binary_dat() -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..SAMPLES {
        buf.write_u32::<LittleEndian>(i as u32 + 1).unwrap();
        buf.write_u32::<LittleEndian>(i as u32 * 1000).unwrap();
        for c in 0..ANALOGS.len() {
            buf.write_i16::<LittleEndian>(raw_analog(c, i)).unwrap();
        }
        let word = (0..DIGITALS.len()).fold(0u16, |w, c| w | (u16::from(digital(c, i)) << c));
        buf.write_u16::<LittleEndian>(word).unwrap();
    }
    buf
}

pub fn test_config(xsrf: bool) -> Config {
    let mut cfg = Config::default();
    cfg.server.enable_xsrf_protection = xsrf;
    cfg
}

pub fn app(cfg: Config) -> Router {
    api::router(AppState::new(cfg.clone()), &cfg)
}

pub const BOUNDARY: &str = "comtrade-test-boundary";

pub fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(files: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/recordings")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

/// Upload the ASCII fixture and return the recording id
pub async fn upload_ascii(app: &Router) -> String {
    let cfg = cfg_text("ASCII");
    let dat = ascii_dat();
    let (status, json) = send_json(
        app,
        upload_request(&[("fault.cfg", cfg.as_bytes()), ("fault.dat", dat.as_slice())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["id"].as_str().unwrap().to_string()
}
