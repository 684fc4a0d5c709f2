//! COMTRADE Viewer: decode IEEE C37.111 disturbance records and serve
//! frequency, waveform and digital views over HTTP.

pub mod analysis;
pub mod api;
pub mod bundle;
pub mod comtrade;
pub mod config;
pub mod state;
pub mod store;
pub mod telemetry;
