//! # IEEE C37.111 (COMTRADE) decoding
//!
//! A disturbance record is split over two files:
//!
//! - `.CFG`: station, channel definitions, sample rates, timestamps and the
//!   encoding of the data file
//! - `.DAT`: the samples, either as comma separated text or as fixed-size
//!   little-endian binary records
//!
//! Revisions 1991, 1999 and 2013 are accepted. [`Record`] ties both files
//! together and exposes scaled analog values, status bits and a time axis.

pub mod cfg;
pub mod dat;
pub mod error;
pub mod record;

pub use cfg::{AnalogChannel, ComtradeConfig, DataFormat, Revision, SampleRate, StatusChannel};
pub use dat::DataTable;
pub use error::ComtradeError;
pub use record::Record;
