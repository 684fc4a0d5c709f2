//! Derived views over a decoded record: unit scaling, frequency tracking,
//! rolling RMS and digital event extraction.

pub mod digital;
pub mod frequency;
pub mod process;
pub mod rms;

pub use digital::{DigitalEvent, DigitalMeta};
pub use frequency::FrequencyPoint;
pub use process::{process, ProcessedRecording, Units};
