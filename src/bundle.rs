//! Uploaded COMTRADE file sets.

use std::collections::HashMap;
use thiserror::Error;

/// Extensions accepted in an upload
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["cfg", "dat", "hdr", "inf"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("Missing .CFG or .DAT file in upload.")]
    MissingFiles,

    #[error("unsupported file '{0}': expected .cfg, .dat, .hdr or .inf")]
    UnsupportedFile(String),

    #[error("CFG file is empty")]
    EmptyConfig,
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased text after the last dot
    pub fn extension(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

/// A CFG/DAT pair with optional header and information files
#[derive(Debug, Clone)]
pub struct Bundle {
    pub cfg_text: String,
    pub dat: Vec<u8>,
    pub header: Option<String>,
    pub info: Option<String>,
    pub station: String,
}

impl Bundle {
    /// Group uploaded files by extension; a later file replaces an earlier
    /// one with the same extension.
    pub fn from_files(files: Vec<UploadedFile>) -> Result<Self, BundleError> {
        let mut by_ext: HashMap<String, Vec<u8>> = HashMap::new();
        for file in files {
            let ext = file.extension();
            if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
                return Err(BundleError::UnsupportedFile(file.name));
            }
            by_ext.insert(ext, file.bytes);
        }

        let (Some(cfg), Some(dat)) = (by_ext.remove("cfg"), by_ext.remove("dat")) else {
            return Err(BundleError::MissingFiles);
        };
        let text = |bytes: Vec<u8>| decode_text(&bytes);

        let cfg_text = text(cfg);
        let station = station_name(&cfg_text).ok_or(BundleError::EmptyConfig)?;
        Ok(Self {
            station,
            cfg_text,
            dat,
            header: by_ext.remove("hdr").map(text).filter(|s| !s.is_empty()),
            info: by_ext.remove("inf").map(text).filter(|s| !s.is_empty()),
        })
    }
}

/// UTF-8 text with invalid byte sequences dropped
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// First comma-separated field of the first CFG line
pub fn station_name(cfg_text: &str) -> Option<String> {
    let first = cfg_text.trim_start_matches('\u{feff}').lines().next()?;
    Some(first.split(',').next().unwrap_or_default().trim().to_string())
}
