use thiserror::Error;

/// Errors raised while decoding a COMTRADE record
#[derive(Debug, Error)]
pub enum ComtradeError {
    #[error("CFG line {line}: {message}")]
    Cfg { line: usize, message: String },

    #[error("CFG ended early: expected {0}")]
    CfgTruncated(&'static str),

    #[error("DAT row {row}: {message}")]
    Dat { row: usize, message: String },

    #[error("DAT file holds no samples")]
    EmptyData,

    #[error("at least two samples are required, found {0}")]
    TooFewSamples(usize),

    #[error("sample {0} has no timestamp and no sample rate is declared")]
    MissingTime(usize),

    #[error("time offset {0} s falls outside the supported date range")]
    TimeOutOfRange(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ComtradeError {
    pub(crate) fn cfg(line: usize, message: impl Into<String>) -> Self {
        ComtradeError::Cfg {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn dat(row: usize, message: impl Into<String>) -> Self {
        ComtradeError::Dat {
            row,
            message: message.into(),
        }
    }
}
