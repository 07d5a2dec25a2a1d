use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for vdfs operations
pub type Result<T> = std::result::Result<T, VdfsError>;

/// Unified error type for all vdfs build operations
#[derive(Debug, Error)]
pub enum VdfsError {
    // Script errors
    #[error("Malformed script: {0}")]
    MalformedScript(String),

    #[error("Invalid mask {rule:?}: {source}")]
    InvalidMask {
        rule: String,
        #[source]
        source: regex::Error,
    },

    // Source tree errors
    #[error("Failed to scan {}: {source}", .path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source file changed during build: {} (expected {expected} bytes, got {actual})", .path.display())]
    SourceChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    // Output errors
    #[error("Failed to {operation} {}: {source}", .path.display())]
    OutputIo {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Archive too large: {0} bytes exceeds the 32-bit offset range")]
    ArchiveTooLarge(u64),

    // Configuration errors
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VdfsError {
    pub(crate) fn source_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VdfsError::SourceIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn output_io(
        path: impl Into<PathBuf>,
        operation: &'static str,
        source: io::Error,
    ) -> Self {
        VdfsError::OutputIo {
            path: path.into(),
            operation,
            source,
        }
    }
}

impl From<toml::de::Error> for VdfsError {
    fn from(err: toml::de::Error) -> Self {
        VdfsError::Config(err.to_string())
    }
}

impl From<time::error::Parse> for VdfsError {
    fn from(err: time::error::Parse) -> Self {
        VdfsError::InvalidTimestamp(err.to_string())
    }
}
