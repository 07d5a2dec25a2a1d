//! Build options and request overrides
//!
//! Options change how a build behaves and can be loaded from TOML:
//!
//! ```toml
//! duplicate_names = "skip-duplicate"
//! time_zone = "local"
//! ```
//!
//! Overrides replace values a script declared (base directory, output
//! path, timestamp) before the build runs.

use crate::engine::BuildRequest;
use crate::error::{Result, VdfsError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Format accepted for timestamp overrides, e.g. "2021-11-28 12:31:40"
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Script value that stands for "the current directory"
const CURRENT_DIR_MARKER: &str = r".\";

/// What to do when a directory holds two files whose names differ only in case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateNamePolicy {
    /// Keep the first file and stop enumerating the directory.
    /// Reproduces archives built by the historical tool.
    #[default]
    StopDirectory,
    /// Keep the first file and continue with the next entry
    SkipDuplicate,
}

/// Time zone the build timestamp is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeZoneMode {
    Local,
    #[default]
    Utc,
}

impl TimeZoneMode {
    /// Offset for this mode; falls back to UTC when the local offset
    /// cannot be determined
    pub fn offset(self) -> UtcOffset {
        match self {
            TimeZoneMode::Utc => UtcOffset::UTC,
            TimeZoneMode::Local => UtcOffset::current_local_offset().unwrap_or_else(|_| {
                tracing::warn!("local time zone offset unavailable, using UTC");
                UtcOffset::UTC
            }),
        }
    }

    /// The current instant in this time zone
    pub fn now(self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset())
    }
}

/// Options controlling a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub duplicate_names: DuplicateNamePolicy,
    pub time_zone: TimeZoneMode,
}

impl BuildOptions {
    /// Parse options from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| VdfsError::source_io(path, e))?;
        Self::from_toml(&text)
    }
}

/// Values that replace what the script declared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    /// Replaces `BaseDir=`
    pub base_dir: Option<String>,
    /// Replaces `VDFName=`
    pub output: Option<String>,
    /// "YYYY-MM-DD HH:MM:SS" in the configured time zone
    pub timestamp: Option<String>,
}

impl BuildOverrides {
    /// Apply overrides and host sanitization to a parsed request
    ///
    /// Without a timestamp override the request is stamped with the
    /// current time in `time_zone`.
    pub fn apply(&self, request: &mut BuildRequest, time_zone: TimeZoneMode) -> Result<()> {
        if let Some(base_dir) = &self.base_dir {
            tracing::info!(base_dir = %base_dir, "overriding base directory");
            request.base_dir = base_dir.clone();
        }

        if let Some(stripped) = request.archive_name.strip_prefix(CURRENT_DIR_MARKER) {
            request.archive_name = stripped.to_string();
        }

        sanitize_for_host(request)?;

        if let Some(output) = &self.output {
            tracing::info!(output = %output, "overriding output path");
            request.archive_name = output.clone();
        }

        request.timestamp = match &self.timestamp {
            Some(text) => {
                let parsed = parse_timestamp(text, time_zone)?;
                tracing::info!(timestamp = %text, ?time_zone, "overriding timestamp");
                parsed
            }
            None => time_zone.now(),
        };

        Ok(())
    }
}

/// Parse a "YYYY-MM-DD HH:MM:SS" timestamp in the given time zone
pub fn parse_timestamp(text: &str, time_zone: TimeZoneMode) -> Result<OffsetDateTime> {
    let parsed = PrimitiveDateTime::parse(text.trim(), TIMESTAMP_FORMAT)?;
    Ok(parsed.assume_offset(time_zone.offset()))
}

/// Windows-style paths from scripts made usable on other hosts
#[cfg(not(windows))]
fn sanitize_for_host(request: &mut BuildRequest) -> Result<()> {
    if request.base_dir == CURRENT_DIR_MARKER {
        let cwd = std::env::current_dir()?;
        request.base_dir = cwd.to_string_lossy().into_owned();
    }
    request.base_dir = request.base_dir.replace('\\', "/");
    request.archive_name = request.archive_name.replace('\\', "/");
    Ok(())
}

#[cfg(windows)]
fn sanitize_for_host(_request: &mut BuildRequest) -> Result<()> {
    Ok(())
}
