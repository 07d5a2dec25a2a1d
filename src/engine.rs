//! Build orchestration
//!
//! [`BuildRequest::execute`] runs the whole pipeline: compile the rule
//! lists, scan the base directory, lay out the metadata table with
//! content deduplication, then encode the archive.

use crate::archive::{
    pack_dos_datetime, ArchiveWriter, Comment, Header, LayoutPlanner, Params, ENTRY_SIZE,
    HEADER_SIZE,
};
use crate::config::BuildOptions;
use crate::error::{Result, VdfsError};
use crate::mask::InclusionRules;
use crate::scan::TreeScanner;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Everything needed to build one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Archive comment; only the first 256 bytes are stored
    pub comment: String,
    pub base_dir: String,
    /// Destination path of the archive
    pub archive_name: String,
    pub timestamp: OffsetDateTime,
    pub file_rules: Vec<String>,
    pub exclude_rules: Vec<String>,
    pub include_rules: Vec<String>,
    pub options: BuildOptions,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            comment: String::new(),
            base_dir: String::new(),
            archive_name: String::new(),
            timestamp: OffsetDateTime::now_utc(),
            file_rules: Vec::new(),
            exclude_rules: Vec::new(),
            include_rules: Vec::new(),
            options: BuildOptions::default(),
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub entry_count: u32,
    pub file_count: u32,
    pub data_size: u32,
    /// Distinct file contents stored in the payload
    pub unique_payloads: usize,
    /// Files that reused content already in the payload
    pub deduplicated_files: u32,
    pub archive_size: u64,
    /// Packed DOS date-time stored in the header
    pub timestamp: u32,
}

impl BuildSummary {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VdfsError::Config(format!("Failed to serialize summary: {}", e)))
    }
}

impl BuildRequest {
    /// Parse script text
    pub fn parse(text: &str) -> Result<Self> {
        crate::script::parse_script_str(text)
    }

    /// Directory the rules are evaluated against
    pub fn base_path(&self) -> &Path {
        if self.base_dir.is_empty() {
            Path::new(".")
        } else {
            Path::new(&self.base_dir)
        }
    }

    /// Build the archive
    pub fn execute(&self) -> Result<BuildSummary> {
        if self.archive_name.is_empty() {
            return Err(VdfsError::Config(
                "no output archive named (VDFName= or an output override)".to_string(),
            ));
        }

        let base_dir = self.base_path();
        let output = PathBuf::from(&self.archive_name);

        tracing::info!(
            base_dir = %base_dir.display(),
            output = %output.display(),
            file_rules = self.file_rules.len(),
            exclude_rules = self.exclude_rules.len(),
            include_rules = self.include_rules.len(),
            "building archive"
        );

        let rules =
            InclusionRules::compile(&self.file_rules, &self.exclude_rules, &self.include_rules)?;

        // Opened before the scan: an archive inside the base directory is
        // seen as an empty file rather than a stale previous build
        let writer = ArchiveWriter::create(&output)?;

        let tree = TreeScanner::new(&rules, self.options.duplicate_names).scan(base_dir)?;
        let plan = LayoutPlanner::new().plan(&tree.root)?;

        let timestamp = pack_dos_datetime(self.timestamp);
        let header = Header::new(
            Comment::new(&self.comment),
            Params {
                entry_count: plan.entry_count(),
                file_count: plan.file_count,
                timestamp,
                data_size: plan.data_size,
                table_offset: HEADER_SIZE as u32,
                entry_size: ENTRY_SIZE as u32,
            },
        );

        let archive_size = writer.write(&header, &plan)?;

        let summary = BuildSummary {
            output,
            entry_count: plan.entry_count(),
            file_count: plan.file_count,
            data_size: plan.data_size,
            unique_payloads: plan.payloads.len(),
            deduplicated_files: plan.deduplicated,
            archive_size,
            timestamp,
        };

        tracing::info!(
            entries = summary.entry_count,
            files = summary.file_count,
            data_size = summary.data_size,
            deduplicated = summary.deduplicated_files,
            archive_size = summary.archive_size,
            "archive complete"
        );

        Ok(summary)
    }
}
