//! vdfs-builder: script-driven builder for VDFS virtual archives
//!
//! A build script names a base directory, an output archive and three glob
//! rule lists (`[FILES]`, `[EXCLUDE]`, `[INCLUDE]`). The builder scans the
//! base directory, keeps the files the rules select, and writes a single
//! VDFS container:
//! - 296-byte header (comment, version tag, counts, packed timestamp)
//! - flat table of 80-byte entry records, one per directory and file
//! - payload region holding each distinct file content exactly once
//!
//! # Example
//!
//! ```no_run
//! use vdfs_builder::{parse_script, BuildOverrides};
//!
//! let mut request = parse_script("Demo.vm")?;
//! let time_zone = request.options.time_zone;
//! BuildOverrides {
//!     output: Some("build/Demo.vdf".to_string()),
//!     ..BuildOverrides::default()
//! }
//! .apply(&mut request, time_zone)?;
//!
//! let summary = request.execute()?;
//! println!("{} entries, {} bytes", summary.entry_count, summary.archive_size);
//! # Ok::<(), vdfs_builder::error::VdfsError>(())
//! ```

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod mask;
pub mod scan;
pub mod script;

pub use archive::{
    ArchiveWriter, Comment, EntryFlags, EntryName, EntryRecord, Header, LayoutPlan,
    LayoutPlanner, Params, ENTRY_SIZE, HEADER_SIZE, VERSION_TAG,
};
pub use config::{BuildOptions, BuildOverrides, DuplicateNamePolicy, TimeZoneMode};
pub use engine::{BuildRequest, BuildSummary};
pub use error::{Result, VdfsError};
pub use mask::{CompiledMask, InclusionRules, MaskSet};
pub use scan::{DirNode, FileNode, ScanTree, TreeScanner};
pub use script::{parse_script, parse_script_bytes, parse_script_str};
