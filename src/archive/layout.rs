use crate::archive::format::{EntryFlags, EntryName, EntryRecord, ENTRY_SIZE, HEADER_SIZE};
use crate::error::{Result, VdfsError};
use crate::scan::{DirNode, FileNode};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// SHA-256 digest of a file's full content
pub type ContentHash = [u8; 32];

/// Content hash -> archive offset of the first copy of that content
#[derive(Debug, Default)]
pub struct DedupIndex {
    offsets: HashMap<ContentHash, u32>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &ContentHash) -> Option<u32> {
        self.offsets.get(hash).copied()
    }

    pub fn insert(&mut self, hash: ContentHash, offset: u32) {
        self.offsets.entry(hash).or_insert(offset);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// A unique piece of content to copy into the payload region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSlot {
    pub source: PathBuf,
    /// Absolute byte offset in the archive
    pub offset: u32,
    pub size: u32,
}

/// Result of laying out a scanned tree
#[derive(Debug, Clone, Default)]
pub struct LayoutPlan {
    /// Metadata table in index order
    pub records: Vec<EntryRecord>,
    /// Unique content in payload order
    pub payloads: Vec<PayloadSlot>,
    pub file_count: u32,
    /// Bytes in the payload region
    pub data_size: u32,
    /// Files whose content was already present in the payload
    pub deduplicated: u32,
}

impl LayoutPlan {
    pub fn entry_count(&self) -> u32 {
        self.records.len() as u32
    }

    /// Archive offset of the metadata table
    pub fn table_offset(&self) -> u32 {
        HEADER_SIZE as u32
    }

    /// Archive offset of the payload region
    pub fn payload_offset(&self) -> u64 {
        HEADER_SIZE as u64 + self.records.len() as u64 * ENTRY_SIZE as u64
    }

    /// Final archive size in bytes
    pub fn archive_size(&self) -> u64 {
        self.payload_offset() + self.data_size as u64
    }
}

/// Assigns table indices and payload offsets to a scanned tree
///
/// Rows are laid out depth-first with each level's directories before its
/// files. A level's rows are contiguous; a directory row's `offset` holds
/// the index where its own children begin.
#[derive(Debug, Default)]
pub struct LayoutPlanner {
    records: Vec<EntryRecord>,
    payloads: Vec<PayloadSlot>,
    dedup: DedupIndex,
    next_index: usize,
    cursor: u64,
    file_count: u32,
    deduplicated: u32,
}

impl LayoutPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay out `root`, hashing every file once
    pub fn plan(mut self, root: &DirNode) -> Result<LayoutPlan> {
        let entry_count = root.entry_count();
        let payload_start = HEADER_SIZE as u64 + entry_count as u64 * ENTRY_SIZE as u64;
        check_u32(payload_start)?;

        self.records = vec![EntryRecord::default(); entry_count];
        self.cursor = payload_start;
        self.place_level(root)?;

        let data_size = self.cursor - payload_start;
        tracing::debug!(
            entries = entry_count,
            unique = self.payloads.len(),
            deduplicated = self.deduplicated,
            data_size,
            "layout planned"
        );

        Ok(LayoutPlan {
            records: self.records,
            payloads: self.payloads,
            file_count: self.file_count,
            data_size: check_u32(data_size)?,
            deduplicated: self.deduplicated,
        })
    }

    fn place_level(&mut self, dir: &DirNode) -> Result<()> {
        let mut index = self.next_index;
        self.next_index += dir.dirs.len() + dir.files.len();

        let last_dir = dir.dirs.len().checked_sub(1);
        for (i, child) in dir.dirs.iter().enumerate() {
            let mut flags = EntryFlags::DIRECTORY;
            if dir.files.is_empty() && Some(i) == last_dir {
                flags = flags | EntryFlags::LAST_ENTRY;
            }

            self.records[index] = EntryRecord {
                name: EntryName::new(&child.name),
                offset: check_u32(self.next_index as u64)?,
                size: 0,
                flags,
                attributes: child.attributes,
            };
            self.place_level(child)?;
            index += 1;
        }

        let last_file = dir.files.len().checked_sub(1);
        for (i, file) in dir.files.iter().enumerate() {
            let mut flags = EntryFlags::NONE;
            if Some(i) == last_file {
                flags = flags | EntryFlags::LAST_ENTRY;
            }

            let offset = self.place_content(file)?;
            self.records[index] = EntryRecord {
                name: EntryName::new(&file.name),
                offset,
                size: check_u32(file.size)?,
                flags,
                attributes: file.attributes,
            };
            self.file_count += 1;
            index += 1;
        }

        Ok(())
    }

    /// Return the payload offset for a file, reserving space on first sight
    fn place_content(&mut self, file: &FileNode) -> Result<u32> {
        let hash = hash_file(&file.source, file.size)?;

        if let Some(offset) = self.dedup.get(&hash) {
            tracing::debug!(
                file = %file.relative_path,
                sha256 = %hex::encode(hash),
                offset,
                "duplicate content"
            );
            self.deduplicated += 1;
            return Ok(offset);
        }

        let offset = check_u32(self.cursor)?;
        let size = check_u32(file.size)?;
        check_u32(self.cursor + file.size)?;

        self.dedup.insert(hash, offset);
        self.payloads.push(PayloadSlot {
            source: file.source.clone(),
            offset,
            size,
        });
        self.cursor += file.size;

        Ok(offset)
    }
}

/// Hash a file's content, checking it still has the scanned size
pub fn hash_file(path: &Path, expected_size: u64) -> Result<ContentHash> {
    let mut file = File::open(path).map_err(|e| VdfsError::source_io(path, e))?;
    let mut hasher = Sha256::new();
    let read = io::copy(&mut file, &mut hasher).map_err(|e| VdfsError::source_io(path, e))?;

    if read != expected_size {
        return Err(VdfsError::SourceChanged {
            path: path.to_path_buf(),
            expected: expected_size,
            actual: read,
        });
    }

    Ok(hasher.finalize().into())
}

fn check_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| VdfsError::ArchiveTooLarge(value))
}
