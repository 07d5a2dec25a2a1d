//! Source tree scanning
//!
//! Walks the base directory and builds the owned directory/file tree that
//! becomes the archive's entries. Directories are always descended into,
//! but a directory is only attached to its parent when at least one
//! matched file lives somewhere beneath it.

use crate::archive::ATTRIB_ARCHIVE;
use crate::config::DuplicateNamePolicy;
use crate::error::{Result, VdfsError};
use crate::mask::InclusionRules;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Attributes stored for directory entries
pub const DIRECTORY_ATTRIBUTES: u32 = 0;

/// Attributes stored for file entries
pub const FILE_ATTRIBUTES: u32 = ATTRIB_ARCHIVE;

/// A directory in the scanned tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    pub name: String,
    pub attributes: u32,
    pub dirs: Vec<DirNode>,
    pub files: Vec<FileNode>,
}

impl DirNode {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: DIRECTORY_ATTRIBUTES,
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Number of table rows below this node (this node excluded)
    pub fn entry_count(&self) -> usize {
        self.dirs.len()
            + self.files.len()
            + self.dirs.iter().map(DirNode::entry_count).sum::<usize>()
    }

    /// Number of files below this node
    pub fn file_count(&self) -> usize {
        self.files.len() + self.dirs.iter().map(DirNode::file_count).sum::<usize>()
    }

    /// Sum of file sizes below this node, duplicates counted every time
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum::<u64>()
            + self.dirs.iter().map(DirNode::total_file_size).sum::<u64>()
    }
}

/// A file in the scanned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    /// Forward-slash path relative to the base directory, used for rule matching
    pub relative_path: String,
    /// Path the content is read from, byte-exact even for non-UTF-8 names
    pub source: PathBuf,
    pub size: u64,
    pub attributes: u32,
}

/// The scanned tree; the root is implicit and never becomes a table row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTree {
    pub root: DirNode,
    pub file_count: usize,
}

/// Directory scanner applying the inclusion rules
pub struct TreeScanner<'a> {
    rules: &'a InclusionRules,
    duplicate_names: DuplicateNamePolicy,
}

impl<'a> TreeScanner<'a> {
    pub fn new(rules: &'a InclusionRules, duplicate_names: DuplicateNamePolicy) -> Self {
        Self {
            rules,
            duplicate_names,
        }
    }

    /// Scan `base_dir` recursively
    pub fn scan<P: AsRef<Path>>(&self, base_dir: P) -> Result<ScanTree> {
        let base_dir = base_dir.as_ref();
        let mut root = DirNode::default();
        let file_count = self.scan_dir(base_dir, "", &mut root)?;

        tracing::debug!(
            base_dir = %base_dir.display(),
            files = file_count,
            entries = root.entry_count(),
            "scan complete"
        );

        Ok(ScanTree { root, file_count })
    }

    /// Fill `node` from `dir`, returning how many files were added beneath it
    fn scan_dir(&self, dir: &Path, relative: &str, node: &mut DirNode) -> Result<usize> {
        let mut added = 0;
        let mut seen_names: HashSet<String> = HashSet::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|source| VdfsError::ScanFailed {
                path: dir.to_path_buf(),
                source,
            })?;

            let name = entry.file_name().to_string_lossy().into_owned();
            let relative_path = if relative.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", relative, name)
            };

            if entry.file_type().is_dir() {
                let mut child = DirNode::new(name);
                let count = self.scan_dir(entry.path(), &relative_path, &mut child)?;
                if count == 0 {
                    tracing::debug!(dir = %relative_path, "pruning directory without matches");
                    continue;
                }
                node.dirs.push(child);
                added += count;
                continue;
            }

            let folded = name.to_lowercase();
            if seen_names.contains(&folded) {
                match self.duplicate_names {
                    DuplicateNamePolicy::StopDirectory => {
                        tracing::warn!(
                            file = %relative_path,
                            "duplicate file name, skipping the rest of the directory"
                        );
                        break;
                    }
                    DuplicateNamePolicy::SkipDuplicate => {
                        tracing::debug!(file = %relative_path, "skipping duplicate file name");
                        continue;
                    }
                }
            }

            if !self.rules.is_included(&relative_path) {
                continue;
            }

            // Symlinks are resolved so the recorded size matches the bytes copied
            let metadata = std::fs::metadata(entry.path())
                .map_err(|e| VdfsError::source_io(entry.path(), e))?;
            if metadata.is_dir() {
                tracing::debug!(path = %relative_path, "skipping symlinked directory");
                continue;
            }

            seen_names.insert(folded);
            node.files.push(FileNode {
                name,
                relative_path,
                source: entry.into_path(),
                size: metadata.len(),
                attributes: FILE_ATTRIBUTES,
            });
            added += 1;
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scan(root: &Path, files: &[&str], exclude: &[&str], include: &[&str]) -> ScanTree {
        let rules = InclusionRules::compile(files, exclude, include).unwrap();
        TreeScanner::new(&rules, DuplicateNamePolicy::StopDirectory)
            .scan(root)
            .unwrap()
    }

    fn file_names(node: &DirNode) -> Vec<&str> {
        node.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_scan_builds_sorted_tree() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.txt", b"bb");
        write(dir.path(), "a.txt", b"a");
        write(dir.path(), "sub/c.txt", b"ccc");

        let tree = scan(dir.path(), &["* -r"], &[], &[]);

        assert_eq!(tree.file_count, 3);
        assert_eq!(file_names(&tree.root), vec!["a.txt", "b.txt"]);
        assert_eq!(tree.root.dirs.len(), 1);
        assert_eq!(tree.root.dirs[0].name, "sub");
        assert_eq!(tree.root.dirs[0].files[0].relative_path, "sub/c.txt");
        assert_eq!(tree.root.dirs[0].files[0].source, dir.path().join("sub").join("c.txt"));
        assert_eq!(tree.root.dirs[0].files[0].size, 3);
        assert_eq!(tree.root.dirs[0].files[0].attributes, FILE_ATTRIBUTES);
        assert_eq!(tree.root.entry_count(), 4);
        assert_eq!(tree.root.total_file_size(), 6);
    }

    #[test]
    fn test_empty_subtrees_pruned() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep/a.txt", b"a");
        write(dir.path(), "drop/deep/b.bin", b"b");
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let tree = scan(dir.path(), &["*.txt -r"], &[], &[]);

        assert_eq!(tree.file_count, 1);
        let names: Vec<_> = tree.root.dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["keep"]);
    }

    #[test]
    fn test_exclude_and_include_stages() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", b"a");
        write(dir.path(), "b.tmp", b"b");
        write(dir.path(), "keep.tmp", b"k");

        let tree = scan(dir.path(), &["*"], &["*.tmp"], &[]);
        assert_eq!(file_names(&tree.root), vec!["a.txt"]);

        let tree = scan(dir.path(), &["*"], &["*.tmp"], &["keep.tmp"]);
        assert_eq!(file_names(&tree.root), vec!["a.txt", "keep.tmp"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_duplicate_name_stops_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.txt", b"upper");
        write(dir.path(), "B.txt", b"b");
        write(dir.path(), "a.txt", b"lower");
        write(dir.path(), "c.txt", b"c");

        let tree = scan(dir.path(), &["* -r"], &[], &[]);
        assert_eq!(file_names(&tree.root), vec!["A.txt", "B.txt"]);
        assert_eq!(tree.file_count, 2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_duplicate_name_skip_policy() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.txt", b"upper");
        write(dir.path(), "B.txt", b"b");
        write(dir.path(), "a.txt", b"lower");
        write(dir.path(), "c.txt", b"c");

        let rules = InclusionRules::compile(&["* -r"], &[], &[]).unwrap();
        let tree = TreeScanner::new(&rules, DuplicateNamePolicy::SkipDuplicate)
            .scan(dir.path())
            .unwrap();

        assert_eq!(file_names(&tree.root), vec!["A.txt", "B.txt", "c.txt"]);
        assert_eq!(tree.file_count, 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_keeps_source_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let raw = dir.path().join(OsStr::from_bytes(b"tex\xff.tga"));
        fs::write(&raw, b"texture").unwrap();

        let tree = scan(dir.path(), &["*.tga -r"], &[], &[]);
        let file = &tree.root.files[0];
        assert_eq!(file.name, "tex\u{FFFD}.tga");
        assert_eq!(file.source, raw);
        assert_eq!(file.size, 7);
    }

    #[test]
    fn test_same_name_in_other_directories_kept() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x/data.bin", b"1");
        write(dir.path(), "y/data.bin", b"2");

        let tree = scan(dir.path(), &["* -r"], &[], &[]);
        assert_eq!(tree.file_count, 2);
        assert_eq!(tree.root.dirs.len(), 2);
    }

    #[test]
    fn test_missing_base_dir_fails() {
        let dir = TempDir::new().unwrap();
        let rules = InclusionRules::compile(&["* -r"], &[], &[]).unwrap();
        let result = TreeScanner::new(&rules, DuplicateNamePolicy::StopDirectory)
            .scan(dir.path().join("missing"));

        assert!(matches!(result, Err(VdfsError::ScanFailed { .. })));
    }
}
