use crate::archive::format::{Header, ENTRY_SIZE, HEADER_SIZE};
use crate::archive::layout::{LayoutPlan, PayloadSlot};
use crate::error::{Result, VdfsError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Buffer size for payload copies
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Archive writer for creating .vdf files
///
/// The destination is opened once and stays open until `write` returns,
/// on success or failure.
pub struct ArchiveWriter {
    file: File,
    path: PathBuf,
}

impl ArchiveWriter {
    /// Create (or truncate) the destination archive
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| VdfsError::output_io(&path, "create", e))?;

        Ok(Self { file, path })
    }

    /// Write header, payload and metadata table for a finished layout
    ///
    /// The file is sized up front; each unique payload is then copied to
    /// its planned offset and the table is written last. Returns the final
    /// archive size.
    pub fn write(mut self, header: &Header, plan: &LayoutPlan) -> Result<u64> {
        debug_assert_eq!(header.params.entry_count, plan.entry_count());
        debug_assert_eq!(header.params.table_offset as usize, HEADER_SIZE);
        debug_assert_eq!(header.params.entry_size as usize, ENTRY_SIZE);

        let archive_size = plan.archive_size();

        let mut header_bytes = Vec::with_capacity(HEADER_SIZE);
        header.write_to(&mut header_bytes)?;
        self.file
            .write_all(&header_bytes)
            .map_err(|e| VdfsError::output_io(&self.path, "write header to", e))?;

        self.file
            .set_len(archive_size)
            .map_err(|e| VdfsError::output_io(&self.path, "truncate", e))?;

        for slot in &plan.payloads {
            self.copy_payload(slot)?;
        }

        self.write_table(plan)?;

        self.file
            .flush()
            .map_err(|e| VdfsError::output_io(&self.path, "flush", e))?;

        tracing::debug!(
            path = %self.path.display(),
            size = archive_size,
            payloads = plan.payloads.len(),
            "archive written"
        );

        Ok(archive_size)
    }

    /// Copy one source file to its payload offset
    fn copy_payload(&mut self, slot: &PayloadSlot) -> Result<()> {
        let source =
            File::open(&slot.source).map_err(|e| VdfsError::source_io(&slot.source, e))?;

        self.file
            .seek(SeekFrom::Start(slot.offset as u64))
            .map_err(|e| VdfsError::output_io(&self.path, "seek", e))?;

        let expected = slot.size as u64;
        let copied = copy_content(
            source.take(expected),
            &mut self.file,
            &slot.source,
            &self.path,
        )?;

        if copied != expected {
            return Err(VdfsError::SourceChanged {
                path: slot.source.clone(),
                expected,
                actual: copied,
            });
        }

        Ok(())
    }

    fn write_table(&mut self, plan: &LayoutPlan) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(plan.table_offset() as u64))
            .map_err(|e| VdfsError::output_io(&self.path, "seek", e))?;

        let mut writer = BufWriter::new(&mut self.file);
        for record in &plan.records {
            record.write_to(&mut writer).map_err(|e| match e {
                VdfsError::Io(source) => {
                    VdfsError::output_io(&self.path, "write table entry to", source)
                }
                other => other,
            })?;
        }
        writer
            .flush()
            .map_err(|e| VdfsError::output_io(&self.path, "write table to", e))?;

        Ok(())
    }
}

/// Copy `reader` into `writer`, attributing read failures to `source` and
/// write failures to `dest`. Returns the number of bytes copied.
fn copy_content<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    source: &Path,
    dest: &Path,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(VdfsError::source_io(source, e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| VdfsError::output_io(dest, "write payload to", e))?;
        copied += n as u64;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::format::{Comment, EntryFlags, EntryName, EntryRecord, Params};
    use tempfile::TempDir;

    #[test]
    fn test_write_places_payload_and_table() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("data.bin");
        std::fs::write(&source, b"payload").unwrap();

        let payload_start = (HEADER_SIZE + ENTRY_SIZE) as u32;
        let plan = LayoutPlan {
            records: vec![EntryRecord {
                name: EntryName::new("data.bin"),
                offset: payload_start,
                size: 7,
                flags: EntryFlags::LAST_ENTRY,
                attributes: 0x20,
            }],
            payloads: vec![PayloadSlot {
                source,
                offset: payload_start,
                size: 7,
            }],
            file_count: 1,
            data_size: 7,
            deduplicated: 0,
        };
        let header = Header::new(
            Comment::new("test"),
            Params {
                entry_count: 1,
                file_count: 1,
                timestamp: 0,
                data_size: 7,
                table_offset: HEADER_SIZE as u32,
                entry_size: ENTRY_SIZE as u32,
            },
        );

        let out = tmp.path().join("out.vdf");
        let size = ArchiveWriter::create(&out).unwrap().write(&header, &plan).unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(size, bytes.len() as u64);
        assert_eq!(bytes.len(), HEADER_SIZE + ENTRY_SIZE + 7);
        assert_eq!(&bytes[..4], b"test");
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 8], b"DATA.BIN");
        assert_eq!(&bytes[payload_start as usize..], b"payload");
    }

    #[test]
    fn test_missing_source_reports_path() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.bin");
        let plan = LayoutPlan {
            records: vec![EntryRecord::default()],
            payloads: vec![PayloadSlot {
                source: missing.clone(),
                offset: (HEADER_SIZE + ENTRY_SIZE) as u32,
                size: 4,
            }],
            file_count: 1,
            data_size: 4,
            deduplicated: 0,
        };
        let header = Header::new(
            Comment::default(),
            Params {
                entry_count: 1,
                table_offset: HEADER_SIZE as u32,
                entry_size: ENTRY_SIZE as u32,
                ..Params::default()
            },
        );

        let result = ArchiveWriter::create(tmp.path().join("out.vdf"))
            .unwrap()
            .write(&header, &plan);
        match result {
            Err(VdfsError::SourceIo { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected SourceIo, got {:?}", other),
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSource;

    impl Read for BrokenSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "input/output error"))
        }
    }

    #[test]
    fn test_payload_write_failure_names_archive() {
        let result = copy_content(
            &b"payload"[..],
            FullDisk,
            Path::new("src/data.bin"),
            Path::new("out.vdf"),
        );
        match result {
            Err(VdfsError::OutputIo {
                path, operation, ..
            }) => {
                assert_eq!(path, Path::new("out.vdf"));
                assert_eq!(operation, "write payload to");
            }
            other => panic!("expected OutputIo, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_read_failure_names_source() {
        let mut sink = Vec::new();
        let result = copy_content(
            BrokenSource,
            &mut sink,
            Path::new("src/data.bin"),
            Path::new("out.vdf"),
        );
        match result {
            Err(VdfsError::SourceIo { path, .. }) => assert_eq!(path, Path::new("src/data.bin")),
            other => panic!("expected SourceIo, got {:?}", other),
        }
    }

    #[test]
    fn test_copy_content_counts_bytes() {
        let data = vec![7u8; COPY_BUFFER_SIZE + 3];
        let mut sink = Vec::new();
        let copied = copy_content(
            &data[..],
            &mut sink,
            Path::new("src/big.bin"),
            Path::new("out.vdf"),
        )
        .unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let result = ArchiveWriter::create(tmp.path().join("no/such/dir/out.vdf"));
        assert!(matches!(
            result,
            Err(VdfsError::OutputIo {
                operation: "create",
                ..
            })
        ));
    }
}
