//! File Loader: owns one file descriptor per tracked path, incrementally
//! reads appended lines into a fixed-size ring buffer, detects rotation via
//! inode change, and exposes a monotonically increasing line counter.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;

struct Inner {
    file: Option<BufReader<File>>,
    inode: u64,
    /// Fixed-size ring; `ring[total_lines_read % cache_size]` holds the line
    /// most recently written at that slot.
    ring: Vec<String>,
    total_lines_read: u64,
    file_offset: u64,
}

/// A loader for one tracked path. Interned by path in `FileLoaderRegistry`;
/// shared (via `Arc`) by every `FileEntry` across every `EventFilter` that
/// reads the same file.
pub struct FileLoader {
    path: PathBuf,
    cache_size: usize,
    inner: Mutex<Inner>,
}

impl FileLoader {
    /// Creates the file if absent, opens it read-only, captures the inode,
    /// and applies the initial-skip policy: `file_offset := size * p / 100`
    /// for `p` in `[0, 100]`; an out-of-range `skip_percent` is ignored with
    /// a logged warning (starts from offset 0 instead).
    pub fn open(path: impl AsRef<Path>, cache_size: usize, skip_percent: i32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache_size = cache_size.max(1);
        if !path.exists() {
            File::create(&path)?;
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let meta = file.metadata()?;
        let inode = meta.ino();
        let size = meta.len();

        let file_offset = if (0..=100).contains(&skip_percent) {
            size * skip_percent as u64 / 100
        } else {
            tracing::warn!(
                path = %path.display(),
                skip_percent,
                "skip_percent out of [0,100], ignoring"
            );
            0
        };

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(file_offset))?;

        Ok(FileLoader {
            path,
            cache_size,
            inner: Mutex::new(Inner {
                file: Some(reader),
                inode,
                ring: vec![String::new(); cache_size],
                total_lines_read: 0,
                file_offset,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn total_lines_read(&self) -> u64 {
        self.inner.lock().unwrap().total_lines_read
    }

    pub fn file_offset(&self) -> u64 {
        self.inner.lock().unwrap().file_offset
    }

    pub fn inode(&self) -> u64 {
        self.inner.lock().unwrap().inode
    }

    /// Current on-disk size, or 0 if the file cannot be stat'd.
    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Copies out the line at absolute index `idx`, if it is still within the
    /// cached window `[total_lines_read - min(total_lines_read, N), total_lines_read)`.
    pub fn line_at(&self, idx: u64) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let total = inner.total_lines_read;
        let n = self.cache_size as u64;
        let oldest_cached = total.saturating_sub(n);
        if idx < oldest_cached || idx >= total {
            return None;
        }
        Some(inner.ring[(idx % n) as usize].clone())
    }

    /// Runs one Load cycle: reopen-and-reset on rotation, then read up to
    /// `cache_size` newly-appended lines into the ring. Returns the number of
    /// lines read.
    pub fn load(&self) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();

        let meta = std::fs::metadata(&self.path)?;
        let current_inode = meta.ino();
        if current_inode != inner.inode {
            tracing::info!(path = %self.path.display(), "file rotated, resetting cursor");
            let file = OpenOptions::new().read(true).open(&self.path)?;
            inner.inode = current_inode;
            inner.file_offset = 0;
            inner.total_lines_read = 0;
            inner.file = Some(BufReader::new(file));
        }

        let size = meta.len();
        if inner.file_offset >= size {
            return Ok(0);
        }

        let cache_size = self.cache_size as u64;
        let reader = inner.file.as_mut().expect("file always present after rotation check");
        reader.seek(SeekFrom::Start(inner.file_offset))?;

        let mut read_count = 0usize;
        loop {
            if read_count as u64 >= cache_size {
                break;
            }
            let mut buf = Vec::new();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break; // EOF
            }
            let had_newline = buf.last() == Some(&b'\n');
            if had_newline {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            let slot = (inner.total_lines_read % cache_size) as usize;
            inner.ring[slot] = line;
            inner.total_lines_read += 1;
            inner.file_offset += n as u64;
            read_count += 1;
            if !had_newline {
                // EOF without a trailing newline: line is still emitted, but
                // there is nothing more to read this cycle.
                break;
            }
        }

        Ok(read_count)
    }
}

impl std::fmt::Debug for FileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("FileLoader")
            .field("path", &self.path)
            .field("inode", &inner.inode)
            .field("total_lines_read", &inner.total_lines_read)
            .field("file_offset", &inner.file_offset)
            .finish()
    }
}
