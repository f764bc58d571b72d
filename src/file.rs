//! Randomly-readable files.
//!
//! The table reader only needs positioned reads. Two implementations are
//! provided:
//!
//! - [`StdFile`]: `pread`-style reads into a fresh heap buffer.
//! - [`MmapFile`]: zero-copy views into a read-only memory map.
//!
//! Both are safe to share between threads: neither keeps a file cursor.

use std::{
    fmt,
    fs::File,
    io,
    ops::Deref,
    os::unix::fs::FileExt,
    path::Path,
    sync::Arc,
};

use memmap2::Mmap;

// ------------------------------------------------------------------------------------------------
// FileSlice
// ------------------------------------------------------------------------------------------------

/// Bytes returned by a [`RandomAccessFile`] read.
///
/// A slice is either a heap buffer owned outright, or a view into a memory
/// map that stays alive for as long as the view does.
#[derive(Clone)]
pub enum FileSlice {
    /// Freshly allocated buffer.
    Heap(Vec<u8>),

    /// View into a shared memory map.
    Mapped {
        /// The mapping the view points into.
        map: Arc<Mmap>,
        /// First byte of the view.
        start: usize,
        /// Length of the view.
        len: usize,
    },
}

impl FileSlice {
    /// `true` if the bytes live in a buffer owned by this slice.
    pub fn is_heap_allocated(&self) -> bool {
        matches!(self, Self::Heap(_))
    }

    /// Shortens the slice to `len` bytes. No-op if already shorter.
    pub fn truncate(&mut self, new_len: usize) {
        match self {
            Self::Heap(buf) => buf.truncate(new_len),
            Self::Mapped { len, .. } => *len = (*len).min(new_len),
        }
    }
}

impl Deref for FileSlice {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Heap(buf) => buf,
            Self::Mapped { map, start, len } => &map[*start..*start + *len],
        }
    }
}

impl AsRef<[u8]> for FileSlice {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for FileSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSlice")
            .field("heap_allocated", &self.is_heap_allocated())
            .field("len", &self.len())
            .finish()
    }
}

impl From<Vec<u8>> for FileSlice {
    fn from(buf: Vec<u8>) -> Self {
        Self::Heap(buf)
    }
}

// ------------------------------------------------------------------------------------------------
// RandomAccessFile
// ------------------------------------------------------------------------------------------------

/// A file supporting concurrent positioned reads.
pub trait RandomAccessFile: Send + Sync {
    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// Fewer bytes are returned only when the read crosses end-of-file.
    fn read(&self, offset: u64, len: usize) -> io::Result<FileSlice>;
}

// ------------------------------------------------------------------------------------------------
// StdFile
// ------------------------------------------------------------------------------------------------

/// A [`RandomAccessFile`] backed by positioned reads on a regular file.
#[derive(Debug)]
pub struct StdFile {
    file: File,
}

impl StdFile {
    /// Opens `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl From<File> for StdFile {
    fn from(file: File) -> Self {
        Self { file }
    }
}

impl RandomAccessFile for StdFile {
    fn read(&self, offset: u64, len: usize) -> io::Result<FileSlice> {
        // Lengths come from on-disk handles; never allocate past end-of-file.
        let available = self.len()?.saturating_sub(offset);
        let len = len.min(usize::try_from(available).unwrap_or(usize::MAX));
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(FileSlice::Heap(buf))
    }
}

// ------------------------------------------------------------------------------------------------
// MmapFile
// ------------------------------------------------------------------------------------------------

/// A [`RandomAccessFile`] serving reads straight out of a memory map.
pub struct MmapFile {
    map: Arc<Mmap>,
}

impl MmapFile {
    /// Maps `path` read-only.
    ///
    /// # Safety
    ///
    /// Uses `unsafe { Mmap::map(...) }` but is memory-safe as long as the
    /// file is not modified or truncated while mapped, which holds for
    /// immutable table files.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map: Arc::new(map) })
    }

    /// Length of the mapping in bytes.
    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }
}

impl fmt::Debug for MmapFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapFile")
            .field("len", &self.map.len())
            .finish()
    }
}

impl RandomAccessFile for MmapFile {
    fn read(&self, offset: u64, len: usize) -> io::Result<FileSlice> {
        let start = usize::try_from(offset).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space")
        })?;
        match start.checked_add(len) {
            Some(end) if end <= self.map.len() => Ok(FileSlice::Mapped {
                map: Arc::clone(&self.map),
                start,
                len,
            }),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "read of {len} bytes at offset {offset} past end of mapping ({} bytes)",
                    self.map.len()
                ),
            )),
        }
    }
}
