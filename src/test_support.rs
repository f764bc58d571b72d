//! Shared fixtures for unit tests: an in-memory file with read counting
//! and failure injection, and a raw block writer.

use std::{
    io,
    ops::Range,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

use crate::{
    encoding::Encode,
    file::{FileSlice, RandomAccessFile},
    format::{BlockHandle, CompressionType, block_checksum, mask_checksum},
};

pub(crate) fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::TRACE)
        .try_init();
}

// ------------------------------------------------------------------------------------------------
// MemFile
// ------------------------------------------------------------------------------------------------

/// In-memory [`RandomAccessFile`] that counts reads and can be told to fail
/// reads overlapping a byte range.
pub(crate) struct MemFile {
    data: Vec<u8>,
    reads: AtomicUsize,
    failing: Mutex<Option<Range<u64>>>,
}

impl MemFile {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: AtomicUsize::new(0),
            failing: Mutex::new(None),
        }
    }

    pub(crate) fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Number of reads served so far (failed reads included).
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Every subsequent read overlapping `range` fails with an I/O error.
    pub(crate) fn fail_reads_in(&self, range: Range<u64>) {
        *self.failing.lock().unwrap() = Some(range);
    }

    pub(crate) fn clear_failures(&self) {
        *self.failing.lock().unwrap() = None;
    }
}

impl RandomAccessFile for MemFile {
    fn read(&self, offset: u64, len: usize) -> io::Result<FileSlice> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let end = offset + len as u64;
        if let Some(range) = self.failing.lock().unwrap().as_ref() {
            if offset < range.end && range.start < end {
                return Err(io::Error::other("injected read failure"));
            }
        }

        let start = (offset as usize).min(self.data.len());
        let stop = (end as usize).min(self.data.len());
        Ok(FileSlice::Heap(self.data[start..stop].to_vec()))
    }
}

// ------------------------------------------------------------------------------------------------
// Raw block writer
// ------------------------------------------------------------------------------------------------

/// Appends `contents` plus a valid trailer to `out` and returns its handle.
///
/// With [`CompressionType::Snappy`] the contents are compressed first.
pub(crate) fn write_block(
    out: &mut Vec<u8>,
    contents: &[u8],
    compression: CompressionType,
) -> BlockHandle {
    let payload = match compression {
        CompressionType::None => contents.to_vec(),
        CompressionType::Snappy => snap::raw::Encoder::new()
            .compress_vec(contents)
            .unwrap(),
    };
    let handle = BlockHandle::new(out.len() as u64, payload.len() as u64);
    let ty = compression as u8;
    let crc = mask_checksum(block_checksum(&payload, ty));
    out.extend_from_slice(&payload);
    out.push(ty);
    crc.encode_to(out).unwrap();
    handle
}
