//! On-disk table format: block handles, the footer, and raw block reads.
//!
//! # On-disk layout
//!
//! ```text
//! [DATA_BLOCK][TRAILER]
//! [DATA_BLOCK][TRAILER]
//! ...
//! [FILTER_BLOCK][TRAILER]        (optional)
//! [METAINDEX_BLOCK][TRAILER]
//! [INDEX_BLOCK][TRAILER]
//! [FOOTER (48 B)]
//! ```
//!
//! - **Block trailer**: `[compression_type (1 B)][masked_crc32c_le (4 B)]`.
//!   The checksum covers the block contents followed by the type byte.
//! - **Block handle**: `[varint64 offset][varint64 size]`, where `size`
//!   excludes the trailer.
//! - **Footer**: `[metaindex handle][index handle][zero padding to 40 B]`
//!   followed by the 8-byte little-endian magic number.
//!
//! Index and metaindex blocks are ordinary blocks whose values are encoded
//! block handles.


use crate::{
    encoding::{self, Decode, Encode, EncodingError},
    error::{Error, Result},
    file::{FileSlice, RandomAccessFile},
    options::ReadOptions,
};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Magic number stored in the last 8 bytes of every table.
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb47_7524_8b80_fb57;

/// Size of the trailer following every block: type byte + checksum.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Fixed size of the encoded [`Footer`].
pub const FOOTER_ENCODED_LENGTH: usize = 2 * BlockHandle::MAX_ENCODED_LENGTH + 8;

const CHECKSUM_MASK_DELTA: u32 = 0xa282_ead8;

// ------------------------------------------------------------------------------------------------
// Compression
// ------------------------------------------------------------------------------------------------

/// Compression applied to a block's contents, recorded in its trailer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// Stored as-is.
    None = 0,
    /// Snappy raw format.
    Snappy = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Snappy),
            other => Err(Error::corruption(format!("bad block type {other}"))),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Checksums
// ------------------------------------------------------------------------------------------------

/// CRC32C (Castagnoli) of a block's contents followed by its compression
/// type byte.
pub fn block_checksum(contents: &[u8], compression: u8) -> u32 {
    crc32c::crc32c_append(crc32c::crc32c(contents), &[compression])
}

/// Masks a checksum before it is stored.
///
/// Computing the CRC of a string that embeds CRCs is error-prone, so the
/// stored form is rotated and offset.
pub fn mask_checksum(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(CHECKSUM_MASK_DELTA)
}

/// Inverse of [`mask_checksum`].
pub fn unmask_checksum(masked: u32) -> u32 {
    masked.wrapping_sub(CHECKSUM_MASK_DELTA).rotate_left(15)
}

// ------------------------------------------------------------------------------------------------
// BlockHandle
// ------------------------------------------------------------------------------------------------

/// Location of a block within the file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    /// Offset of the block in the file.
    pub offset: u64,

    /// Size of the block contents, excluding the trailer.
    pub size: u64,
}

impl BlockHandle {
    /// Maximum encoded length: two varint64s.
    pub const MAX_ENCODED_LENGTH: usize = 2 * encoding::MAX_VARINT64_LEN;

    /// Creates a handle.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

impl Encode for BlockHandle {
    fn encode_to(&self, buf: &mut Vec<u8>) -> std::result::Result<(), EncodingError> {
        encoding::put_varint64(buf, self.offset);
        encoding::put_varint64(buf, self.size);
        Ok(())
    }
}

impl Decode for BlockHandle {
    /// Decodes a handle from the front of `buf`. Trailing bytes are left
    /// unconsumed so index values can carry extra fields.
    fn decode_from(buf: &[u8]) -> std::result::Result<(Self, usize), EncodingError> {
        let (offset, n) = encoding::get_varint64(buf)?;
        let (size, m) = encoding::get_varint64(&buf[n..])?;
        Ok((Self { offset, size }, n + m))
    }
}

/// Decodes the handle at the front of an index or metaindex value.
pub(crate) fn decode_handle(value: &[u8]) -> Result<BlockHandle> {
    BlockHandle::decode_from(value)
        .map(|(handle, _)| handle)
        .map_err(|e| Error::corruption(format!("bad block handle: {e}")))
}

// ------------------------------------------------------------------------------------------------
// Footer
// ------------------------------------------------------------------------------------------------

/// Fixed-length trailer stored at the very end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Handle of the metaindex block.
    pub metaindex_handle: BlockHandle,

    /// Handle of the index block.
    pub index_handle: BlockHandle,
}

impl Encode for Footer {
    fn encode_to(&self, buf: &mut Vec<u8>) -> std::result::Result<(), EncodingError> {
        let start = buf.len();
        self.metaindex_handle.encode_to(buf)?;
        self.index_handle.encode_to(buf)?;
        buf.resize(start + 2 * BlockHandle::MAX_ENCODED_LENGTH, 0);
        TABLE_MAGIC_NUMBER.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for Footer {
    fn decode_from(buf: &[u8]) -> std::result::Result<(Self, usize), EncodingError> {
        if buf.len() < FOOTER_ENCODED_LENGTH {
            return Err(EncodingError::UnexpectedEof {
                needed: FOOTER_ENCODED_LENGTH,
                available: buf.len(),
            });
        }

        let (magic, _) = u64::decode_from(&buf[FOOTER_ENCODED_LENGTH - 8..])?;
        if magic != TABLE_MAGIC_NUMBER {
            return Err(EncodingError::Custom(
                "not an sstable (bad magic number)".into(),
            ));
        }

        let handles = &buf[..FOOTER_ENCODED_LENGTH - 8];
        let (metaindex_handle, n) = BlockHandle::decode_from(handles)?;
        let (index_handle, _) = BlockHandle::decode_from(&handles[n..])?;

        Ok((
            Self {
                metaindex_handle,
                index_handle,
            },
            FOOTER_ENCODED_LENGTH,
        ))
    }
}

// ------------------------------------------------------------------------------------------------
// Block reads
// ------------------------------------------------------------------------------------------------

/// Raw contents of one block, trailer stripped and decompressed.
#[derive(Debug, Clone)]
pub struct BlockContents {
    /// The block's bytes.
    pub data: FileSlice,

    /// Whether the contents may be placed in the block cache. Views into a
    /// memory map are already resident and are not cached.
    pub cachable: bool,

    /// Whether `data` is a buffer allocated for this read rather than a view
    /// into memory owned by the file.
    pub heap_allocated: bool,
}

/// Reads the block located by `handle`, verifying its checksum when
/// `options.verify_checksums` is set.
///
/// # Errors
///
/// - [`Error::Io`] if the file read fails.
/// - [`Error::Corruption`] for a short read, checksum mismatch, unknown
///   compression type, or undecodable compressed payload.
pub fn read_block(
    file: &dyn RandomAccessFile,
    options: &ReadOptions,
    handle: &BlockHandle,
) -> Result<BlockContents> {
    let n = usize::try_from(handle.size)
        .map_err(|_| Error::corruption("block size exceeds addressable range"))?;
    let len = n
        .checked_add(BLOCK_TRAILER_SIZE)
        .ok_or_else(|| Error::corruption("block size exceeds addressable range"))?;

    let mut raw = file.read(handle.offset, len)?;
    if raw.len() != len {
        return Err(Error::corruption("truncated block read"));
    }

    let compression = raw[n];
    if options.verify_checksums {
        let stored = unmask_checksum(encoding::fixed32_at(&raw, n + 1)?);
        let actual = block_checksum(&raw[..n], compression);
        if stored != actual {
            return Err(Error::corruption("block checksum mismatch"));
        }
    }

    match CompressionType::try_from(compression)? {
        CompressionType::None => {
            let heap_allocated = raw.is_heap_allocated();
            raw.truncate(n);
            Ok(BlockContents {
                data: raw,
                cachable: heap_allocated,
                heap_allocated,
            })
        }
        CompressionType::Snappy => {
            let data = snap::raw::Decoder::new()
                .decompress_vec(&raw[..n])
                .map_err(|e| Error::corruption(format!("corrupted compressed block: {e}")))?;
            Ok(BlockContents {
                data: FileSlice::Heap(data),
                cachable: true,
                heap_allocated: true,
            })
        }
    }
}
