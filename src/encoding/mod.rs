//! Deterministic, byte-stable integer encoding for the table format.
//!
//! This module provides the [`Encode`] and [`Decode`] traits used by every
//! on-disk structure the reader consumes (block handles, the footer, block
//! restart arrays, filter offsets), plus the LEB128 varint helpers the
//! block and handle formats are built on.
//!
//! # Wire format
//!
//! | Rust type            | Encoding                                   |
//! |----------------------|--------------------------------------------|
//! | `u32`                | 4 bytes, little-endian                     |
//! | `u64`                | 8 bytes, little-endian                     |
//! | varint32 / varint64  | LEB128, 7 bits per byte, MSB = continue    |
//!
//! A varint32 occupies at most [`MAX_VARINT32_LEN`] bytes and a varint64
//! at most [`MAX_VARINT64_LEN`] bytes. Longer sequences, or sequences whose
//! payload does not fit the target width, are rejected.
//!
//! # Zero-panic guarantee
//!
//! No function in this module uses `unwrap()`, `expect()`, or any other
//! panicking path.  All errors are propagated via [`EncodingError`].


use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Limits
// ------------------------------------------------------------------------------------------------

/// Maximum encoded length of a varint32.
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a varint64.
pub const MAX_VARINT64_LEN: usize = 10;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors produced during encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A varint ran past its maximum length or overflowed its target width.
    #[error("malformed varint: {0}")]
    MalformedVarint(&'static str),

    /// Application-level decode error.
    #[error("{0}")]
    Custom(String),
}

// ------------------------------------------------------------------------------------------------
// Core traits
// ------------------------------------------------------------------------------------------------

/// Serialize `self` into a byte buffer.
///
/// Implementations **must** produce deterministic output: the same
/// logical value always yields the exact same byte sequence.
pub trait Encode {
    /// Append the encoded representation of `self` to `buf`.
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError>;
}

/// Deserialize a value from a byte slice.
///
/// Returns `(value, bytes_consumed)` on success so that callers can
/// advance a cursor through a buffer containing multiple encoded items.
pub trait Decode: Sized {
    /// Decode one value starting at `buf[0]`.
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError>;
}

// ------------------------------------------------------------------------------------------------
// Convenience functions
// ------------------------------------------------------------------------------------------------

/// Encode a value into a freshly-allocated `Vec<u8>`.
pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    value.encode_to(&mut buf)?;
    Ok(buf)
}

/// Decode a value from the beginning of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_from_slice<T: Decode>(buf: &[u8]) -> Result<(T, usize), EncodingError> {
    T::decode_from(buf)
}

// ------------------------------------------------------------------------------------------------
// Internal helpers
// ------------------------------------------------------------------------------------------------

/// Verify that `buf` has at least `needed` bytes, returning
/// [`EncodingError::UnexpectedEof`] if not.
#[inline]
fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Fixed-width integers
// ------------------------------------------------------------------------------------------------

impl Encode for u32 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for u32 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&buf[..4]);
        Ok((u32::from_le_bytes(bytes), 4))
    }
}

impl Encode for u64 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for u64 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        Ok((u64::from_le_bytes(bytes), 8))
    }
}

/// Reads a little-endian `u32` at `buf[pos..pos + 4]`.
#[inline]
pub fn fixed32_at(buf: &[u8], pos: usize) -> Result<u32, EncodingError> {
    let tail = buf.get(pos..).ok_or(EncodingError::UnexpectedEof {
        needed: pos + 4,
        available: buf.len(),
    })?;
    u32::decode_from(tail).map(|(v, _)| v)
}

// ------------------------------------------------------------------------------------------------
// Varints
// ------------------------------------------------------------------------------------------------

/// Appends `value` as a LEB128 varint.
pub fn put_varint64(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Appends `value` as a LEB128 varint.
#[inline]
pub fn put_varint32(buf: &mut Vec<u8>, value: u32) {
    put_varint64(buf, u64::from(value));
}

/// Number of bytes `value` occupies once varint-encoded.
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decodes a varint64 from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn get_varint64(buf: &[u8]) -> Result<(u64, usize), EncodingError> {
    let mut result = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT64_LEN).enumerate() {
        let payload = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if i == MAX_VARINT64_LEN - 1 && payload > 1 {
            return Err(EncodingError::MalformedVarint("varint64 overflows 64 bits"));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if buf.len() < MAX_VARINT64_LEN {
        Err(EncodingError::UnexpectedEof {
            needed: buf.len() + 1,
            available: buf.len(),
        })
    } else {
        Err(EncodingError::MalformedVarint("varint64 longer than 10 bytes"))
    }
}

/// Decodes a varint32 from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn get_varint32(buf: &[u8]) -> Result<(u32, usize), EncodingError> {
    let window = &buf[..buf.len().min(MAX_VARINT32_LEN)];
    match get_varint64(window) {
        Ok((value, n)) => {
            let value = u32::try_from(value)
                .map_err(|_| EncodingError::MalformedVarint("varint32 overflows 32 bits"))?;
            Ok((value, n))
        }
        Err(EncodingError::UnexpectedEof { .. }) if window.len() == MAX_VARINT32_LEN => Err(
            EncodingError::MalformedVarint("varint32 longer than 5 bytes"),
        ),
        Err(e) => Err(e),
    }
}
