//! Filter block reader.
//!
//! ```text
//! [FILTER_0]...[FILTER_N-1][OFFSET_0 u32]...[OFFSET_N-1 u32][ARRAY_OFFSET u32][BASE_LG u8]
//! ```
//!
//! Filter `i` covers data blocks whose file offset lies in
//! `[i << base_lg, (i + 1) << base_lg)` and spans bytes
//! `OFFSET_i..OFFSET_i+1`, the last one ending where the offset array
//! starts.

use std::{fmt, sync::Arc};

use crate::{encoding, file::FileSlice};

use super::FilterPolicy;

/// Trailer after the offset array: array offset (4 B) + base lg (1 B).
const TRAILER_SIZE: usize = 5;

/// Answers per-data-block membership queries from a filter block.
///
/// A block that cannot be parsed yields a reader that answers "may match"
/// for every query.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: FileSlice,

    /// Start of the offset array.
    offsets_start: usize,

    /// Number of filters.
    num: usize,

    base_lg: u8,
}

impl FilterBlockReader {
    /// Parses the offset array of `data`, the contents of a filter block.
    pub fn new(policy: Arc<dyn FilterPolicy>, data: FileSlice) -> Self {
        let mut reader = Self {
            policy,
            data,
            offsets_start: 0,
            num: 0,
            base_lg: 0,
        };

        let n = reader.data.len();
        if n < TRAILER_SIZE {
            return reader;
        }
        let Ok(array_offset) = encoding::fixed32_at(&reader.data, n - TRAILER_SIZE) else {
            return reader;
        };
        let array_offset = array_offset as usize;
        if array_offset > n - TRAILER_SIZE {
            return reader;
        }

        reader.base_lg = reader.data[n - 1];
        reader.offsets_start = array_offset;
        reader.num = (n - TRAILER_SIZE - array_offset) / 4;
        reader
    }

    /// `false` only if the filter for the data block at `block_offset`
    /// rules `key` out.
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let Some(index) = block_offset.checked_shr(u32::from(self.base_lg)) else {
            return true;
        };
        let Ok(index) = usize::try_from(index) else {
            return true;
        };
        if index >= self.num {
            return true;
        }

        let pos = self.offsets_start + index * 4;
        let (Ok(start), Ok(limit)) = (
            encoding::fixed32_at(&self.data, pos),
            encoding::fixed32_at(&self.data, pos + 4),
        ) else {
            return true;
        };
        let (start, limit) = (start as usize, limit as usize);

        if start == limit {
            // Empty filters match nothing.
            return false;
        }
        if start < limit && limit <= self.offsets_start {
            return self.policy.key_may_match(key, &self.data[start..limit]);
        }
        true
    }

    /// Number of filters in the block.
    pub fn len(&self) -> usize {
        self.num
    }

    /// `true` if the block holds no filters.
    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Whether the filter bytes are a buffer owned by this reader.
    pub fn is_heap_allocated(&self) -> bool {
        self.data.is_heap_allocated()
    }
}

impl fmt::Debug for FilterBlockReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterBlockReader")
            .field("policy", &self.policy.name())
            .field("filters", &self.num)
            .field("base_lg", &self.base_lg)
            .finish()
    }
}
