//! Prefix-compressed sorted blocks.
//!
//! Data, index and metaindex blocks all share one layout:
//!
//! ```text
//! [ENTRY_0][ENTRY_1]...[ENTRY_N-1][RESTART_0 u32]...[RESTART_R-1 u32][R u32]
//! ```
//!
//! Each entry is
//!
//! ```text
//! [shared varint32][non_shared varint32][value_len varint32][KEY_SUFFIX][VALUE]
//! ```
//!
//! where the full key is the first `shared` bytes of the previous key
//! followed by the suffix. Restart points are offsets of entries stored with
//! `shared == 0`; seeking binary-searches them and then scans linearly.



use std::{cmp::Ordering, ops::Deref, sync::Arc};

use crate::{
    comparator::Comparator,
    encoding,
    error::{Error, Result},
    file::FileSlice,
    format::BlockContents,
    iterator::Cursor,
};

const RESTART_SIZE: usize = 4;

// ------------------------------------------------------------------------------------------------
// Block
// ------------------------------------------------------------------------------------------------

/// An immutable, parsed block.
#[derive(Debug)]
pub struct Block {
    data: FileSlice,
    restart_offset: usize,
    num_restarts: usize,
    heap_allocated: bool,
}

impl Block {
    /// Validates the restart trailer of `contents` and wraps it.
    ///
    /// # Errors
    ///
    /// [`Error::Corruption`] if the block is shorter than its restart count
    /// or the restart array does not fit.
    pub fn new(contents: BlockContents) -> Result<Self> {
        let data = contents.data;
        let size = data.len();
        if size < RESTART_SIZE {
            return Err(Error::corruption("bad block contents"));
        }

        let num_restarts = encoding::fixed32_at(&data, size - RESTART_SIZE)? as usize;
        let max_restarts = (size - RESTART_SIZE) / RESTART_SIZE;
        if num_restarts > max_restarts {
            return Err(Error::corruption("bad block contents"));
        }

        Ok(Self {
            restart_offset: size - (1 + num_restarts) * RESTART_SIZE,
            num_restarts,
            heap_allocated: contents.heap_allocated,
            data,
        })
    }

    /// Size of the block contents in bytes. Used as the cache charge.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `true` if the contents live in a buffer owned by this block.
    pub fn is_heap_allocated(&self) -> bool {
        self.heap_allocated
    }

    /// Cursor over `&self`.
    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIter<&Block> {
        BlockIter::new(self, comparator)
    }

    fn restart_point(&self, index: usize) -> usize {
        let pos = self.restart_offset + index * RESTART_SIZE;
        let mut raw = [0u8; RESTART_SIZE];
        raw.copy_from_slice(&self.data[pos..pos + RESTART_SIZE]);
        u32::from_le_bytes(raw) as usize
    }

    /// Decodes the entry header at `offset`, returning
    /// `(shared, non_shared, value_len, key_suffix_start)`.
    fn decode_entry(&self, offset: usize) -> Option<(usize, usize, usize, usize)> {
        if offset >= self.restart_offset {
            return None;
        }
        let entries = &self.data[..self.restart_offset];

        let mut pos = offset;
        let (shared, n) = encoding::get_varint32(&entries[pos..]).ok()?;
        pos += n;
        let (non_shared, n) = encoding::get_varint32(&entries[pos..]).ok()?;
        pos += n;
        let (value_len, n) = encoding::get_varint32(&entries[pos..]).ok()?;
        pos += n;

        let (non_shared, value_len) = (non_shared as usize, value_len as usize);
        if self.restart_offset - pos < non_shared + value_len {
            return None;
        }
        Some((shared as usize, non_shared, value_len, pos))
    }
}

// ------------------------------------------------------------------------------------------------
// BlockIter
// ------------------------------------------------------------------------------------------------

/// Cursor over the entries of one [`Block`].
///
/// `B` decides how the block is held: a plain reference for blocks owned by
/// the table, or an owning lease for blocks fetched on demand.
pub struct BlockIter<B> {
    block: B,
    comparator: Arc<dyn Comparator>,

    /// Offset of the current entry; `restart_offset` when exhausted.
    current: usize,

    /// Restart region containing `current`.
    restart_index: usize,

    key: Vec<u8>,
    value_start: usize,
    value_len: usize,
    status: Result<()>,
}

impl<B: Deref<Target = Block>> BlockIter<B> {
    /// Unpositioned cursor over `block`, which it keeps alive.
    pub fn new(block: B, comparator: Arc<dyn Comparator>) -> Self {
        let (current, restart_index) = (block.restart_offset, block.num_restarts);
        Self {
            block,
            comparator,
            current,
            restart_index,
            key: Vec::new(),
            value_start: 0,
            value_len: 0,
            status: Ok(()),
        }
    }

    /// The block this cursor reads.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Whatever holds the block for this cursor.
    pub fn get_ref(&self) -> &B {
        &self.block
    }

    fn next_entry_offset(&self) -> usize {
        self.value_start + self.value_len
    }

    fn seek_to_restart_point(&mut self, index: usize) {
        self.key.clear();
        self.restart_index = index;
        self.value_start = self.block.restart_point(index);
        self.value_len = 0;
    }

    fn mark_exhausted(&mut self) {
        self.current = self.block.restart_offset;
        self.restart_index = self.block.num_restarts;
    }

    fn corruption_error(&mut self) {
        self.mark_exhausted();
        self.status = Err(Error::corruption("bad entry in block"));
        self.key.clear();
        self.value_start = 0;
        self.value_len = 0;
    }

    /// Decodes the entry following the current one. Returns `false` at the
    /// end of the block or on corruption.
    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset();
        if self.current >= self.block.restart_offset {
            self.mark_exhausted();
            return false;
        }

        let Some((shared, non_shared, value_len, suffix_start)) =
            self.block.decode_entry(self.current)
        else {
            self.corruption_error();
            return false;
        };
        if self.key.len() < shared {
            self.corruption_error();
            return false;
        }

        self.key.truncate(shared);
        self.key
            .extend_from_slice(&self.block.data[suffix_start..suffix_start + non_shared]);
        self.value_start = suffix_start + non_shared;
        self.value_len = value_len;

        while self.restart_index + 1 < self.block.num_restarts
            && self.block.restart_point(self.restart_index + 1) < self.current
        {
            self.restart_index += 1;
        }
        true
    }
}

impl<B: Deref<Target = Block>> Cursor for BlockIter<B> {
    fn valid(&self) -> bool {
        self.current < self.block.restart_offset
    }

    fn seek_to_first(&mut self) {
        if self.block.num_restarts == 0 {
            self.mark_exhausted();
            return;
        }
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek_to_last(&mut self) {
        if self.block.num_restarts == 0 {
            self.mark_exhausted();
            return;
        }
        self.seek_to_restart_point(self.block.num_restarts - 1);
        while self.parse_next_key() && self.next_entry_offset() < self.block.restart_offset {}
    }

    fn seek(&mut self, target: &[u8]) {
        if self.block.num_restarts == 0 {
            self.mark_exhausted();
            return;
        }

        // Binary search for the last restart point whose key is < target.
        let mut left = 0;
        let mut right = self.block.num_restarts - 1;
        let mut current_cmp = Ordering::Equal;

        if self.valid() {
            current_cmp = self.comparator.compare(&self.key, target);
            match current_cmp {
                Ordering::Less => left = self.restart_index,
                Ordering::Greater => right = self.restart_index,
                Ordering::Equal => return,
            }
        }

        while left < right {
            let mid = (left + right).div_ceil(2);
            let region = self.block.restart_point(mid);
            let mid_key = match self.block.decode_entry(region) {
                Some((0, non_shared, _, start)) => &self.block.data[start..start + non_shared],
                _ => {
                    self.corruption_error();
                    return;
                }
            };
            if self.comparator.compare(mid_key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        // Already inside the right region and before the target: scan on.
        let skip_seek = left == self.restart_index && current_cmp == Ordering::Less;
        if !skip_seek {
            self.seek_to_restart_point(left);
        }

        while self.parse_next_key() {
            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    fn next(&mut self) {
        if self.valid() {
            self.parse_next_key();
        }
    }

    fn prev(&mut self) {
        if !self.valid() {
            return;
        }

        // Back up to a restart point strictly before the current entry.
        let original = self.current;
        while self.block.restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                self.mark_exhausted();
                return;
            }
            self.restart_index -= 1;
        }

        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_key() && self.next_entry_offset() < original {}
    }

    fn key(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        &self.key
    }

    fn value(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        &self.block.data[self.value_start..self.value_start + self.value_len]
    }

    fn status(&self) -> Result<()> {
        self.status.clone()
    }
}
