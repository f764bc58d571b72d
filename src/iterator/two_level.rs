//! Two-level iteration: an index cursor whose values each open a data cursor.
//!
//! ```text
//! index:  [sep_0 -> h_0] [sep_1 -> h_1] [sep_2 -> h_2]
//!              |              |              |
//! data:     block(h_0)     block(h_1)     block(h_2)
//! ```
//!
//! The composite is positioned wherever the current data cursor is. Blocks
//! that turn out empty (or fail to load) are skipped in the direction of
//! travel, and the first error from any data cursor that gets discarded is
//! kept so `status()` still reports it.

use crate::error::Result;

use super::Cursor;

/// Flattens an index cursor and a per-entry block function into one cursor.
///
/// `block_fn` is called with an index value and returns a cursor over the
/// block it names. It is not called again while the index stays on an entry
/// with the same value.
pub struct TwoLevelIterator<I, F, C> {
    index: I,
    block_fn: F,
    data: Option<C>,

    /// Index value that produced `data`.
    data_block_handle: Vec<u8>,

    /// First error from a discarded data cursor.
    status: Result<()>,
}

impl<I, F, C> TwoLevelIterator<I, F, C>
where
    I: Cursor,
    F: FnMut(&[u8]) -> C,
    C: Cursor,
{
    /// Creates an unpositioned iterator.
    pub fn new(index: I, block_fn: F) -> Self {
        Self {
            index,
            block_fn,
            data: None,
            data_block_handle: Vec::new(),
            status: Ok(()),
        }
    }

    fn save_error(&mut self, status: Result<()>) {
        if self.status.is_ok() {
            if let Err(e) = status {
                self.status = Err(e);
            }
        }
    }

    fn set_data(&mut self, data: Option<C>) {
        if let Some(old) = self.data.take() {
            self.save_error(old.status());
        }
        self.data = data;
    }

    fn init_data_block(&mut self) {
        if !self.index.valid() {
            self.set_data(None);
            return;
        }

        let handle = self.index.value();
        if self.data.is_some() && handle == self.data_block_handle.as_slice() {
            return;
        }

        self.data_block_handle.clear();
        self.data_block_handle.extend_from_slice(handle);
        let data = (self.block_fn)(&self.data_block_handle);
        self.set_data(Some(data));
    }

    fn data_valid(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.valid())
    }

    fn skip_empty_data_blocks_forward(&mut self) {
        while !self.data_valid() {
            if !self.index.valid() {
                self.set_data(None);
                return;
            }
            self.index.next();
            self.init_data_block();
            if let Some(data) = self.data.as_mut() {
                data.seek_to_first();
            }
        }
    }

    fn skip_empty_data_blocks_backward(&mut self) {
        while !self.data_valid() {
            if !self.index.valid() {
                self.set_data(None);
                return;
            }
            self.index.prev();
            self.init_data_block();
            if let Some(data) = self.data.as_mut() {
                data.seek_to_last();
            }
        }
    }
}

impl<I, F, C> Cursor for TwoLevelIterator<I, F, C>
where
    I: Cursor,
    F: FnMut(&[u8]) -> C,
    C: Cursor,
{
    fn valid(&self) -> bool {
        self.data_valid()
    }

    fn seek_to_first(&mut self) {
        self.index.seek_to_first();
        self.init_data_block();
        if let Some(data) = self.data.as_mut() {
            data.seek_to_first();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_last(&mut self) {
        self.index.seek_to_last();
        self.init_data_block();
        if let Some(data) = self.data.as_mut() {
            data.seek_to_last();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn seek(&mut self, target: &[u8]) {
        self.index.seek(target);
        self.init_data_block();
        if let Some(data) = self.data.as_mut() {
            data.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    fn next(&mut self) {
        if let Some(data) = self.data.as_mut() {
            if !data.valid() {
                return;
            }
            data.next();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn prev(&mut self) {
        if let Some(data) = self.data.as_mut() {
            if !data.valid() {
                return;
            }
            data.prev();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn key(&self) -> &[u8] {
        match self.data.as_ref() {
            Some(data) => data.key(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.data.as_ref() {
            Some(data) => data.value(),
            None => &[],
        }
    }

    fn status(&self) -> Result<()> {
        self.index.status()?;
        if let Some(data) = self.data.as_ref() {
            data.status()?;
        }
        self.status.clone()
    }
}
