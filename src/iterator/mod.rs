//! Positioned cursors over sorted key/value sequences.
//!
//! Everything the table hands out for scanning implements [`Cursor`]: a
//! bidirectional, seekable position over entries ordered by the table's
//! comparator. A cursor is either positioned at an entry ([`Cursor::valid`])
//! or exhausted. Errors never panic the cursor; they park it in the
//! exhausted state and are reported through [`Cursor::status`].
//!
//! [`Entries`] adapts any cursor into a std [`Iterator`] for forward scans.


mod two_level;

pub use two_level::TwoLevelIterator;

use crate::error::Result;

// ------------------------------------------------------------------------------------------------
// Cursor
// ------------------------------------------------------------------------------------------------

/// A bidirectional cursor over sorted entries.
///
/// `key()` and `value()` are only meaningful while `valid()` is `true`.
/// `next()` and `prev()` on an exhausted cursor leave it exhausted.
pub trait Cursor {
    /// `true` if positioned at an entry.
    fn valid(&self) -> bool;

    /// Positions at the first entry, if any.
    fn seek_to_first(&mut self);

    /// Positions at the last entry, if any.
    fn seek_to_last(&mut self);

    /// Positions at the first entry whose key is `>= target`.
    fn seek(&mut self, target: &[u8]);

    /// Advances to the following entry.
    fn next(&mut self);

    /// Moves back to the preceding entry.
    fn prev(&mut self);

    /// Key of the current entry.
    fn key(&self) -> &[u8];

    /// Value of the current entry.
    fn value(&self) -> &[u8];

    /// First error encountered, if any.
    fn status(&self) -> Result<()>;
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn seek_to_first(&mut self) {
        (**self).seek_to_first()
    }

    fn seek_to_last(&mut self) {
        (**self).seek_to_last()
    }

    fn seek(&mut self, target: &[u8]) {
        (**self).seek(target)
    }

    fn next(&mut self) {
        (**self).next()
    }

    fn prev(&mut self) {
        (**self).prev()
    }

    fn key(&self) -> &[u8] {
        (**self).key()
    }

    fn value(&self) -> &[u8] {
        (**self).value()
    }

    fn status(&self) -> Result<()> {
        (**self).status()
    }
}

// ------------------------------------------------------------------------------------------------
// EmptyCursor
// ------------------------------------------------------------------------------------------------

/// A cursor with no entries, optionally carrying an error.
///
/// Returned in place of a data-block cursor when the block cannot be
/// fetched, so the failure surfaces through `status()` rather than being
/// dropped.
#[derive(Debug, Clone)]
pub struct EmptyCursor {
    status: Result<()>,
}

impl EmptyCursor {
    /// An empty cursor with an `Ok` status.
    pub fn new() -> Self {
        Self { status: Ok(()) }
    }

    /// An empty cursor whose status is `err`.
    pub fn with_error(err: crate::Error) -> Self {
        Self { status: Err(err) }
    }
}

impl Default for EmptyCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for EmptyCursor {
    fn valid(&self) -> bool {
        false
    }

    fn seek_to_first(&mut self) {}

    fn seek_to_last(&mut self) {}

    fn seek(&mut self, _target: &[u8]) {}

    fn next(&mut self) {}

    fn prev(&mut self) {}

    fn key(&self) -> &[u8] {
        &[]
    }

    fn value(&self) -> &[u8] {
        &[]
    }

    fn status(&self) -> Result<()> {
        self.status.clone()
    }
}

// ------------------------------------------------------------------------------------------------
// Entries
// ------------------------------------------------------------------------------------------------

/// Forward scan over a [`Cursor`] as a std [`Iterator`].
///
/// Starts at the cursor's first entry. Yields owned `(key, value)` pairs,
/// then at most one `Err` if the cursor stopped because of an error.
pub struct Entries<C> {
    cursor: C,
    started: bool,
    done: bool,
}

impl<C: Cursor> Entries<C> {
    /// Wraps `cursor`. Positioning happens on the first call to `next()`.
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            started: false,
            done: false,
        }
    }

    /// Unwraps the underlying cursor.
    pub fn into_inner(self) -> C {
        self.cursor
    }
}

impl<C: Cursor> Iterator for Entries<C> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.started {
            self.cursor.next();
        } else {
            self.cursor.seek_to_first();
            self.started = true;
        }

        if self.cursor.valid() {
            return Some(Ok((self.cursor.key().to_vec(), self.cursor.value().to_vec())));
        }

        self.done = true;
        self.cursor.status().err().map(Err)
    }
}
