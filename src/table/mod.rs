//! Table reader.
//!
//! A [`Table`] is an open, immutable, sorted table file. Opening reads the
//! footer and the index block and keeps the index resident; everything
//! else is fetched on demand:
//!
//! ```text
//!            get / iter / approximate_offset_of
//!                           |
//!                      index block (resident)
//!                           |  handle of the data block
//!              filter? -----+-----> block cache? ----> file
//!                                         |
//!                                    data block cursor
//! ```
//!
//! ## Filters
//!
//! When [`Options::filter_policy`] is set, open also looks up
//! `"filter." + policy name` in the metaindex block and loads the filter
//! block it points to. This is best-effort: any failure leaves the table
//! without a filter, which only costs the negative-lookup shortcut.
//!
//! ## Block cache
//!
//! Data blocks go through [`Options::block_cache`] when one is configured.
//! Each open table gets its own namespace in the cache, so blocks are never
//! shared between tables, not even two opens of the same file. A block
//! handed to a cursor is either owned by that cursor or pinned in the cache
//! through a [`CacheHandle`]; in both cases dropping the cursor releases it.
//!
//! ## Concurrency
//!
//! `Table` is `Send + Sync` and immutable after open. Lookups and scans may
//! run concurrently from any number of threads; each cursor belongs to one
//! thread at a time.

#[cfg(test)]
mod tests;

use std::{cmp::Ordering, ops::Deref, path::Path, sync::Arc};

use tracing::{debug, trace, warn};

use crate::{
    block::{Block, BlockIter},
    cache::{CacheHandle, cache_key},
    comparator::BytewiseComparator,
    encoding::decode_from_slice,
    error::{Error, Result},
    file::{RandomAccessFile, StdFile},
    filter::{FilterBlockReader, FilterPolicy},
    format::{BlockHandle, FOOTER_ENCODED_LENGTH, Footer, decode_handle, read_block},
    iterator::{Cursor, EmptyCursor, Entries, TwoLevelIterator},
    options::{Options, ReadOptions},
};

/// Metaindex key prefix under which filter blocks are stored.
pub const FILTER_KEY_PREFIX: &str = "filter.";

// ------------------------------------------------------------------------------------------------
// Lookup result
// ------------------------------------------------------------------------------------------------

/// Outcome of [`Table::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// An entry comparing equal to the requested key.
    Found {
        /// The stored key.
        key: Vec<u8>,
        /// The stored value.
        value: Vec<u8>,
    },

    /// No entry with that key.
    NotFound,
}

impl Lookup {
    /// The value, if found.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Found { value, .. } => Some(value),
            Self::NotFound => None,
        }
    }

    /// `true` for [`Lookup::Found`].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

// ------------------------------------------------------------------------------------------------
// Block leases
// ------------------------------------------------------------------------------------------------

/// A data block held by a cursor for as long as the cursor lives.
#[derive(Debug)]
pub enum BlockLease {
    /// Read for this cursor only; freed with it.
    Owned(Block),

    /// Shared with the block cache; the pin is released with the cursor.
    Cached(CacheHandle),
}

impl BlockLease {
    /// `true` if the block is pinned in the block cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

impl Deref for BlockLease {
    type Target = Block;

    fn deref(&self) -> &Block {
        match self {
            Self::Owned(block) => block,
            Self::Cached(handle) => handle,
        }
    }
}

/// Cursor over one data block, or the error that prevented loading it.
pub enum DataBlockIter {
    Block(BlockIter<BlockLease>),
    Failed(EmptyCursor),
}

impl DataBlockIter {
    /// The lease backing this cursor, if the block was loaded.
    pub fn lease(&self) -> Option<&BlockLease> {
        match self {
            Self::Block(iter) => Some(iter.get_ref()),
            Self::Failed(_) => None,
        }
    }
}

impl Cursor for DataBlockIter {
    fn valid(&self) -> bool {
        match self {
            Self::Block(iter) => iter.valid(),
            Self::Failed(iter) => iter.valid(),
        }
    }

    fn seek_to_first(&mut self) {
        match self {
            Self::Block(iter) => iter.seek_to_first(),
            Self::Failed(iter) => iter.seek_to_first(),
        }
    }

    fn seek_to_last(&mut self) {
        match self {
            Self::Block(iter) => iter.seek_to_last(),
            Self::Failed(iter) => iter.seek_to_last(),
        }
    }

    fn seek(&mut self, target: &[u8]) {
        match self {
            Self::Block(iter) => iter.seek(target),
            Self::Failed(iter) => iter.seek(target),
        }
    }

    fn next(&mut self) {
        match self {
            Self::Block(iter) => iter.next(),
            Self::Failed(iter) => iter.next(),
        }
    }

    fn prev(&mut self) {
        match self {
            Self::Block(iter) => iter.prev(),
            Self::Failed(iter) => iter.prev(),
        }
    }

    fn key(&self) -> &[u8] {
        match self {
            Self::Block(iter) => iter.key(),
            Self::Failed(iter) => iter.key(),
        }
    }

    fn value(&self) -> &[u8] {
        match self {
            Self::Block(iter) => iter.value(),
            Self::Failed(iter) => iter.value(),
        }
    }

    fn status(&self) -> Result<()> {
        match self {
            Self::Block(iter) => iter.status(),
            Self::Failed(iter) => iter.status(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Table
// ------------------------------------------------------------------------------------------------

/// An open table file.
pub struct Table {
    options: Options,
    file: Arc<dyn RandomAccessFile>,

    /// Namespace in the block cache; 0 without a cache.
    cache_id: u64,

    filter: Option<FilterBlockReader>,

    /// Kept for [`Table::approximate_offset_of`] on keys past the index.
    metaindex_handle: BlockHandle,

    index_block: Block,
}

impl Table {
    /// Opens the table stored in the first `size` bytes of `file`.
    ///
    /// # Errors
    ///
    /// - [`Error::Corruption`] if the file is shorter than a footer, the
    ///   footer is malformed, or the index block is unreadable.
    /// - [`Error::Io`] if reading the footer or index block fails.
    ///
    /// Problems with the metaindex or filter block are logged and ignored.
    pub fn open(options: Options, file: Arc<dyn RandomAccessFile>, size: u64) -> Result<Self> {
        if size < FOOTER_ENCODED_LENGTH as u64 {
            return Err(Error::corruption("file is too short to be an sstable"));
        }

        let footer_input = file.read(size - FOOTER_ENCODED_LENGTH as u64, FOOTER_ENCODED_LENGTH)?;
        if footer_input.len() != FOOTER_ENCODED_LENGTH {
            return Err(Error::corruption("truncated footer read"));
        }
        let (footer, _) = decode_from_slice::<Footer>(&footer_input)?;

        let metadata_options = ReadOptions::for_metadata(options.paranoid_checks);
        let index_contents = read_block(file.as_ref(), &metadata_options, &footer.index_handle)?;
        let index_block = Block::new(index_contents)?;

        let cache_id = options.block_cache.as_ref().map_or(0, |cache| cache.new_id());
        let filter = read_meta(&options, file.as_ref(), &footer);

        debug!(
            size,
            cache_id,
            index_size = index_block.size(),
            filter = filter.is_some(),
            "table opened"
        );

        Ok(Self {
            options,
            file,
            cache_id,
            filter,
            metaindex_handle: footer.metaindex_handle,
            index_block,
        })
    }

    /// Opens the table file at `path` with positioned reads.
    pub fn open_path(options: Options, path: impl AsRef<Path>) -> Result<Self> {
        let file = StdFile::open(path)?;
        let size = file.len()?;
        Self::open(options, Arc::new(file), size)
    }

    /// Looks up `key` and passes the entry the data-block seek lands on to
    /// `sink`.
    ///
    /// The landed entry is the first one `>= key` within the data block the
    /// index selects; it need not equal `key`. `sink` is called at most
    /// once, and not at all when the filter rules the key out or the seek
    /// runs off the end. Not finding anything is not an error.
    ///
    /// # Errors
    ///
    /// The data-block cursor's error if any, else the index cursor's.
    pub fn internal_get<F>(&self, options: &ReadOptions, key: &[u8], sink: F) -> Result<()>
    where
        F: FnOnce(&[u8], &[u8]),
    {
        let mut index_iter = self.index_block.iter(Arc::clone(&self.options.comparator));
        index_iter.seek(key);

        let mut status = Ok(());
        if index_iter.valid() {
            let handle_value = index_iter.value();
            if self.filter_excludes(handle_value, key) {
                trace!("filter excluded key");
            } else {
                let mut block_iter = self.block_reader(options, handle_value);
                block_iter.seek(key);
                if block_iter.valid() {
                    sink(block_iter.key(), block_iter.value());
                }
                status = block_iter.status();
            }
        }

        status?;
        index_iter.status()
    }

    /// Returns the entry whose key compares equal to `key`.
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Lookup> {
        let comparator = &self.options.comparator;
        let mut found = Lookup::NotFound;
        self.internal_get(options, key, |k, v| {
            if comparator.compare(k, key) == Ordering::Equal {
                found = Lookup::Found {
                    key: k.to_vec(),
                    value: v.to_vec(),
                };
            }
        })?;
        Ok(found)
    }

    /// Cursor over every entry in comparator order.
    ///
    /// Data blocks are fetched lazily as the cursor moves, through the same
    /// path as point lookups.
    pub fn iter(&self, options: &ReadOptions) -> impl Cursor + use<'_> {
        let options = *options;
        TwoLevelIterator::new(
            self.index_block.iter(Arc::clone(&self.options.comparator)),
            move |index_value: &[u8]| self.block_reader(&options, index_value),
        )
    }

    /// Forward scan over every entry as a std iterator.
    pub fn entries(&self, options: &ReadOptions) -> Entries<impl Cursor + use<'_>> {
        Entries::new(self.iter(options))
    }

    /// Approximate file offset at which the data for `key` begins.
    ///
    /// Keys past the last index entry map to the metaindex offset, which is
    /// close to the end of the file. Never fails.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let mut index_iter = self.index_block.iter(Arc::clone(&self.options.comparator));
        index_iter.seek(key);
        if index_iter.valid() {
            match decode_handle(index_iter.value()) {
                Ok(handle) => return handle.offset,
                Err(e) => warn!(error = %e, "undecodable handle in index block"),
            }
        }
        self.metaindex_handle.offset
    }

    /// Whether a filter block was attached at open.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// This table's namespace in the block cache, or 0 without a cache.
    pub fn cache_id(&self) -> u64 {
        self.cache_id
    }

    /// Options the table was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Turns an index value into a cursor over the data block it names.
    ///
    /// Never fails: errors come back as an always-invalid cursor carrying
    /// the error in its status.
    pub fn block_reader(&self, options: &ReadOptions, index_value: &[u8]) -> DataBlockIter {
        match self.fetch_block(options, index_value) {
            Ok(lease) => DataBlockIter::Block(BlockIter::new(
                lease,
                Arc::clone(&self.options.comparator),
            )),
            Err(e) => DataBlockIter::Failed(EmptyCursor::with_error(e)),
        }
    }

    fn fetch_block(&self, options: &ReadOptions, index_value: &[u8]) -> Result<BlockLease> {
        // Trailing bytes after the handle are reserved.
        let handle = decode_handle(index_value)?;

        let Some(cache) = self.options.block_cache.as_ref() else {
            let contents = read_block(self.file.as_ref(), options, &handle)?;
            return Ok(BlockLease::Owned(Block::new(contents)?));
        };

        let key = cache_key(self.cache_id, handle.offset);
        if let Some(cached) = cache.lookup(&key) {
            trace!(cache_id = self.cache_id, offset = handle.offset, "block cache hit");
            return Ok(BlockLease::Cached(cached));
        }
        trace!(cache_id = self.cache_id, offset = handle.offset, "block cache miss");

        let contents = read_block(self.file.as_ref(), options, &handle)?;
        let cachable = contents.cachable;
        let block = Block::new(contents)?;
        if cachable && options.fill_cache {
            Ok(BlockLease::Cached(cache.insert(key, block)))
        } else {
            Ok(BlockLease::Owned(block))
        }
    }

    /// `true` only if a filter is attached, the handle decodes, and the
    /// filter rules `key` out of that block.
    fn filter_excludes(&self, handle_value: &[u8], key: &[u8]) -> bool {
        let Some(filter) = self.filter.as_ref() else {
            return false;
        };
        match decode_handle(handle_value) {
            Ok(handle) => !filter.key_may_match(handle.offset, key),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("cache_id", &self.cache_id)
            .field("filter", &self.filter)
            .field("metaindex_handle", &self.metaindex_handle)
            .field("index_size", &self.index_block.size())
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// Metadata
// ------------------------------------------------------------------------------------------------

/// Loads the filter named by the configured policy, if there is one.
///
/// Every failure is logged and yields `None`.
fn read_meta(
    options: &Options,
    file: &dyn RandomAccessFile,
    footer: &Footer,
) -> Option<FilterBlockReader> {
    let policy = options.filter_policy.as_ref()?;
    let read_options = ReadOptions::for_metadata(options.paranoid_checks);

    let meta = match read_block(file, &read_options, &footer.metaindex_handle).and_then(Block::new)
    {
        Ok(meta) => meta,
        Err(e) => {
            warn!(error = %e, "failed to read metaindex block; continuing without filter");
            return None;
        }
    };

    let filter_key = format!("{FILTER_KEY_PREFIX}{}", policy.name());
    let mut iter = meta.iter(Arc::new(BytewiseComparator));
    iter.seek(filter_key.as_bytes());
    if !iter.valid() || iter.key() != filter_key.as_bytes() {
        debug!(filter_key = %filter_key, "no filter block for configured policy");
        return None;
    }

    read_filter(options, policy, file, iter.value())
}

/// Loads the filter block whose encoded handle is `handle_value`.
fn read_filter(
    options: &Options,
    policy: &Arc<dyn FilterPolicy>,
    file: &dyn RandomAccessFile,
    handle_value: &[u8],
) -> Option<FilterBlockReader> {
    let handle = match decode_handle(handle_value) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "bad filter block handle; continuing without filter");
            return None;
        }
    };

    let read_options = ReadOptions::for_metadata(options.paranoid_checks);
    match read_block(file, &read_options, &handle) {
        Ok(contents) => Some(FilterBlockReader::new(Arc::clone(policy), contents.data)),
        Err(e) => {
            warn!(error = %e, "failed to read filter block; continuing without filter");
            None
        }
    }
}
