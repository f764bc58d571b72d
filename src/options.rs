//! Table and per-read configuration.

use std::{fmt, sync::Arc};

use crate::{
    cache::BlockCache,
    comparator::{BytewiseComparator, Comparator},
    filter::FilterPolicy,
};

// ------------------------------------------------------------------------------------------------
// Options
// ------------------------------------------------------------------------------------------------

/// Configuration shared by every read against an open [`Table`](crate::Table).
///
/// All fields have sensible defaults via [`Options::default()`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use aeternusdb_table::{BlockCache, BloomFilterPolicy, Options};
///
/// let cache = Arc::new(BlockCache::new(8 * 1024 * 1024).unwrap());
/// let options = Options {
///     filter_policy: Some(Arc::new(BloomFilterPolicy::default())),
///     block_cache: Some(cache),
///     ..Options::default()
/// };
/// assert!(!options.paranoid_checks);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Ordering the table was written with.
    ///
    /// Default: [`BytewiseComparator`].
    pub comparator: Arc<dyn Comparator>,

    /// Filter policy the table was written with. When set, the reader
    /// looks for `"filter." + name` in the metaindex block at open time.
    ///
    /// Default: none.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,

    /// Shared cache for data blocks. May be shared by any number of tables.
    ///
    /// Default: none (every block read goes to the file).
    pub block_cache: Option<Arc<BlockCache>>,

    /// Verify checksums of the index, metaindex and filter blocks at open.
    ///
    /// Default: `false`.
    pub paranoid_checks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator),
            filter_policy: None,
            block_cache: None,
            paranoid_checks: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("comparator", &self.comparator.name())
            .field(
                "filter_policy",
                &self.filter_policy.as_ref().map(|p| p.name().to_owned()),
            )
            .field("block_cache", &self.block_cache.is_some())
            .field("paranoid_checks", &self.paranoid_checks)
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// ReadOptions
// ------------------------------------------------------------------------------------------------

/// Per-call read settings for lookups and iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Verify the checksum of every data block read from the file.
    ///
    /// Default: `false`.
    pub verify_checksums: bool,

    /// Insert blocks read on a cache miss into the block cache.
    /// Bulk scans usually turn this off.
    ///
    /// Default: `true`.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}

impl ReadOptions {
    /// Read options used for the table's own metadata blocks.
    pub(crate) fn for_metadata(paranoid_checks: bool) -> Self {
        Self {
            verify_checksums: paranoid_checks,
            ..Self::default()
        }
    }
}
