//! Shared block cache.
//!
//! One [`BlockCache`] may serve any number of open tables. Each table asks
//! for its own namespace id at open time, and cache keys are
//!
//! ```text
//! [namespace id u64 LE][block offset u64 LE]
//! ```
//!
//! so blocks of different tables never collide, while repeated reads of the
//! same block through one table share a single entry.
//!
//! Entries are `Arc<Block>`: eviction only drops the cache's reference, so a
//! block handed out through a [`CacheHandle`] stays alive until the handle
//! is dropped. Dropping the handle is the release.


use std::{
    fmt,
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use quick_cache::{Weighter, sync::Cache};
use tracing::trace;

use crate::{
    block::Block,
    error::{Error, Result},
};

/// Size of a cache key in bytes.
pub const CACHE_KEY_SIZE: usize = 16;

/// Rough average block size, used to size the cache's item table.
const ESTIMATED_BLOCK_SIZE: u64 = 4096;

pub type CacheKey = [u8; CACHE_KEY_SIZE];

/// Builds the key of the block at `offset` in the table with namespace `id`.
pub fn cache_key(id: u64, offset: u64) -> CacheKey {
    let mut key = [0u8; CACHE_KEY_SIZE];
    key[..8].copy_from_slice(&id.to_le_bytes());
    key[8..].copy_from_slice(&offset.to_le_bytes());
    key
}

#[derive(Clone)]
struct BlockWeighter;

impl Weighter<CacheKey, Arc<Block>> for BlockWeighter {
    fn weight(&self, _key: &CacheKey, block: &Arc<Block>) -> u64 {
        (block.size() as u64).max(1)
    }
}

// ------------------------------------------------------------------------------------------------
// BlockCache
// ------------------------------------------------------------------------------------------------

/// Thread-safe cache of parsed blocks, bounded by total block bytes.
pub struct BlockCache {
    blocks: Cache<CacheKey, Arc<Block>, BlockWeighter>,
    capacity: u64,
    next_id: AtomicU64,
    pins: Arc<AtomicUsize>,
}

impl BlockCache {
    /// Creates a cache holding at most `capacity_bytes` of block contents.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `capacity_bytes` is zero.
    pub fn new(capacity_bytes: u64) -> Result<Self> {
        if capacity_bytes == 0 {
            return Err(Error::InvalidArgument(
                "block cache capacity must be > 0".into(),
            ));
        }

        let estimated_items = (capacity_bytes / ESTIMATED_BLOCK_SIZE).clamp(16, 1 << 20) as usize;
        Ok(Self {
            blocks: Cache::with_weighter(estimated_items, capacity_bytes, BlockWeighter),
            capacity: capacity_bytes,
            next_id: AtomicU64::new(0),
            pins: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Mints a process-unique, non-zero namespace id.
    pub fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the cached block under `key`, pinned until the handle drops.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheHandle> {
        let block = self.blocks.get(key)?;
        Some(self.pin(block))
    }

    /// Caches `block` under `key`, replacing any previous entry, and returns
    /// a pinned handle to it.
    ///
    /// The handle stays usable even if the entry is evicted immediately.
    pub fn insert(&self, key: CacheKey, block: Block) -> CacheHandle {
        let block = Arc::new(block);
        trace!(charge = block.size(), "block cache insert");
        self.blocks.insert(key, Arc::clone(&block));
        self.pin(block)
    }

    fn pin(&self, block: Arc<Block>) -> CacheHandle {
        self.pins.fetch_add(1, Ordering::AcqRel);
        CacheHandle {
            block,
            pins: Arc::clone(&self.pins),
        }
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// `true` if no blocks are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the sizes of all cached blocks.
    pub fn total_charge(&self) -> u64 {
        self.blocks.weight()
    }

    /// Maximum total charge, in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of handles currently outstanding.
    pub fn pinned(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }
}

impl fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("total_charge", &self.total_charge())
            .field("pinned", &self.pinned())
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// CacheHandle
// ------------------------------------------------------------------------------------------------

/// A pinned reference to a cached block.
pub struct CacheHandle {
    block: Arc<Block>,
    pins: Arc<AtomicUsize>,
}

impl Deref for CacheHandle {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl Drop for CacheHandle {
    fn drop(&mut self) {
        self.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("size", &self.block.size())
            .finish()
    }
}
