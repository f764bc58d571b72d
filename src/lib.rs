//! # AeternusDB table reader
//!
//! The read side of immutable sorted table files: open a file, keep its
//! index resident, and serve point lookups, ordered scans and offset
//! estimates against it. Data blocks are fetched lazily and may be shared
//! between any number of open tables through a [`BlockCache`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aeternusdb_table::{BlockCache, BloomFilterPolicy, Cursor, Options, ReadOptions, Table};
//!
//! let options = Options {
//!     filter_policy: Some(Arc::new(BloomFilterPolicy::default())),
//!     block_cache: Some(Arc::new(BlockCache::new(8 << 20).unwrap())),
//!     ..Options::default()
//! };
//! let table = Table::open_path(options, "/tmp/000042.sst").unwrap();
//!
//! // Point lookup
//! let hit = table.get(&ReadOptions::default(), b"hello").unwrap();
//! println!("{:?}", hit.value());
//!
//! // Ordered scan from a key
//! let mut it = table.iter(&ReadOptions::default());
//! it.seek(b"a");
//! while it.valid() {
//!     println!("{:?} => {:?}", it.key(), it.value());
//!     it.next();
//! }
//! it.status().unwrap();
//!
//! // Where does "m" start, roughly?
//! let offset = table.approximate_offset_of(b"m");
//! # let _ = offset;
//! ```
//!
//! ## File layout
//!
//! ```text
//! [DATA BLOCK 0]...[DATA BLOCK N-1][FILTER BLOCK?][METAINDEX BLOCK][INDEX BLOCK][FOOTER 48 B]
//! ```
//!
//! Every block is followed by a 5-byte trailer: a compression type byte
//! and a masked CRC32C of the payload plus that byte.
//!
//! ## Features
//!
//! - **Two-level iteration**: index cursor over lazily loaded data blocks.
//! - **Bloom filters**: negative lookups skip the data block read.
//! - **Shared block cache**: per-table namespaces, pinned while in use.
//! - **Snappy blocks**: decompressed transparently.
//! - **Memory-mapped files**: blocks served straight from the map.

pub mod block;
pub mod cache;
pub mod comparator;
pub mod encoding;
pub mod error;
pub mod file;
pub mod filter;
pub mod format;
pub mod iterator;
pub mod options;
pub mod table;

#[cfg(test)]
mod test_support;

pub use cache::{BlockCache, CacheHandle};
pub use comparator::{BytewiseComparator, Comparator};
pub use error::{Error, Result};
pub use file::{FileSlice, MmapFile, RandomAccessFile, StdFile};
pub use filter::{BloomFilterPolicy, FilterPolicy};
pub use format::{BlockContents, BlockHandle, CompressionType, Footer};
pub use iterator::{Cursor, Entries};
pub use options::{Options, ReadOptions};
pub use table::{BlockLease, DataBlockIter, Lookup, Table};
