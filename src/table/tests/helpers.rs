//! Test-only table writer and fixtures.

use std::sync::Arc;

use crate::block::builder::BlockBuilder;
use crate::encoding::{Encode, encode_to_vec};
use crate::filter::FilterPolicy;
use crate::filter::builder::FilterBlockBuilder;
use crate::format::{BlockHandle, CompressionType, Footer};
use crate::options::Options;
use crate::table::{FILTER_KEY_PREFIX, Table};
use crate::test_support::{MemFile, write_block};

// ------------------------------------------------------------------------------------------------
// TableBuilder
// ------------------------------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct BuildOptions {
    pub(crate) block_size: usize,
    pub(crate) restart_interval: usize,
    pub(crate) compression: CompressionType,
    pub(crate) filter_policy: Option<Arc<dyn FilterPolicy>>,

    /// Appended to every index value after the encoded handle.
    pub(crate) index_value_suffix: Vec<u8>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            block_size: 256,
            restart_interval: 4,
            compression: CompressionType::None,
            filter_policy: None,
            index_value_suffix: Vec::new(),
        }
    }
}

/// Layout of a built table, for tests that damage specific regions.
#[derive(Debug, Clone)]
pub(crate) struct BuiltTable {
    pub(crate) bytes: Vec<u8>,
    pub(crate) data_handles: Vec<BlockHandle>,
    pub(crate) filter_handle: Option<BlockHandle>,
    pub(crate) metaindex_handle: BlockHandle,
    pub(crate) index_handle: BlockHandle,
}

pub(crate) struct TableBuilder {
    options: BuildOptions,
    out: Vec<u8>,
    data_block: BlockBuilder,
    last_key: Vec<u8>,
    index: Vec<(Vec<u8>, BlockHandle)>,
    filter: Option<FilterBlockBuilder>,
}

impl TableBuilder {
    pub(crate) fn new(options: BuildOptions) -> Self {
        let filter = options.filter_policy.as_ref().map(|policy| {
            let mut filter = FilterBlockBuilder::new(Arc::clone(policy));
            filter.start_block(0);
            filter
        });
        Self {
            data_block: BlockBuilder::new(options.restart_interval),
            options,
            out: Vec::new(),
            last_key: Vec::new(),
            index: Vec::new(),
            filter,
        }
    }

    pub(crate) fn add(&mut self, key: &[u8], value: &[u8]) {
        if let Some(filter) = self.filter.as_mut() {
            filter.add_key(key);
        }
        self.data_block.add(key, value);
        self.last_key.clear();
        self.last_key.extend_from_slice(key);

        if self.data_block.size_estimate() >= self.options.block_size {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.data_block.is_empty() {
            return;
        }
        let block = std::mem::replace(
            &mut self.data_block,
            BlockBuilder::new(self.options.restart_interval),
        );
        let handle = write_block(&mut self.out, &block.finish(), self.options.compression);
        self.index.push((self.last_key.clone(), handle));

        if let Some(filter) = self.filter.as_mut() {
            filter.start_block(self.out.len() as u64);
        }
    }

    pub(crate) fn finish(mut self) -> BuiltTable {
        self.flush();

        let filter_handle = self.filter.take().map(|filter| {
            write_block(&mut self.out, &filter.finish(), CompressionType::None)
        });

        let mut meta = BlockBuilder::new(1);
        if let (Some(handle), Some(policy)) = (filter_handle, self.options.filter_policy.as_ref()) {
            let key = format!("{FILTER_KEY_PREFIX}{}", policy.name());
            meta.add(key.as_bytes(), &encode_to_vec(&handle).unwrap());
        }
        let metaindex_handle = write_block(&mut self.out, &meta.finish(), CompressionType::None);

        let mut index = BlockBuilder::new(1);
        for (separator, handle) in &self.index {
            let mut value = encode_to_vec(handle).unwrap();
            value.extend_from_slice(&self.options.index_value_suffix);
            index.add(separator, &value);
        }
        let index_handle = write_block(&mut self.out, &index.finish(), CompressionType::None);

        Footer {
            metaindex_handle,
            index_handle,
        }
        .encode_to(&mut self.out)
        .unwrap();

        BuiltTable {
            bytes: self.out,
            data_handles: self.index.iter().map(|(_, h)| *h).collect(),
            filter_handle,
            metaindex_handle,
            index_handle,
        }
    }
}

/// Builds a table holding `entries`, which must be sorted.
pub(crate) fn build_table<K: AsRef<[u8]>, V: AsRef<[u8]>>(
    options: BuildOptions,
    entries: &[(K, V)],
) -> BuiltTable {
    let mut builder = TableBuilder::new(options);
    for (k, v) in entries {
        builder.add(k.as_ref(), v.as_ref());
    }
    builder.finish()
}

/// A table whose index block holds `index` verbatim, with no data blocks
/// behind it unless the values happen to point at some.
pub(crate) fn build_raw_index_table(prefix: &[u8], index: &[(&[u8], &[u8])]) -> BuiltTable {
    let mut out = prefix.to_vec();
    let metaindex_handle = write_block(&mut out, &BlockBuilder::new(1).finish(), CompressionType::None);

    let mut block = BlockBuilder::new(1);
    for (k, v) in index {
        block.add(k, v);
    }
    let index_handle = write_block(&mut out, &block.finish(), CompressionType::None);
    Footer {
        metaindex_handle,
        index_handle,
    }
    .encode_to(&mut out)
    .unwrap();

    BuiltTable {
        bytes: out,
        data_handles: Vec::new(),
        filter_handle: None,
        metaindex_handle,
        index_handle,
    }
}

// ------------------------------------------------------------------------------------------------
// Fixtures
// ------------------------------------------------------------------------------------------------

/// `n` sorted entries `key000000 -> value-0-<pad>`.
pub(crate) fn sample_entries(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| {
            (
                format!("key{i:06}").into_bytes(),
                format!("value-{i}-{}", "x".repeat(i % 13)).into_bytes(),
            )
        })
        .collect()
}

/// Opens `bytes` from memory, returning the table and the file so tests can
/// count reads or inject failures.
pub(crate) fn open_mem(bytes: Vec<u8>, options: Options) -> (Table, Arc<MemFile>) {
    let file = Arc::new(MemFile::new(bytes));
    let table = Table::open(options, file.clone(), file.len()).unwrap();
    (table, file)
}
