//! Minimal table writer for integration tests and benchmarks.
//!
//! Built only from the crate's public codec so that the files it produces
//! are exactly what an external writer would hand the reader.

#![allow(dead_code)]

use std::{fs, path::Path, sync::Arc};

use aeternusdb_table::{
    BlockHandle, CompressionType, FilterPolicy, Footer,
    encoding::{Encode, encode_to_vec, put_varint32},
    format::{block_checksum, mask_checksum},
};

const FILTER_BASE_LG: u8 = 11;

/// Knobs of [`TableWriter`].
#[derive(Clone)]
pub struct WriterOptions {
    pub block_size: usize,
    pub restart_interval: usize,
    pub compression: CompressionType,
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: 4096,
            restart_interval: 16,
            compression: CompressionType::None,
            filter_policy: None,
        }
    }
}

struct BlockWriter {
    restart_interval: usize,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
}

impl BlockWriter {
    fn new(restart_interval: usize) -> Self {
        Self {
            restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
        }
    }

    fn add(&mut self, key: &[u8], value: &[u8]) {
        let mut shared = 0;
        if self.counter < self.restart_interval {
            shared = self
                .last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count();
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        }
        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, (key.len() - shared) as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);
        self.last_key = key.to_vec();
        self.counter += 1;
    }

    fn len(&self) -> usize {
        self.buffer.len() + 4 * self.restarts.len() + 4
    }

    fn finish(mut self) -> Vec<u8> {
        for restart in &self.restarts {
            self.buffer.extend_from_slice(&restart.to_le_bytes());
        }
        self.buffer
            .extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        self.buffer
    }
}

/// Writes sorted entries into the table file format.
pub struct TableWriter {
    options: WriterOptions,
    out: Vec<u8>,
    block: BlockWriter,
    last_key: Vec<u8>,
    index: Vec<(Vec<u8>, BlockHandle)>,

    // Filter state: keys since the last generated filter, and the filters.
    filter_keys: Vec<Vec<u8>>,
    filters: Vec<u8>,
    filter_offsets: Vec<u32>,
}

impl TableWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            block: BlockWriter::new(options.restart_interval),
            options,
            out: Vec::new(),
            last_key: Vec::new(),
            index: Vec::new(),
            filter_keys: Vec::new(),
            filters: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        if self.options.filter_policy.is_some() {
            self.filter_keys.push(key.to_vec());
        }
        self.block.add(key, value);
        self.last_key = key.to_vec();
        if self.block.len() >= self.options.block_size {
            self.flush();
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.flush();

        let mut meta = BlockWriter::new(1);
        if let Some(policy) = self.options.filter_policy.clone() {
            if !self.filter_keys.is_empty() {
                self.generate_filter(policy.as_ref());
            }
            let mut block = std::mem::take(&mut self.filters);
            let array_offset = block.len() as u32;
            for offset in &self.filter_offsets {
                block.extend_from_slice(&offset.to_le_bytes());
            }
            block.extend_from_slice(&array_offset.to_le_bytes());
            block.push(FILTER_BASE_LG);

            let handle = self.write_raw(&block, CompressionType::None);
            let name = format!("filter.{}", policy.name());
            meta.add(name.as_bytes(), &encode_to_vec(&handle).unwrap());
        }
        let metaindex_handle = self.write_raw(&meta.finish(), CompressionType::None);

        let mut index = BlockWriter::new(1);
        for (separator, handle) in std::mem::take(&mut self.index) {
            index.add(&separator, &encode_to_vec(&handle).unwrap());
        }
        let index_handle = self.write_raw(&index.finish(), CompressionType::None);

        Footer {
            metaindex_handle,
            index_handle,
        }
        .encode_to(&mut self.out)
        .unwrap();
        self.out
    }

    fn flush(&mut self) {
        if self.block.buffer.is_empty() {
            return;
        }
        let block = std::mem::replace(&mut self.block, BlockWriter::new(self.options.restart_interval));
        let handle = self.write_raw(&block.finish(), self.options.compression);
        self.index.push((self.last_key.clone(), handle));

        if let Some(policy) = self.options.filter_policy.clone() {
            let filter_index = (self.out.len() >> FILTER_BASE_LG) as usize;
            while filter_index > self.filter_offsets.len() {
                self.generate_filter(policy.as_ref());
            }
        }
    }

    fn generate_filter(&mut self, policy: &dyn FilterPolicy) {
        self.filter_offsets.push(self.filters.len() as u32);
        if self.filter_keys.is_empty() {
            return;
        }
        let keys: Vec<&[u8]> = self.filter_keys.iter().map(Vec::as_slice).collect();
        self.filters.extend(policy.create_filter(&keys).unwrap());
        self.filter_keys.clear();
    }

    fn write_raw(&mut self, contents: &[u8], compression: CompressionType) -> BlockHandle {
        let payload = match compression {
            CompressionType::None => contents.to_vec(),
            CompressionType::Snappy => snap::raw::Encoder::new().compress_vec(contents).unwrap(),
        };
        let handle = BlockHandle::new(self.out.len() as u64, payload.len() as u64);
        let ty = compression as u8;
        let crc = mask_checksum(block_checksum(&payload, ty));
        self.out.extend_from_slice(&payload);
        self.out.push(ty);
        self.out.extend_from_slice(&crc.to_le_bytes());
        handle
    }
}

/// `n` sorted entries with keys `user-<i>` and 100-byte values.
pub fn entries(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let key = format!("user-{i:08}").into_bytes();
            let value = format!("{i:0>100}").into_bytes();
            (key, value)
        })
        .collect()
}

/// Writes `entries` as a table file at `path`.
pub fn write_table(path: &Path, options: WriterOptions, entries: &[(Vec<u8>, Vec<u8>)]) {
    let mut writer = TableWriter::new(options);
    for (k, v) in entries {
        writer.add(k, v);
    }
    fs::write(path, writer.finish()).unwrap();
}
