//! Probabilistic key filters.
//!
//! A table written with a [`FilterPolicy`] carries a filter block holding
//! one filter per 2 KiB range of data-block offsets. Lookups consult it
//! before touching a data block: a "no" means the key is definitely absent,
//! a "maybe" means the block has to be read.

#[cfg(test)]
pub(crate) mod builder;

mod block;


pub use block::FilterBlockReader;

use bloomfilter::Bloom;

use crate::error::{Error, Result};

/// Default false-positive rate of [`BloomFilterPolicy`].
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

// ------------------------------------------------------------------------------------------------
// FilterPolicy
// ------------------------------------------------------------------------------------------------

/// Builds and queries the filters stored in a table's filter block.
///
/// The policy name is part of the on-disk format: the reader only attaches
/// a filter stored under `"filter." + name()`.
pub trait FilterPolicy: Send + Sync {
    /// Stable identifier of the filter encoding.
    fn name(&self) -> &str;

    /// Builds a filter covering `keys`.
    fn create_filter(&self, keys: &[&[u8]]) -> Result<Vec<u8>>;

    /// `false` only if `key` was definitely not among the keys `filter` was
    /// built from. Undecodable filters must answer `true`.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

// ------------------------------------------------------------------------------------------------
// BloomFilterPolicy
// ------------------------------------------------------------------------------------------------

/// Bloom filters sized for a target false-positive rate.
#[derive(Debug, Clone, Copy)]
pub struct BloomFilterPolicy {
    false_positive_rate: f64,
}

impl BloomFilterPolicy {
    /// Creates a policy targeting `false_positive_rate`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] unless `0.0 < false_positive_rate < 1.0`.
    pub fn new(false_positive_rate: f64) -> Result<Self> {
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(Error::InvalidArgument(format!(
                "bloom false positive rate must be in (0, 1), got {false_positive_rate}"
            )));
        }
        Ok(Self {
            false_positive_rate,
        })
    }

    /// Target false positive rate of the filters this policy builds.
    pub fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }
}

impl Default for BloomFilterPolicy {
    fn default() -> Self {
        Self {
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
        }
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        "bloom"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Result<Vec<u8>> {
        let mut bloom = Bloom::<[u8]>::new_for_fp_rate(keys.len().max(1), self.false_positive_rate)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        for key in keys {
            bloom.set(key);
        }
        Ok(bloom.as_slice().to_vec())
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        match Bloom::<[u8]>::from_slice(filter) {
            Ok(bloom) => bloom.check(key),
            Err(_) => true,
        }
    }
}
