//! Key ordering.

use std::cmp::Ordering;

/// A total order over byte strings.
///
/// A table must be read with the same comparator it was written with;
/// the reader never checks this.
pub trait Comparator: Send + Sync {
    /// Name of the ordering, for diagnostics.
    fn name(&self) -> &str;

    /// Three-way comparison of `a` and `b`.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte-wise ordering. The default for every table.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &str {
        "aeternusdb.BytewiseComparator"
    }

    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
