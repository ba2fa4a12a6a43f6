//! Partitioning of the unknown vector across ranks.
//!
//! Vectors are stored contiguously; a [`Partition`] records which slice each
//! rank owns. Reductions are computed as one partial result per rank and then
//! combined in rank order, which is exactly the shape of a distributed
//! all-reduce.

use std::ops::Range;

use crate::error::{Result, TiaError};

/// Contiguous ownership ranges of a vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Rank `r` owns `offsets[r]..offsets[r + 1]`.
    offsets: Vec<usize>,
}

impl Partition {
    /// A single rank owning all `len` entries.
    pub fn single(len: usize) -> Self {
        Self {
            offsets: vec![0, len],
        }
    }

    /// Split `len` entries over `ranks` ranks as evenly as possible.
    ///
    /// Leading ranks receive the remainder, so some ranks may own nothing
    /// when `ranks > len`.
    pub fn contiguous(len: usize, ranks: usize) -> Result<Self> {
        if ranks == 0 {
            return Err(TiaError::invalid_parameter(
                "ranks",
                "a partition needs at least one rank",
            ));
        }
        let base = len / ranks;
        let extra = len % ranks;
        let mut offsets = Vec::with_capacity(ranks + 1);
        offsets.push(0);
        let mut end = 0;
        for r in 0..ranks {
            end += base + usize::from(r < extra);
            offsets.push(end);
        }
        Ok(Self { offsets })
    }

    /// Build a partition from per-rank local sizes.
    pub fn from_local_sizes(sizes: &[usize]) -> Result<Self> {
        if sizes.is_empty() {
            return Err(TiaError::invalid_parameter(
                "sizes",
                "a partition needs at least one rank",
            ));
        }
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        offsets.push(0);
        let mut end = 0;
        for &s in sizes {
            end += s;
            offsets.push(end);
        }
        Ok(Self { offsets })
    }

    /// Global length.
    pub fn len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// True if the partitioned vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ranks.
    pub fn ranks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Range owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.offsets[rank]..self.offsets[rank + 1]
    }

    /// Iterate over the owned ranges in rank order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.offsets.windows(2).map(|w| w[0]..w[1])
    }

    /// Global sum of per-rank partial sums.
    pub fn sum_all<F>(&self, mut partial: F) -> f64
    where
        F: FnMut(Range<usize>) -> f64,
    {
        let partials: Vec<f64> = self.ranges().map(&mut partial).collect();
        partials.iter().sum()
    }

    /// Global maximum of per-rank partial maxima.
    pub fn max_all<F>(&self, mut partial: F) -> f64
    where
        F: FnMut(Range<usize>) -> f64,
    {
        self.ranges().map(&mut partial).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_split() {
        let p = Partition::contiguous(10, 3).unwrap();
        assert_eq!(p.ranks(), 3);
        assert_eq!(p.range(0), 0..4);
        assert_eq!(p.range(1), 4..7);
        assert_eq!(p.range(2), 7..10);
        assert_eq!(p.len(), 10);
    }

    #[test]
    fn test_more_ranks_than_entries() {
        let p = Partition::contiguous(2, 4).unwrap();
        let sizes: Vec<usize> = p.ranges().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_zero_ranks_rejected() {
        assert!(Partition::contiguous(4, 0).is_err());
        assert!(Partition::from_local_sizes(&[]).is_err());
    }

    #[test]
    fn test_reductions() {
        let data = [1.0, -4.0, 2.0, 3.0];
        let p = Partition::from_local_sizes(&[1, 3]).unwrap();
        let sum = p.sum_all(|r| data[r].iter().sum());
        assert_eq!(sum, 2.0);
        let max = p.max_all(|r| data[r].iter().map(|v: &f64| v.abs()).fold(0.0, f64::max));
        assert_eq!(max, 4.0);
    }
}
