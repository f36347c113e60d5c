//! Seeded shuffling and contiguous-range partitioning.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use vision_core::{DataSplit, Sample, SplitRatios};

/// Items divided into the three splits
#[derive(Debug, Clone)]
pub struct Partition<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub test: Vec<T>,
}

/// Decoded samples divided into the three splits
pub type PartitionedSamples = Partition<Sample>;

impl<T> Partition<T> {
    pub fn get(&self, split: DataSplit) -> &[T] {
        match split {
            DataSplit::Train => &self.train,
            DataSplit::Validation => &self.validation,
            DataSplit::Test => &self.test,
        }
    }

    /// Sizes as `[train, validation, test]`
    pub fn sizes(&self) -> [usize; 3] {
        [self.train.len(), self.validation.len(), self.test.len()]
    }

    pub fn total(&self) -> usize {
        self.sizes().iter().sum()
    }
}

/// Boundary indices `(idx_val, idx_test)` for `n` shuffled items.
///
/// Both are truncated products computed in `f64`, so the split sizes only
/// approximate the ratios.
pub fn split_bounds(n: usize, ratios: SplitRatios) -> (usize, usize) {
    let idx_val = ((ratios.train * n as f64) as usize).min(n);
    let idx_test = (((ratios.train + ratios.validation) * n as f64) as usize).clamp(idx_val, n);
    (idx_val, idx_test)
}

/// Seed used when none is configured
pub fn entropy_seed() -> u64 {
    rand::random()
}

/// Shuffles `items` with a `ChaCha8Rng` seeded by `seed`, then cuts the
/// sequence into train, validation and test ranges.
pub fn partition<T>(mut items: Vec<T>, ratios: SplitRatios, seed: u64) -> Partition<T> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let (idx_val, idx_test) = split_bounds(items.len(), ratios);
    debug!(
        "Partitioning {} items at [{}, {}) with seed {}",
        items.len(),
        idx_val,
        idx_test,
        seed
    );

    let test = items.split_off(idx_test);
    let validation = items.split_off(idx_val);

    Partition {
        train: items,
        validation,
        test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_ratios_on_200_items() {
        let part = partition((0..200).collect::<Vec<_>>(), SplitRatios::default(), 42);
        assert_eq!(part.sizes(), [140, 30, 30]);
    }

    #[test]
    fn test_bounds_truncate() {
        assert_eq!(split_bounds(10, SplitRatios::new(0.7, 0.15)), (7, 8));
        assert_eq!(split_bounds(3, SplitRatios::new(0.5, 0.5)), (1, 3));
        assert_eq!(split_bounds(0, SplitRatios::default()), (0, 0));
    }

    #[test]
    fn test_empty_splits_are_legal() {
        let part = partition((0..10).collect::<Vec<_>>(), SplitRatios::new(1.0, 0.0), 1);
        assert_eq!(part.sizes(), [10, 0, 0]);

        let part = partition((0..10).collect::<Vec<_>>(), SplitRatios::new(0.0, 0.0), 1);
        assert_eq!(part.sizes(), [0, 0, 10]);

        let part = partition(Vec::<u32>::new(), SplitRatios::default(), 1);
        assert_eq!(part.total(), 0);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let a = partition((0..500).collect::<Vec<_>>(), SplitRatios::default(), 7);
        let b = partition((0..500).collect::<Vec<_>>(), SplitRatios::default(), 7);
        assert_eq!(a.train, b.train);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.test, b.test);

        let c = partition((0..500).collect::<Vec<_>>(), SplitRatios::default(), 8);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_every_item_in_exactly_one_split() {
        let part = partition((0..321).collect::<Vec<_>>(), SplitRatios::new(0.6, 0.25), 3);
        assert_eq!(part.total(), 321);

        let mut seen = HashSet::new();
        for split in DataSplit::ALL {
            for item in part.get(split) {
                assert!(seen.insert(*item), "item {item} appears twice");
            }
        }
        assert_eq!(seen.len(), 321);
    }
}
