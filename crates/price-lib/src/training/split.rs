//! Deterministic train/test partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle `0..n` with a seeded RNG and cut off `ceil(n * test_fraction)`
/// rows for testing. Both partitions are kept non-empty when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let fraction = test_fraction.clamp(0.0, 1.0);
    let mut test_len = (n as f64 * fraction).ceil() as usize;
    if n >= 2 {
        test_len = test_len.clamp(1, n - 1);
    }

    let train = indices.split_off(test_len);
    (train, indices)
}
