//! Random victim sampling.

use rand::seq::SliceRandom;
use rand::Rng;

/// Absorbs representation error in fractions such as `0.29`, whose product with
/// 100 lands just below 29.
const ROUNDING_SLACK: f64 = 1e-9;

/// Number of victims for `len` candidates at `fraction`, i.e. `floor(len * fraction)`.
pub fn victim_count(len: usize, fraction: f64) -> usize {
    if fraction.is_nan() || fraction <= 0.0 {
        return 0;
    }
    let count = (len as f64 * fraction + ROUNDING_SLACK).floor() as usize;
    count.min(len)
}

/// Pick `floor(len * fraction)` distinct items in uniformly random order.
///
/// Works on a copy; the caller's slice is left untouched.
pub fn random_sample<T, R>(items: &[T], fraction: f64, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let count = victim_count(items.len(), fraction);
    if count == 0 {
        return Vec::new();
    }

    let mut pool = items.to_vec();
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}
