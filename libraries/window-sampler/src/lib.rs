//! Deterministic random sampling of an exact number of items from a
//! candidate pool.
//!
//! The seed is derived from the candidates themselves, so the same pool
//! always produces the same sample. This keeps selection reproducible
//! without threading an RNG through callers: a scheduler asked twice about
//! the same pool picks the same items, while a pool that differs by even
//! one member samples afresh.
//!
//! # Example
//!
//! ```
//! use window_sampler::sample_exact;
//!
//! let pool = vec![10u64, 20, 30, 40, 50];
//! let picked = sample_exact(pool.clone(), 3, |id| *id);
//! assert_eq!(picked.len(), 3);
//! assert_eq!(picked, sample_exact(pool, 3, |id| *id));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Sample exactly `count` items from `items`, or all of them if the pool is
/// smaller than `count`. Surviving items keep their original relative order.
///
/// # Arguments
///
/// * `items` - The candidate pool
/// * `count` - How many items to keep
/// * `key_fn` - Extracts a hashable key from each item; the combined keys
///   seed the RNG, making the sample a pure function of the pool contents
pub fn sample_exact<T, K, F>(items: Vec<T>, count: usize, key_fn: F) -> Vec<T>
where
    K: Hash,
    F: Fn(&T) -> K,
{
    if items.len() <= count {
        return items;
    }

    let mut hasher = DefaultHasher::new();
    for item in &items {
        key_fn(item).hash(&mut hasher);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(hasher.finish());

    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.shuffle(&mut rng);
    let mut kept: Vec<usize> = indices.into_iter().take(count).collect();
    kept.sort_unstable();

    let mut kept_iter = kept.into_iter().peekable();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            if kept_iter.peek() == Some(&i) {
                kept_iter.next();
                Some(item)
            } else {
                None
            }
        })
        .collect()
}
