//! Index permutations and sampling
//!
//! Everything here works on row indices; callers apply the indices to
//! features and outputs together so labels stay attached to their rows.

use rand::seq::{index, SliceRandom};
use rand::Rng;

/// A uniformly random permutation of `0..n`
pub fn permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}

/// `amount` distinct elements of `pool`, kept in their original order
///
/// Takes the whole pool when `amount` exceeds its length.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    pool: &[usize],
    amount: usize,
    rng: &mut R,
) -> Vec<usize> {
    let amount = amount.min(pool.len());
    let mut picked: Vec<usize> = index::sample(rng, pool.len(), amount).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| pool[i]).collect()
}

/// `amount` elements of `pool` drawn independently, duplicates allowed
pub fn sample_with_replacement<R: Rng + ?Sized>(
    pool: &[usize],
    amount: usize,
    rng: &mut R,
) -> Vec<usize> {
    if pool.is_empty() {
        return Vec::new();
    }
    (0..amount).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Seed;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn test_permutation_is_deterministic() {
        let a = permutation(50, &mut Seed::new(3).to_rng());
        let b = permutation(50, &mut Seed::new(3).to_rng());
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_without_replacement() {
        let pool = vec![10, 20, 30, 40, 50];
        let picked = sample_without_replacement(&pool, 3, &mut Seed::new(1).to_rng());
        assert_eq!(picked.len(), 3);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|v| pool.contains(v)));

        let all = sample_without_replacement(&pool, 10, &mut Seed::new(1).to_rng());
        assert_eq!(all, pool);
    }

    #[test]
    fn test_sample_with_replacement() {
        let pool = vec![7];
        let picked = sample_with_replacement(&pool, 4, &mut Seed::new(1).to_rng());
        assert_eq!(picked, vec![7, 7, 7, 7]);
        assert!(sample_with_replacement(&[], 4, &mut Seed::new(1).to_rng()).is_empty());
    }

    #[test_case(5, 0, 0 ; "nothing")]
    #[test_case(5, 2, 2 ; "part of the pool")]
    #[test_case(5, 5, 5 ; "whole pool")]
    #[test_case(0, 3, 0 ; "empty pool")]
    fn test_sample_without_replacement_len(pool: usize, amount: usize, expected: usize) {
        let pool: Vec<usize> = (0..pool).collect();
        let picked = sample_without_replacement(&pool, amount, &mut Seed::new(9).to_rng());
        assert_eq!(picked.len(), expected);
    }

    proptest! {
        #[test]
        fn prop_permutation_covers_every_index(n in 0usize..200, seed in any::<u64>()) {
            let mut perm = permutation(n, &mut Seed::new(seed).to_rng());
            perm.sort_unstable();
            prop_assert_eq!(perm, (0..n).collect::<Vec<_>>());
        }
    }
}
