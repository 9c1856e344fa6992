//! Deterministic Fisher-Yates shuffling shared by committee sampling and
//! plaintext deck dealing. Both need "random-looking but replay-stable"
//! permutations; a SHA-256 counter stream is simpler than threading an RNG
//! object through the dispatcher and is trivially reproducible from the
//! same seed bytes on every node.

use sha2::{Digest, Sha256};

fn keystream_u64(seed: &[u8], counter: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(counter.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is 32 bytes"))
}

/// `0..n` permuted by Fisher-Yates using `seed` as the sole source of
/// randomness. Deterministic: the same seed and `n` always yield the same
/// permutation.
pub fn shuffled_indices(seed: &[u8], n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut counter = 0u64;
    for i in (1..n).rev() {
        let j = (keystream_u64(seed, counter) % (i as u64 + 1)) as usize;
        counter += 1;
        indices.swap(i, j);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_permutation() {
        let a = shuffled_indices(b"seed", 52);
        let b = shuffled_indices(b"seed", 52);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = shuffled_indices(b"seed-one", 52);
        let b = shuffled_indices(b"seed-two", 52);
        assert_ne!(a, b);
    }

    #[test]
    fn permutation_covers_every_index_exactly_once() {
        let mut perm = shuffled_indices(b"x", 9);
        perm.sort_unstable();
        assert_eq!(perm, (0..9).collect::<Vec<_>>());
    }
}
