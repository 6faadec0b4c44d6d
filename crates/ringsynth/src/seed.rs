//! Deterministic per-sample seed derivation.
//!
//! Every sample's randomness is keyed by `(base_seed, split_name,
//! sample_index)` through a stable cryptographic hash, so samples can be
//! generated on independent workers, in any order, and still reproduce
//! bit-for-bit.

use sha2::{Digest, Sha256};

/// Derive the 64-bit seed for one sample.
///
/// Hashes the `"{base_seed}_{split_name}_{sample_index}"` byte string with
/// SHA-256 and keeps the first 8 bytes, big-endian. The underscore-joined
/// decimal encoding is part of the on-disk reproducibility contract: a
/// dataset regenerated with the same inputs yields the same seeds.
pub fn derive_sample_seed(base_seed: u64, split_name: &str, sample_index: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(itoa(base_seed));
    hasher.update(b"_");
    hasher.update(split_name.as_bytes());
    hasher.update(b"_");
    hasher.update(itoa(sample_index));
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn itoa(v: u64) -> Vec<u8> {
    v.to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_yield_identical_seeds() {
        let a = derive_sample_seed(42, "train", 0);
        let b = derive_sample_seed(42, "train", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_yield_distinct_seeds() {
        let base = derive_sample_seed(42, "train", 0);
        assert_ne!(base, derive_sample_seed(42, "train", 1));
        assert_ne!(base, derive_sample_seed(42, "val", 0));
        assert_ne!(base, derive_sample_seed(43, "train", 0));
    }

    #[test]
    fn split_name_is_not_confused_with_index_digits() {
        // "1_2" vs "12_" style ambiguity: the underscore separators keep
        // (base=1, split="2_3", idx=4) distinct from (base=1, split="2", idx=34).
        let a = derive_sample_seed(1, "2_3", 4);
        let b = derive_sample_seed(1, "2", 34);
        assert_ne!(a, b);
    }

    #[test]
    fn seeds_spread_over_many_indices() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..10_000u64 {
            seen.insert(derive_sample_seed(42, "train", i));
        }
        assert_eq!(seen.len(), 10_000, "no collisions expected at this scale");
    }
}
