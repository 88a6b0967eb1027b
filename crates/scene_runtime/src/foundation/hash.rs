//! Stable name hashing
//!
//! Message and input action identifiers are 64-bit FNV-1a hashes of their
//! string names. The hash is deterministic across runs and platforms, so
//! identifiers can be computed at compile time with `const` contexts.

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Hash a name with the FNV-1a 64-bit algorithm.
#[must_use]
pub const fn hash_name(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_name("test"), hash_name("test"));
    }

    #[test]
    fn distinct_names_hash_differently() {
        assert_ne!(hash_name("spin"), hash_name("stop"));
    }

    #[test]
    fn empty_name_hashes_to_offset_basis() {
        assert_eq!(hash_name(""), 0xcbf2_9ce4_8422_2325);
    }
}
