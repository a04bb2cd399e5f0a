//! Canonical node-name ordering and bucket assignment.
//!
//! The canonical structure of a revision tree is fixed by a non
//! cryptographic 64-bit FNV-1a hash of each entry name: the Nth byte of the
//! hash (big-endian) picks the entry's bucket at depth N. Because a name
//! always lands in the same bucket at a given depth, two trees holding the
//! same entries always split identically and hash to the same id, which is
//! what makes diffing by subtree-id skipping possible.
//!
//! The per-depth fan-out and leaf size limits are part of that contract and
//! cannot change without changing every tree id:
//!
//! | depth  | buckets | leaf size limit |
//! |--------|---------|-----------------|
//! | 0..=2  | 32      | 512             |
//! | 3..=4  | 8       | 256             |
//! | 5..=6  | 4       | 256             |
//! | 7..    | 2       | 256             |
//!
//! Hashing consumes the name's UTF-16 code units as two octets each,
//! big-endian, sign-extending every octet to 64 bits before the XOR. The
//! sign extension is part of the tree-shape contract: names with octets
//! past 0x7f flip the upper hash bits too.

use std::cmp::Ordering;

const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Number of depth levels the 64-bit hash can address (one byte each).
pub const MAX_BUCKET_DEPTH: usize = 8;

/// The FNV-1a 64-bit hash of a node name.
pub fn name_hash(name: &str) -> u64 {
    let mut hash = FNV64_OFFSET_BASIS;
    for unit in name.encode_utf16() {
        hash = update(hash, (unit >> 8) as u8);
        hash = update(hash, (unit & 0xff) as u8);
    }
    hash
}

fn update(hash: u64, octet: u8) -> u64 {
    (hash ^ (octet as i8 as i64 as u64)).wrapping_mul(FNV64_PRIME)
}

/// Fan-out of a canonical tree node at the given depth index.
pub fn max_buckets_for_level(depth_index: usize) -> u32 {
    match depth_index {
        0..=2 => 32,
        3..=4 => 8,
        5..=6 => 4,
        _ => 2,
    }
}

/// Maximum number of entries a canonical leaf holds at the given depth
/// index before it splits into buckets.
pub fn normalized_size_limit(depth_index: usize) -> usize {
    match depth_index {
        0..=2 => 512,
        _ => 256,
    }
}

/// The bucket index a name hash falls into at the given depth.
///
/// Defined for depths `0..MAX_BUCKET_DEPTH`; deeper levels have no bucket
/// and the entry stays where it is.
pub fn bucket(name_hash: u64, depth_index: usize) -> Option<u8> {
    if depth_index >= MAX_BUCKET_DEPTH {
        return None;
    }
    let byte_n = u32::from(hash_byte(name_hash, depth_index));
    let max_buckets = max_buckets_for_level(depth_index);
    Some(((byte_n * max_buckets) / 256) as u8)
}

/// Total canonical order over `(hash, name)` pairs: bucket sequence first,
/// plain name comparison as the tie-break for names that share every bucket.
pub fn compare(hash_a: u64, name_a: &str, hash_b: u64, name_b: &str) -> Ordering {
    for depth in 0..MAX_BUCKET_DEPTH {
        match bucket(hash_a, depth).cmp(&bucket(hash_b, depth)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    name_a.cmp(name_b)
}

/// Compare two names in canonical order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    compare(name_hash(a), a, name_hash(b), b)
}

/// The Nth byte (big-endian) of a name hash.
fn hash_byte(name_hash: u64, depth_index: usize) -> u8 {
    assert!(depth_index < MAX_BUCKET_DEPTH, "depth too deep: {depth_index}");
    (name_hash >> (8 * (7 - depth_index))) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(name_hash("points/1"), name_hash("points/1"));
        assert_ne!(name_hash("points/1"), name_hash("points/2"));
    }

    #[test]
    fn empty_name_hashes_to_offset_basis() {
        assert_eq!(name_hash(""), FNV64_OFFSET_BASIS);
    }

    #[test]
    fn high_octets_are_sign_extended() {
        // "é" is UTF-16 0x00E9; its low octet has the high bit set.
        let name = "é";
        let mut sign_extended = FNV64_OFFSET_BASIS;
        let mut zero_extended = FNV64_OFFSET_BASIS;
        for unit in name.encode_utf16() {
            for octet in [(unit >> 8) as u8, (unit & 0xff) as u8] {
                sign_extended =
                    (sign_extended ^ (octet as i8 as i64 as u64)).wrapping_mul(FNV64_PRIME);
                zero_extended = (zero_extended ^ u64::from(octet)).wrapping_mul(FNV64_PRIME);
            }
        }
        assert_eq!(name_hash(name), sign_extended);
        assert_ne!(name_hash(name), zero_extended);
    }

    #[test]
    fn ascii_names_are_unaffected_by_sign_extension() {
        // Every octet of an ASCII name stays below 0x80, where zero and
        // sign extension agree.
        let mut zero_extended = FNV64_OFFSET_BASIS;
        for unit in "roads/f1".encode_utf16() {
            for octet in [(unit >> 8) as u8, (unit & 0xff) as u8] {
                zero_extended = (zero_extended ^ u64::from(octet)).wrapping_mul(FNV64_PRIME);
            }
        }
        assert_eq!(name_hash("roads/f1"), zero_extended);
    }

    #[test]
    fn bucket_tables_match_contract() {
        for depth in 0..=2 {
            assert_eq!(max_buckets_for_level(depth), 32);
            assert_eq!(normalized_size_limit(depth), 512);
        }
        for depth in 3..=4 {
            assert_eq!(max_buckets_for_level(depth), 8);
            assert_eq!(normalized_size_limit(depth), 256);
        }
        for depth in 5..=6 {
            assert_eq!(max_buckets_for_level(depth), 4);
        }
        assert_eq!(max_buckets_for_level(7), 2);
        assert_eq!(max_buckets_for_level(100), 2);
        assert_eq!(normalized_size_limit(100), 256);
    }

    #[test]
    fn bucket_is_within_fanout() {
        for name in ["a", "b", "some/longer/name", "f4711"] {
            let hash = name_hash(name);
            for depth in 0..MAX_BUCKET_DEPTH {
                let b = bucket(hash, depth).unwrap();
                assert!(u32::from(b) < max_buckets_for_level(depth));
            }
        }
    }

    #[test]
    fn bucket_past_max_depth_is_none() {
        assert_eq!(bucket(name_hash("x"), MAX_BUCKET_DEPTH), None);
    }

    #[test]
    fn buckets_cover_full_fanout() {
        // 4096 sequential names must spread over all 32 root buckets.
        let mut seen = [false; 32];
        for i in 0..4096 {
            let b = bucket(name_hash(&format!("f{i}")), 0).unwrap();
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn compare_is_total_and_antisymmetric() {
        let names = ["a", "b", "c", "f1", "f2", "roads/123"];
        for x in &names {
            assert_eq!(compare_names(x, x), Ordering::Equal);
            for y in &names {
                if x != y {
                    assert_ne!(compare_names(x, y), Ordering::Equal);
                    assert_eq!(compare_names(x, y), compare_names(y, x).reverse());
                }
            }
        }
    }

    #[test]
    fn equal_buckets_fall_back_to_name_order() {
        // Same name means same hash, so tie-break path must be hit.
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }
}
