//! FNV-1a hashing for export identifier candidates

/// FNV-1a 64-bit offset basis
pub const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit prime
pub const FNV1A_PRIME: u64 = 0x100000001b3;

/// Compute FNV-1a 64-bit hash of a byte slice
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    fnv1a_extend(FNV1A_OFFSET_BASIS, data)
}

fn fnv1a_extend(mut hash: u64, data: &[u8]) -> u64 {
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME);
    }
    hash
}

/// Hash of an asset's stable identity: file identity, a separator, then the
/// little-endian path id. Independent of load order and run.
pub fn key_hash(identity: &str, path_id: i64) -> u64 {
    let hash = fnv1a_extend(FNV1A_OFFSET_BASIS, identity.as_bytes());
    let hash = fnv1a_extend(hash, &[0]);
    fnv1a_extend(hash, &path_id.to_le_bytes())
}
