use sha1::{Digest, Sha1};

/// Derive the 64-bit addressing key for a cache key.
///
/// SHA-1 over the UTF-8 bytes of the key, first eight digest bytes read as a
/// little-endian integer. The same value is the index set member and the basis
/// of the entry file name.
pub fn hash(key: &str) -> u64 {
    let digest = Sha1::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}
