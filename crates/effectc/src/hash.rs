use xxhash_rust::xxh3::xxh3_128;

/// Produces the digest used to key cached descriptors.
pub trait ContentHasher: Send + Sync {
    fn digest(&self, bytes: &[u8]) -> String;
}

/// 128-bit XXH3 rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Hasher;

impl ContentHasher for Xxh3Hasher {
    fn digest(&self, bytes: &[u8]) -> String {
        format!("{:032x}", xxh3_128(bytes))
    }
}
