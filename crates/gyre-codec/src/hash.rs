//! FNV-1a hashing for layout fingerprints.
//!
//! Not cryptographic. The fingerprint only has to change when the
//! traversal order or slot structure changes.

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Incremental FNV-1a state.
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Self(FNV_OFFSET)
    }
}

impl Fnv1a {
    /// Fresh state at the offset basis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes.
    #[inline]
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        for &b in bytes {
            self.0 = (self.0 ^ b as u64).wrapping_mul(FNV_PRIME);
        }
        self
    }

    /// Feed a u32 as 4 LE bytes.
    #[inline]
    pub fn u32(self, v: u32) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    /// Feed a u64 as 8 LE bytes.
    #[inline]
    pub fn u64(self, v: u64) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    /// Current hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}
