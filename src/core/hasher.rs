//! One-way salted hashing of station hardware identifiers.
//!
//! Privacy guarantee: hardware addresses never leave this module in any
//! recoverable form. Each address is folded through FNV-1a together with a
//! per-boot salt, and only the resulting opaque token is kept. The salt is
//! never persisted, so tokens from different boots cannot be correlated.

use uuid::Uuid;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Per-boot hashing salt.
///
/// Generated once from entropy at startup, held in memory for the lifetime
/// of the process, and intentionally unrecoverable after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt(u32);

impl Salt {
    /// Generate a fresh salt from OS entropy.
    pub fn generate() -> Self {
        let bytes = *Uuid::new_v4().as_bytes();
        Self(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Build a salt from a known value (tests and replay runs).
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }
}

/// Opaque token substituted for a station's hardware address.
///
/// Equality-comparable only; there is no operation mapping a token back to
/// the address it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationToken(String);

impl StationToken {
    /// The 16-digit lowercase hex rendering of the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-way transform from a 6-byte hardware address to a [`StationToken`].
#[derive(Debug, Clone, Copy)]
pub struct SaltedIdentityHasher {
    salt: Salt,
}

impl SaltedIdentityHasher {
    /// Create a hasher bound to the given boot salt.
    pub fn new(salt: Salt) -> Self {
        Self { salt }
    }

    /// Hash a 6-byte hardware address into an opaque token.
    ///
    /// FNV-1a over the address bytes, continued (same running state) over
    /// the four salt bytes in little-endian order.
    pub fn hash(&self, address: &[u8; 6]) -> StationToken {
        let mut state = FNV_OFFSET_BASIS;
        for byte in address {
            state ^= u64::from(*byte);
            state = state.wrapping_mul(FNV_PRIME);
        }
        for byte in self.salt.0.to_le_bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(FNV_PRIME);
        }
        StationToken(format!("{state:016x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    #[test]
    fn test_known_vectors() {
        let hasher = SaltedIdentityHasher::new(Salt::from_raw(0));
        assert_eq!(hasher.hash(&ADDR).as_str(), "a9efa2ee22f2d6aa");

        let hasher = SaltedIdentityHasher::new(Salt::from_raw(0xDEAD_BEEF));
        assert_eq!(hasher.hash(&ADDR).as_str(), "ea5090125fc5544c");

        let hasher = SaltedIdentityHasher::new(Salt::from_raw(0x1234_5678));
        let addr = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        assert_eq!(hasher.hash(&addr).as_str(), "092d86f8960ee6de");
    }

    #[test]
    fn test_deterministic_within_session() {
        let hasher = SaltedIdentityHasher::new(Salt::from_raw(42));
        let first = hasher.hash(&ADDR);
        for _ in 0..10 {
            assert_eq!(hasher.hash(&ADDR), first);
        }
    }

    #[test]
    fn test_token_format() {
        let hasher = SaltedIdentityHasher::new(Salt::generate());
        let token = hasher.hash(&ADDR);
        assert_eq!(token.as_str().len(), 16);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_distinct_salts_diverge() {
        // Different boots must make the same address's token unrelated.
        let mut collisions = 0;
        for i in 0..100u32 {
            let a = SaltedIdentityHasher::new(Salt::from_raw(i.wrapping_mul(0x9E37_79B9)));
            let b = SaltedIdentityHasher::new(Salt::from_raw(
                i.wrapping_mul(0x9E37_79B9).wrapping_add(1),
            ));
            if a.hash(&ADDR) == b.hash(&ADDR) {
                collisions += 1;
            }
        }
        assert_eq!(collisions, 0);
    }

    #[test]
    fn test_token_does_not_embed_address() {
        // The token must not leak the address's own hex rendering.
        let hasher = SaltedIdentityHasher::new(Salt::generate());
        let token = hasher.hash(&ADDR);
        assert!(!token.as_str().contains("aabbcc"));
        assert!(!token.as_str().contains("ddeeff"));
    }
}
