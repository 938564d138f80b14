//! Cryptographic primitives for formula-chain.
//!
//! Wraps SHA-256 hashing and HMAC-SHA256 keyed digests with strong types.
//! Both operate on the canonical payload bytes of a block.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Name recorded in a block's `hmac_alg` field when it carries a tag.
pub const HMAC_ALG: &str = "hmac-sha256";

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 32-byte HMAC-SHA256 tag.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HmacTag(pub [u8; 32]);

impl HmacTag {
    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for HmacTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacTag({}...)", &self.to_hex()[..12])
    }
}

/// Secret key for HMAC-SHA256 block tags.
///
/// The key is never printed; `Debug` only shows its length.
#[derive(Clone)]
pub struct HmacKey(Vec<u8>);

impl HmacKey {
    /// Create a key from raw bytes. Any length is accepted.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC-SHA256 accepts keys of any length")
    }

    /// Compute the tag over `data`.
    pub fn sign(&self, data: &[u8]) -> HmacTag {
        let mut mac = self.mac();
        mac.update(data);
        HmacTag(mac.finalize().into_bytes().into())
    }

    /// Check a tag in constant time.
    pub fn verify(&self, data: &[u8], tag: &HmacTag) -> bool {
        let mut mac = self.mac();
        mac.update(data);
        mac.verify_slice(&tag.0).is_ok()
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey(<{} bytes>)", self.0.len())
    }
}

fn decode_32(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // FIPS 180-2 "abc"
        let h = Sha256Hash::hash(b"abc");
        assert_eq!(
            h.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let key = HmacKey::new(b"Jefe".to_vec());
        let tag = key.sign(b"what do ya want for nothing?");
        assert_eq!(
            tag.to_hex(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert!(key.verify(b"what do ya want for nothing?", &tag));
    }

    #[test]
    fn test_hmac_wrong_key_fails() {
        let tag = HmacKey::new(b"key-a".to_vec()).sign(b"payload");
        assert!(!HmacKey::new(b"key-b".to_vec()).verify(b"payload", &tag));
        assert!(!HmacKey::new(b"key-a".to_vec()).verify(b"payload!", &tag));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = Sha256Hash::hash(b"test data");
        assert_eq!(Sha256Hash::from_hex(&h.to_hex()).unwrap(), h);
        assert!(Sha256Hash::from_hex("abcd").is_err());
        assert!(Sha256Hash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = HmacKey::new(b"super-secret".to_vec());
        let shown = format!("{:?}", key);
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("12 bytes"));
    }
}
