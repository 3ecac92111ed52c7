use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// BLAKE3-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(#[serde(with = "hex32")] pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn digest(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Hash several byte slices as one concatenated message.
    pub fn digest_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl std::str::FromStr for Hash256 {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytes32(s).map(Self)
    }
}

/// Parse a 32-byte value from hex, with or without a `0x` prefix.
pub fn parse_bytes32(text: &str) -> Result<[u8; 32], CryptoError> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    let raw = hex::decode(stripped).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    raw.try_into().map_err(|raw: Vec<u8>| CryptoError::InvalidLength {
        expected: 32,
        actual: raw.len(),
    })
}

/// Serde adapter encoding `[u8; 32]` as a `0x`-prefixed hex string.
pub mod hex32 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_bytes32(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_parts_matches_concatenation() {
        let whole = Hash256::digest(b"issuance-commitment");
        let parts = Hash256::digest_parts(&[b"issuance", b"-", b"commitment"]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn hex_roundtrip_with_and_without_prefix() {
        let h = Hash256::digest(b"x");
        let with_prefix: Hash256 = h.to_hex().parse().unwrap();
        let without: Hash256 = h.to_hex()[2..].parse().unwrap();
        assert_eq!(h, with_prefix);
        assert_eq!(h, without);
    }

    #[test]
    fn rejects_short_input() {
        let err = parse_bytes32("0xabcd").unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&Hash256::ZERO).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "00".repeat(32)));
    }
}
