use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hash::{hex32, parse_bytes32, Hash256};

const DERIVATION_DOMAIN: &[u8] = b"debtmarket.address.v1";

/// A 32-byte protocol address.
///
/// For signing parties this is the raw Ed25519 verifying key, so a signature
/// can be checked against the address directly. Protocol objects that never
/// sign (kernel, router, pools, currencies, terms contracts) use addresses
/// derived from a label with [`Address::derive`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(#[serde(with = "hex32")] pub [u8; 32]);

impl Address {
    /// The null address: "no party" (unnamed underwriter, relayer, unfilled creditor).
    pub const NULL: Address = Address([0u8; 32]);

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Derive a deterministic address from a human label.
    pub fn derive(label: &str) -> Self {
        Self::derive_parts(&[label.as_bytes()])
    }

    /// Derive a deterministic address from several byte components.
    pub fn derive_parts(parts: &[&[u8]]) -> Self {
        let mut material: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        material.push(DERIVATION_DOMAIN);
        material.extend_from_slice(parts);
        Self(Hash256::digest_parts(&material).0)
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl std::str::FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytes32(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_address_is_null() {
        assert!(Address::NULL.is_null());
        assert!(Address::default().is_null());
        assert!(!Address::derive("debt-kernel").is_null());
    }

    #[test]
    fn derivation_is_deterministic_and_label_sensitive() {
        assert_eq!(Address::derive("debt-kernel"), Address::derive("debt-kernel"));
        assert_ne!(Address::derive("debt-kernel"), Address::derive("debt-token"));
    }

    #[test]
    fn derive_is_domain_separated_from_plain_hash() {
        let plain = Hash256::digest(b"debt-kernel");
        assert_ne!(Address::derive("debt-kernel").0, plain.0);
    }

    #[test]
    fn parses_display_form() {
        let a = Address::derive("repayment-router");
        let parsed: Address = a.to_string().parse().unwrap();
        assert_eq!(a, parsed);
    }

    #[test]
    fn json_is_hex_string() {
        let a = Address::derive("x");
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
