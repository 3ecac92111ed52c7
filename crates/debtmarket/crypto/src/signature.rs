use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::CryptoError;
use crate::hash::{hex32, parse_bytes32, Hash256};

/// Scheme tag carried in the `v` slot of every signature triple.
pub const SIGNATURE_V: u8 = 0x1b;

/// Prefix mixed into every signed digest so a protocol hash can never be
/// replayed as a signature over some other 32-byte message.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19DebtMarket Signed Message:\n32";

/// A `(v, r, s)` signature.
///
/// `r` and `s` are the two 32-byte halves (R, S) of an Ed25519 signature.
/// `v` must equal [`SIGNATURE_V`].
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureTriple {
    pub v: u8,
    #[serde(with = "hex32")]
    pub r: [u8; 32],
    #[serde(with = "hex32")]
    pub s: [u8; 32],
}

impl SignatureTriple {
    /// An empty slot, used when a role is not required to sign.
    pub const EMPTY: SignatureTriple = SignatureTriple {
        v: 0,
        r: [0u8; 32],
        s: [0u8; 32],
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    fn to_signature(self) -> Signature {
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&self.r);
        raw[32..].copy_from_slice(&self.s);
        Signature::from_bytes(&raw)
    }
}

impl Default for SignatureTriple {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for SignatureTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SignatureTriple(v={:#04x}, r=0x{}.., s=0x{}..)",
            self.v,
            hex::encode(&self.r[..4]),
            hex::encode(&self.s[..4])
        )
    }
}

/// Digest actually signed for a protocol hash.
pub fn signed_message_digest(hash: &Hash256) -> Hash256 {
    Hash256::digest_parts(&[SIGNED_MESSAGE_PREFIX, hash.as_bytes()])
}

/// Check that `signature` over `hash` was produced by the key behind `signer`.
///
/// Never panics: a null signer, wrong scheme tag, malformed key or malformed
/// signature all verify as `false`.
pub fn verify_signature(hash: &Hash256, signature: &SignatureTriple, signer: &Address) -> bool {
    if signature.v != SIGNATURE_V || signer.is_null() {
        return false;
    }
    let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    key.verify_strict(
        signed_message_digest(hash).as_bytes(),
        &signature.to_signature(),
    )
    .is_ok()
}

/// Signing identity of an order party.
pub struct OrderSigner {
    key: SigningKey,
}

impl OrderSigner {
    /// Deterministic signer from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parse a signer from a hex-encoded 32-byte secret.
    pub fn from_hex(secret: &str) -> Result<Self, CryptoError> {
        parse_bytes32(secret).map(Self::from_seed)
    }

    /// Fresh signer from the OS random source.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn address(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    /// Hex-encoded secret seed.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }

    /// Sign a protocol hash, producing a `(v, r, s)` triple.
    pub fn sign_hash(&self, hash: &Hash256) -> SignatureTriple {
        let signature = self.key.sign(signed_message_digest(hash).as_bytes());
        let raw = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&raw[..32]);
        s.copy_from_slice(&raw[32..]);
        SignatureTriple {
            v: SIGNATURE_V,
            r,
            s,
        }
    }
}

impl std::fmt::Debug for OrderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signer(seed: u8) -> OrderSigner {
        OrderSigner::from_seed([seed; 32])
    }

    #[test]
    fn sign_and_verify() {
        let alice = signer(1);
        let hash = Hash256::digest(b"debt order");
        let sig = alice.sign_hash(&hash);
        assert_eq!(sig.v, SIGNATURE_V);
        assert!(verify_signature(&hash, &sig, &alice.address()));
    }

    #[test]
    fn rejects_wrong_signer() {
        let alice = signer(1);
        let bob = signer(2);
        let hash = Hash256::digest(b"debt order");
        let sig = alice.sign_hash(&hash);
        assert!(!verify_signature(&hash, &sig, &bob.address()));
    }

    #[test]
    fn rejects_wrong_scheme_tag() {
        let alice = signer(1);
        let hash = Hash256::digest(b"debt order");
        let mut sig = alice.sign_hash(&hash);
        sig.v = SIGNATURE_V + 1;
        assert!(!verify_signature(&hash, &sig, &alice.address()));
    }

    #[test]
    fn rejects_empty_slot_and_null_signer() {
        let hash = Hash256::digest(b"debt order");
        assert!(!verify_signature(&hash, &SignatureTriple::EMPTY, &signer(1).address()));
        let sig = signer(1).sign_hash(&hash);
        assert!(!verify_signature(&hash, &sig, &Address::NULL));
    }

    #[test]
    fn raw_hash_signature_does_not_verify() {
        // A signature over the unprefixed hash must not be accepted.
        let alice = signer(3);
        let hash = Hash256::digest(b"debt order");
        let raw = alice.key.sign(hash.as_bytes()).to_bytes();
        let mut sig = SignatureTriple {
            v: SIGNATURE_V,
            ..SignatureTriple::EMPTY
        };
        sig.r.copy_from_slice(&raw[..32]);
        sig.s.copy_from_slice(&raw[32..]);
        assert!(!verify_signature(&hash, &sig, &alice.address()));
    }

    #[test]
    fn from_hex_matches_seed() {
        let a = signer(9);
        let b = OrderSigner::from_hex(&a.secret_hex()).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn triple_json_roundtrip() {
        let sig = signer(4).sign_hash(&Hash256::digest(b"m"));
        let json = serde_json::to_string(&sig).unwrap();
        let back: SignatureTriple = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    proptest! {
        #[test]
        fn property_any_other_hash_fails(
            msg in proptest::collection::vec(any::<u8>(), 0..64),
            flip in 0usize..32,
        ) {
            let alice = signer(7);
            let hash = Hash256::digest(&msg);
            let sig = alice.sign_hash(&hash);
            let mut tampered = hash;
            tampered.0[flip] ^= 0x01;
            prop_assert!(verify_signature(&hash, &sig, &alice.address()));
            prop_assert!(!verify_signature(&tampered, &sig, &alice.address()));
        }
    }
}
