//! # debtmarket-crypto
//!
//! Cryptographic primitives shared by the DebtMarket settlement protocol:
//!
//! - **Address**: a party's 32-byte Ed25519 verifying key, or a derived
//!   identifier for protocol objects (kernel, router, pools, currencies)
//! - **Hash256**: BLAKE3-256 digest used for commitment hashes and ledger chaining
//! - **OrderSigner / SignatureTriple**: `(v, r, s)` signatures over a
//!   prefixed message digest, checked by [`verify_signature`]

#![deny(unsafe_code)]

pub mod address;
pub mod error;
pub mod hash;
pub mod signature;

pub use address::Address;
pub use error::CryptoError;
pub use hash::{hex32, parse_bytes32, Hash256};
pub use signature::{
    signed_message_digest, verify_signature, OrderSigner, SignatureTriple, SIGNATURE_V,
    SIGNED_MESSAGE_PREFIX,
};
