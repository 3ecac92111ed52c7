use chrono::{DateTime, Utc};
use debtmarket_crypto::{hex32, Hash256};
use serde::{Deserialize, Serialize};

/// Token amount in base units of its currency (e.g. 10^-18 of a whole unit).
///
/// Unsigned by construction, so negative principal, fee or repayment
/// amounts cannot be expressed.
pub type Amount = u128;

/// Base units in one whole currency unit.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Agreement identifier: the hash of the order's issuance commitment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub Hash256);

/// Debt tokens are identified by the agreement they claim.
pub type TokenId = AgreementId;

impl AgreementId {
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        self.0.to_hex()[..10].to_string()
    }
}

impl std::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AgreementId({})", self.short())
    }
}

impl std::str::FromStr for AgreementId {
    type Err = debtmarket_crypto::CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Hash256>().map(Self)
    }
}

/// Opaque, fixed-size terms-contract parameter blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TermsParameters(#[serde(with = "hex32")] pub [u8; 32]);

impl TermsParameters {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for TermsParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TermsParameters({})", Hash256(self.0))
    }
}

/// Position of the ledger platform: block height and block timestamp (unix seconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
}

impl BlockContext {
    pub fn new(number: u64, timestamp: u64) -> Self {
        Self { number, timestamp }
    }

    /// Block context at the given height stamped with the system clock.
    pub fn from_system_clock(number: u64) -> Self {
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        Self { number, timestamp }
    }

    /// A later block, `blocks` and `seconds` ahead of this one.
    pub fn advanced(&self, blocks: u64, seconds: u64) -> Self {
        Self {
            number: self.number.saturating_add(blocks),
            timestamp: self.timestamp.saturating_add(seconds),
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.timestamp).ok()?, 0)
    }
}
