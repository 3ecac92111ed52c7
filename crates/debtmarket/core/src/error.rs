use debtmarket_crypto::Address;
use thiserror::Error;

use crate::order::OrderRole;
use crate::types::{AgreementId, Amount, TokenId};

/// Errors surfaced by protocol operations.
///
/// Every operation is all-or-nothing: when one of these is returned, no
/// balance, registry, token, pool or ledger state has changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebtMarketError {
    // --- Order filling ---
    #[error("invalid {role} signature")]
    InvalidSignature { role: OrderRole },

    #[error("order expired at {expiration} (block time {now})")]
    OrderExpired { expiration: u64, now: u64 },

    #[error("order already filled: agreement {0}")]
    OrderAlreadyFilled(AgreementId),

    #[error("order cancelled: agreement {0}")]
    OrderCancelled(AgreementId),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    // --- Value transfer ---
    #[error("insufficient funds: {holder} holds {available} of {currency}, needs {required}")]
    InsufficientFunds {
        holder: Address,
        currency: Address,
        required: Amount,
        available: Amount,
    },

    #[error("transfer agent {0} is not authorized")]
    UnauthorizedTransferAgent(Address),

    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Address, actual: Address },

    // --- Registry / token ---
    #[error("unknown agreement {0}")]
    UnknownAgreement(AgreementId),

    #[error("unknown token {0}")]
    UnknownToken(TokenId),

    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },

    #[error("invalid recipient {0}")]
    InvalidRecipient(Address),

    // --- Terms contracts ---
    #[error("unknown terms contract {0}")]
    UnknownTermsContract(Address),

    #[error("terms contract {0} is already registered")]
    TermsContractAlreadyRegistered(Address),

    #[error("invalid terms parameters: {0}")]
    InvalidTermsParameters(String),

    // --- Pools ---
    #[error("unknown pool {0}")]
    UnknownPool(Address),

    #[error("pool {0} is no longer accepting investment")]
    PoolSubscriptionClosed(Address),

    // --- Infrastructure ---
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DebtMarketError {
    pub fn unauthorized(caller: Address, action: &'static str) -> Self {
        Self::Unauthorized { caller, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debtmarket_crypto::Hash256;

    #[test]
    fn insufficient_funds_display() {
        let err = DebtMarketError::InsufficientFunds {
            holder: Address::derive("creditor"),
            currency: Address::derive("REP"),
            required: 1_000,
            available: 250,
        };
        let s = err.to_string();
        assert!(s.contains("1000"));
        assert!(s.contains("250"));
    }

    #[test]
    fn signature_error_names_role() {
        let err = DebtMarketError::InvalidSignature {
            role: OrderRole::Underwriter,
        };
        assert_eq!(err.to_string(), "invalid underwriter signature");
    }

    #[test]
    fn already_filled_carries_id() {
        let id = AgreementId(Hash256::digest(b"a"));
        assert!(DebtMarketError::OrderAlreadyFilled(id)
            .to_string()
            .contains(&id.to_string()));
    }
}
