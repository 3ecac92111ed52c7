use std::collections::BTreeMap;
use std::sync::Arc;

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::types::{Amount, TermsParameters};

/// Repayment logic attached to an agreement.
///
/// A terms contract interprets the opaque parameter blob stored on the
/// agreement. Implementations must be pure functions of the parameters.
pub trait TermsContract: Send + Sync {
    fn kind(&self) -> TermsKind;

    /// Total value the debtor is expected to repay over the life of the loan.
    fn expected_repayment_value(&self, params: &TermsParameters)
        -> Result<Amount, DebtMarketError>;

    /// Length of the loan term, in blocks.
    fn term_length(&self, params: &TermsParameters) -> Result<u64, DebtMarketError>;
}

/// Built-in terms contract implementations selectable from deployment config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermsKind {
    FixedSchedule,
}

impl TermsKind {
    pub fn instantiate(self) -> Arc<dyn TermsContract> {
        match self {
            TermsKind::FixedSchedule => Arc::new(FixedScheduleTerms),
        }
    }
}

impl std::fmt::Display for TermsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermsKind::FixedSchedule => f.write_str("fixed_schedule"),
        }
    }
}

/// Terms with a fixed total repayment value and a fixed term length.
///
/// Parameter layout: bytes `0..16` hold the expected repayment value and
/// bytes `16..32` the term length in blocks, both big-endian `u128`. The
/// term length must fit in 64 bits.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedScheduleTerms;

impl FixedScheduleTerms {
    pub fn encode(expected_repayment_value: Amount, term_length: u64) -> TermsParameters {
        let mut raw = [0u8; 32];
        raw[..16].copy_from_slice(&expected_repayment_value.to_be_bytes());
        raw[16..].copy_from_slice(&u128::from(term_length).to_be_bytes());
        TermsParameters(raw)
    }

    fn split(params: &TermsParameters) -> (u128, u128) {
        let mut value = [0u8; 16];
        let mut length = [0u8; 16];
        value.copy_from_slice(&params.0[..16]);
        length.copy_from_slice(&params.0[16..]);
        (u128::from_be_bytes(value), u128::from_be_bytes(length))
    }
}

impl TermsContract for FixedScheduleTerms {
    fn kind(&self) -> TermsKind {
        TermsKind::FixedSchedule
    }

    fn expected_repayment_value(
        &self,
        params: &TermsParameters,
    ) -> Result<Amount, DebtMarketError> {
        Ok(Self::split(params).0)
    }

    fn term_length(&self, params: &TermsParameters) -> Result<u64, DebtMarketError> {
        let (_, length) = Self::split(params);
        u64::try_from(length).map_err(|_| {
            DebtMarketError::InvalidTermsParameters(format!(
                "term length {length} does not fit in 64 bits"
            ))
        })
    }
}

/// Terms contracts known to the kernel, keyed by contract address.
#[derive(Clone, Default)]
pub struct TermsContractRegistry {
    contracts: BTreeMap<Address, Arc<dyn TermsContract>>,
}

impl TermsContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contract` at `address`. Agreements reference their terms by
    /// address only, so an address can never be rebound.
    pub fn register(
        &mut self,
        address: Address,
        contract: Arc<dyn TermsContract>,
    ) -> Result<(), DebtMarketError> {
        if self.contracts.contains_key(&address) {
            return Err(DebtMarketError::TermsContractAlreadyRegistered(address));
        }
        self.contracts.insert(address, contract);
        Ok(())
    }

    pub(crate) fn extend(&mut self, staged: TermsContractRegistry) {
        for (address, contract) in staged.contracts {
            self.contracts.entry(address).or_insert(contract);
        }
    }

    pub fn get(&self, address: &Address) -> Result<&Arc<dyn TermsContract>, DebtMarketError> {
        self.contracts
            .get(address)
            .ok_or(DebtMarketError::UnknownTermsContract(*address))
    }

    pub fn has(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.contracts.keys()
    }
}

impl std::fmt::Debug for TermsContractRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.contracts.iter().map(|(addr, c)| (addr, c.kind())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNIT;

    #[test]
    fn fixed_schedule_decodes_its_encoding() {
        let params = FixedScheduleTerms::encode(11 * UNIT / 10, 43_200);
        let terms = FixedScheduleTerms;
        assert_eq!(terms.expected_repayment_value(&params).unwrap(), 11 * UNIT / 10);
        assert_eq!(terms.term_length(&params).unwrap(), 43_200);
    }

    #[test]
    fn oversized_term_length_is_rejected() {
        let mut raw = [0u8; 32];
        raw[16] = 1;
        let err = FixedScheduleTerms
            .term_length(&TermsParameters(raw))
            .unwrap_err();
        assert!(matches!(err, DebtMarketError::InvalidTermsParameters(_)));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = TermsContractRegistry::new();
        let addr = Address::derive("fixed-schedule");
        registry
            .register(addr, TermsKind::FixedSchedule.instantiate())
            .unwrap();
        assert!(registry.has(&addr));
        assert_eq!(registry.get(&addr).unwrap().kind(), TermsKind::FixedSchedule);

        let missing = Address::derive("other");
        assert_eq!(
            registry.get(&missing).err(),
            Some(DebtMarketError::UnknownTermsContract(missing))
        );
    }

    #[test]
    fn registered_address_cannot_be_rebound() {
        let mut registry = TermsContractRegistry::new();
        let addr = Address::derive("fixed-schedule");
        registry
            .register(addr, TermsKind::FixedSchedule.instantiate())
            .unwrap();
        assert_eq!(
            registry.register(addr, Arc::new(FixedScheduleTerms)),
            Err(DebtMarketError::TermsContractAlreadyRegistered(addr))
        );
        assert_eq!(registry.addresses().count(), 1);
    }
}
