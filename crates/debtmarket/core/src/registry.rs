use std::collections::BTreeMap;

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::overlay::Overlay;
use crate::types::{AgreementId, Amount, BlockContext, TermsParameters};

/// Registered issuance terms of a filled debt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub agreement_id: AgreementId,
    pub issuance_version: Address,
    pub debtor: Address,
    pub underwriter: Address,
    pub underwriter_risk_rating: u128,
    pub terms_contract: Address,
    pub terms_parameters: TermsParameters,
    pub principal_currency: Address,
    pub principal_amount: Amount,
    pub issued_at: BlockContext,
    /// Sum of every repayment routed for this agreement. Only ever grows.
    pub cumulative_repayment: Amount,
}

/// Read access to agreements, committed or staged.
pub trait AgreementSource {
    fn agreement(&self, id: &AgreementId) -> Result<&Agreement, DebtMarketError>;
}

/// Append-only store of agreements keyed by agreement id.
#[derive(Debug, Clone, Default)]
pub struct DebtRegistry {
    agreements: BTreeMap<AgreementId, Agreement>,
}

impl DebtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &AgreementId) -> bool {
        self.agreements.contains_key(id)
    }

    pub fn get_terms(&self, id: &AgreementId) -> Result<&Agreement, DebtMarketError> {
        self.agreements
            .get(id)
            .ok_or(DebtMarketError::UnknownAgreement(*id))
    }

    pub fn len(&self) -> usize {
        self.agreements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agreements.is_empty()
    }

    /// Agreements in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Agreement> {
        self.agreements.values()
    }

    pub(crate) fn view(&self) -> RegistryView<'_> {
        RegistryView {
            overlay: Overlay::new(&self.agreements),
        }
    }

    pub(crate) fn apply(&mut self, staged: BTreeMap<AgreementId, Agreement>) {
        self.agreements.extend(staged);
    }
}

impl AgreementSource for DebtRegistry {
    fn agreement(&self, id: &AgreementId) -> Result<&Agreement, DebtMarketError> {
        self.get_terms(id)
    }
}

/// Staged registry writes inside a transaction.
#[derive(Debug)]
pub(crate) struct RegistryView<'a> {
    overlay: Overlay<'a, AgreementId, Agreement>,
}

impl<'a> RegistryView<'a> {
    pub(crate) fn contains(&self, id: &AgreementId) -> bool {
        self.overlay.contains_key(id)
    }

    pub(crate) fn insert(&mut self, agreement: Agreement) -> Result<(), DebtMarketError> {
        let id = agreement.agreement_id;
        if self.contains(&id) {
            return Err(DebtMarketError::OrderAlreadyFilled(id));
        }
        self.overlay.insert(id, agreement);
        Ok(())
    }

    pub(crate) fn record_repayment(
        &mut self,
        id: &AgreementId,
        amount: Amount,
    ) -> Result<Amount, DebtMarketError> {
        let agreement = self
            .overlay
            .get_mut(id)
            .ok_or(DebtMarketError::UnknownAgreement(*id))?;
        agreement.cumulative_repayment = agreement
            .cumulative_repayment
            .checked_add(amount)
            .ok_or(DebtMarketError::ArithmeticOverflow("cumulative repayment"))?;
        Ok(agreement.cumulative_repayment)
    }

    pub(crate) fn into_staged(self) -> BTreeMap<AgreementId, Agreement> {
        self.overlay.into_staged()
    }
}

impl AgreementSource for RegistryView<'_> {
    fn agreement(&self, id: &AgreementId) -> Result<&Agreement, DebtMarketError> {
        self.overlay
            .get(id)
            .ok_or(DebtMarketError::UnknownAgreement(*id))
    }
}
