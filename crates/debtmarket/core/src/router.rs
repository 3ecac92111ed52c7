use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DebtMarketError;
use crate::ledger::ProtocolEvent;
use crate::pool;
use crate::registry::AgreementSource;
use crate::terms::TermsContractRegistry;
use crate::transaction::Transaction;
use crate::types::{AgreementId, Amount};

/// One routed repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRecord {
    pub agreement_id: AgreementId,
    pub payer: Address,
    pub beneficiary: Address,
    pub amount: Amount,
    pub currency: Address,
    pub block: u64,
    pub timestamp: u64,
}

/// Repayment status of an agreement against its terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentProgress {
    pub expected: Amount,
    pub repaid: Amount,
    /// `expected - repaid`, floored at zero.
    pub outstanding: Amount,
}

impl RepaymentProgress {
    pub fn is_fully_repaid(&self) -> bool {
        self.outstanding == 0
    }
}

/// Routes repayments from payers to whoever currently holds the debt token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaymentRouter {
    address: Address,
}

impl RepaymentRouter {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Move `amount` from `payer` to the agreement's current holder.
    ///
    /// No over- or under-payment check is made; the amount is recorded as
    /// given. A zero amount is accepted.
    pub(crate) fn repay(
        &self,
        tx: &mut Transaction<'_>,
        payer: Address,
        agreement_id: &AgreementId,
        amount: Amount,
        currency: Address,
    ) -> Result<RepaymentRecord, DebtMarketError> {
        let expected_currency = tx.registry.agreement(agreement_id)?.principal_currency;
        if currency != expected_currency {
            return Err(DebtMarketError::CurrencyMismatch {
                expected: expected_currency,
                actual: currency,
            });
        }

        let beneficiary = tx.tokens.owner_of(agreement_id)?;
        let proxy = tx.proxy;
        tx.balances
            .transfer_via(proxy, self.address, currency, payer, beneficiary, amount)?;
        let cumulative = tx.registry.record_repayment(agreement_id, amount)?;

        debug!(
            agreement_id = %agreement_id,
            %payer,
            %beneficiary,
            amount,
            cumulative,
            "repayment routed"
        );

        let record = RepaymentRecord {
            agreement_id: *agreement_id,
            payer,
            beneficiary,
            amount,
            currency,
            block: tx.block.number,
            timestamp: tx.block.timestamp,
        };
        tx.emit(ProtocolEvent::Repayment(record.clone()));

        if tx.is_pool(&beneficiary) {
            pool::receive_proceeds(tx, beneficiary, agreement_id, amount)?;
        }
        Ok(record)
    }
}

pub fn repayment_progress(
    agreements: &impl AgreementSource,
    terms: &TermsContractRegistry,
    agreement_id: &AgreementId,
) -> Result<RepaymentProgress, DebtMarketError> {
    let agreement = agreements.agreement(agreement_id)?;
    let expected = terms
        .get(&agreement.terms_contract)?
        .expected_repayment_value(&agreement.terms_parameters)?;
    let repaid = agreement.cumulative_repayment;
    Ok(RepaymentProgress {
        expected,
        repaid,
        outstanding: expected.saturating_sub(repaid),
    })
}
