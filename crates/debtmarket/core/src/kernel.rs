//! Debt kernel: turns signed debt orders into registered agreements.

use debtmarket_crypto::{verify_signature, Address};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DebtMarketError;
use crate::ledger::ProtocolEvent;
use crate::order::{DebtOrder, IssuanceCommitment, OrderRole, SignedDebtOrder};
use crate::registry::Agreement;
use crate::transaction::Transaction;
use crate::types::{AgreementId, Amount, BlockContext};

/// Record that an issuance commitment was withdrawn before it was filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub agreement_id: AgreementId,
    pub cancelled_by: Address,
    pub cancelled_at: BlockContext,
}

/// The order-filling entry point of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtKernel {
    address: Address,
    issuance_version: Address,
}

impl DebtKernel {
    pub fn new(address: Address, issuance_version: Address) -> Self {
        Self {
            address,
            issuance_version,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn issuance_version(&self) -> Address {
        self.issuance_version
    }

    /// Validate `signed` and, if every check passes, move principal and fees,
    /// register the agreement and mint its debt token to the creditor.
    ///
    /// The order is always hashed against this kernel's address, whatever
    /// `signed.order.kernel` says.
    pub(crate) fn fill_debt_order(
        &self,
        tx: &mut Transaction<'_>,
        caller: Address,
        signed: &SignedDebtOrder,
    ) -> Result<AgreementId, DebtMarketError> {
        let order = DebtOrder {
            kernel: self.address,
            ..signed.order.clone()
        };
        let agreement_id = order.agreement_id();

        for role in OrderRole::ALL {
            if role == OrderRole::Underwriter && !order.has_underwriter() {
                continue;
            }
            let party = order.party(role);
            if caller == party {
                continue;
            }
            if !verify_signature(&order.signing_hash(role), signed.signature(role), &party) {
                return Err(DebtMarketError::InvalidSignature { role });
            }
        }

        let now = tx.block.timestamp;
        if now >= order.expiration_timestamp {
            return Err(DebtMarketError::OrderExpired {
                expiration: order.expiration_timestamp,
                now,
            });
        }

        if tx.registry.contains(&agreement_id) {
            return Err(DebtMarketError::OrderAlreadyFilled(agreement_id));
        }
        if tx.cancellations.contains_key(&agreement_id) {
            return Err(DebtMarketError::OrderCancelled(agreement_id));
        }

        self.check_consistency(&order)?;
        let terms = tx.terms.get(&order.terms_contract)?;
        terms.expected_repayment_value(&order.terms_parameters)?;
        terms.term_length(&order.terms_parameters)?;

        debug!(
            agreement_id = %agreement_id,
            creditor = %order.creditor,
            debtor = %order.debtor,
            principal = order.principal_amount,
            "order validated, moving funds"
        );

        let proxy = tx.proxy;
        let currency = order.principal_currency;
        let disbursed = order.principal_amount - order.debtor_fee;
        tx.balances.transfer_via(
            proxy,
            self.address,
            currency,
            order.creditor,
            order.debtor,
            disbursed,
        )?;
        if order.underwriter_fee > 0 {
            tx.balances.transfer_via(
                proxy,
                self.address,
                currency,
                order.creditor,
                order.underwriter,
                order.underwriter_fee,
            )?;
        }
        if order.relayer_fee > 0 {
            tx.balances.transfer_via(
                proxy,
                self.address,
                currency,
                order.creditor,
                order.relayer,
                order.relayer_fee,
            )?;
        }

        tx.registry.insert(Agreement {
            agreement_id,
            issuance_version: order.issuance_version,
            debtor: order.debtor,
            underwriter: order.underwriter,
            underwriter_risk_rating: order.underwriter_risk_rating,
            terms_contract: order.terms_contract,
            terms_parameters: order.terms_parameters,
            principal_currency: currency,
            principal_amount: order.principal_amount,
            issued_at: tx.block,
            cumulative_repayment: 0,
        })?;
        tx.tokens.mint(agreement_id, order.creditor)?;

        tx.emit(ProtocolEvent::OrderFilled {
            agreement_id,
            debtor: order.debtor,
            creditor: order.creditor,
            underwriter: order.underwriter,
            relayer: order.relayer,
            principal_currency: currency,
            principal_amount: order.principal_amount,
        });
        Ok(agreement_id)
    }

    fn check_consistency(&self, order: &DebtOrder) -> Result<(), DebtMarketError> {
        let invalid = |reason: String| -> Result<(), DebtMarketError> {
            Err(DebtMarketError::InvalidOrder(reason))
        };

        if order.creditor.is_null() {
            return invalid("creditor must be set".to_string());
        }
        if order.debtor.is_null() {
            return invalid("debtor must be set".to_string());
        }
        if order.issuance_version != self.issuance_version {
            return invalid(format!(
                "issuance version {} is not served by this kernel",
                order.issuance_version
            ));
        }
        if order.principal_amount < order.debtor_fee {
            return invalid(format!(
                "debtor fee {} exceeds principal {}",
                order.debtor_fee, order.principal_amount
            ));
        }
        if !order.has_underwriter() && order.underwriter_fee > 0 {
            return invalid("underwriter fee without an underwriter".to_string());
        }
        if !order.has_relayer() && order.relayer_fee > 0 {
            return invalid("relayer fee without a relayer".to_string());
        }

        let paid = checked_sum(order.debtor_fee, order.creditor_fee)?;
        let earned = checked_sum(order.underwriter_fee, order.relayer_fee)?;
        if paid != earned {
            return invalid(format!(
                "fees paid ({paid}) do not equal fees earned ({earned})"
            ));
        }
        Ok(())
    }

    /// Withdraw an unfilled issuance commitment. Only its debtor or
    /// underwriter may do so.
    pub(crate) fn cancel_debt_order(
        &self,
        tx: &mut Transaction<'_>,
        caller: Address,
        commitment: &IssuanceCommitment,
    ) -> Result<AgreementId, DebtMarketError> {
        let is_debtor = caller == commitment.debtor;
        let is_underwriter = !commitment.underwriter.is_null() && caller == commitment.underwriter;
        if !is_debtor && !is_underwriter {
            return Err(DebtMarketError::unauthorized(caller, "cancel debt order"));
        }

        let agreement_id = commitment.hash();
        if tx.registry.contains(&agreement_id) {
            return Err(DebtMarketError::OrderAlreadyFilled(agreement_id));
        }
        if tx.cancellations.contains_key(&agreement_id) {
            return Err(DebtMarketError::OrderCancelled(agreement_id));
        }

        tx.cancellations.insert(
            agreement_id,
            Cancellation {
                agreement_id,
                cancelled_by: caller,
                cancelled_at: tx.block,
            },
        );
        tx.emit(ProtocolEvent::OrderCancelled {
            agreement_id,
            cancelled_by: caller,
        });
        Ok(agreement_id)
    }
}

fn checked_sum(a: Amount, b: Amount) -> Result<Amount, DebtMarketError> {
    a.checked_add(b)
        .ok_or(DebtMarketError::ArithmeticOverflow("order fees"))
}
