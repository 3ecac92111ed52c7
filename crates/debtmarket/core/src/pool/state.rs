use std::collections::BTreeMap;

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::registry::AgreementSource;
use crate::terms::TermsContractRegistry;
use crate::types::{Amount, TokenId};

/// When received proceeds are paid out to investors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionTrigger {
    /// Every repayment is pushed to all investors in the same transaction.
    Immediate,
    /// Proceeds accumulate until `distribute` or `claim` is called.
    #[default]
    OnClaim,
}

/// When the share table stops accepting investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionRule {
    #[default]
    UntilFirstAcquisition,
    ManagerClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolPolicy {
    pub distribution: DistributionTrigger,
    pub subscription: SubscriptionRule,
}

/// A CDO pool: debt tokens bought with pooled capital.
///
/// Investors hold share units issued 1:1 with the capital they put in. The
/// share table is frozen once subscription closes, which happens at the
/// latest when the first proceeds arrive, so every investor's entitlement
/// `floor(cumulative_proceeds * units / total_units)` only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdoPool {
    pub address: Address,
    pub manager: Address,
    pub currency: Address,
    pub policy: PoolPolicy,
    holdings: Vec<TokenId>,
    shares: BTreeMap<Address, Amount>,
    total_units: Amount,
    capital_available: Amount,
    cumulative_proceeds: Amount,
    distributed: BTreeMap<Address, Amount>,
    subscription_open: bool,
}

impl CdoPool {
    pub fn new(address: Address, manager: Address, currency: Address, policy: PoolPolicy) -> Self {
        Self {
            address,
            manager,
            currency,
            policy,
            holdings: Vec::new(),
            shares: BTreeMap::new(),
            total_units: 0,
            capital_available: 0,
            cumulative_proceeds: 0,
            distributed: BTreeMap::new(),
            subscription_open: true,
        }
    }

    /// Held token ids in acquisition order.
    pub fn holdings(&self) -> &[TokenId] {
        &self.holdings
    }

    pub fn holds(&self, token_id: &TokenId) -> bool {
        self.holdings.contains(token_id)
    }

    pub fn shares_of(&self, investor: &Address) -> Amount {
        self.shares.get(investor).copied().unwrap_or_default()
    }

    pub fn investors(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.shares.iter()
    }

    pub fn total_units(&self) -> Amount {
        self.total_units
    }

    /// Invested capital not yet spent on acquisitions.
    pub fn capital_available(&self) -> Amount {
        self.capital_available
    }

    pub fn cumulative_proceeds(&self) -> Amount {
        self.cumulative_proceeds
    }

    pub fn distributed_to(&self, investor: &Address) -> Amount {
        self.distributed.get(investor).copied().unwrap_or_default()
    }

    pub fn is_subscription_open(&self) -> bool {
        self.subscription_open
    }

    pub fn entitlement(&self, investor: &Address) -> Result<Amount, DebtMarketError> {
        if self.total_units == 0 {
            return Ok(0);
        }
        mul_div_floor(
            self.cumulative_proceeds,
            self.shares_of(investor),
            self.total_units,
        )
    }

    /// Proceeds the investor is entitled to but has not yet been paid.
    pub fn owed_to(&self, investor: &Address) -> Result<Amount, DebtMarketError> {
        let entitled = self.entitlement(investor)?;
        Ok(entitled.saturating_sub(self.distributed_to(investor)))
    }

    /// Sum of expected repayment values over held agreements.
    pub fn expected_payout_total(
        &self,
        agreements: &impl AgreementSource,
        terms: &TermsContractRegistry,
    ) -> Result<Amount, DebtMarketError> {
        self.holdings.iter().try_fold(0, |total: Amount, id| {
            let agreement = agreements.agreement(id)?;
            let value = terms
                .get(&agreement.terms_contract)?
                .expected_repayment_value(&agreement.terms_parameters)?;
            total
                .checked_add(value)
                .ok_or(DebtMarketError::ArithmeticOverflow("expected payout total"))
        })
    }

    /// Arithmetic mean of held term lengths (floor), zero when the pool is empty.
    pub fn avg_lockup_time(
        &self,
        agreements: &impl AgreementSource,
        terms: &TermsContractRegistry,
    ) -> Result<u64, DebtMarketError> {
        if self.holdings.is_empty() {
            return Ok(0);
        }
        let mut total: u128 = 0;
        for id in &self.holdings {
            let agreement = agreements.agreement(id)?;
            let length = terms
                .get(&agreement.terms_contract)?
                .term_length(&agreement.terms_parameters)?;
            total += u128::from(length);
        }
        let mean = total / self.holdings.len() as u128;
        u64::try_from(mean).map_err(|_| DebtMarketError::ArithmeticOverflow("average lockup"))
    }

    // --- mutations used by pool operations ---

    pub(crate) fn add_investment(
        &mut self,
        investor: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        if !self.subscription_open {
            return Err(DebtMarketError::PoolSubscriptionClosed(self.address));
        }
        let overflow = DebtMarketError::ArithmeticOverflow("pool investment");
        let units = self
            .shares_of(&investor)
            .checked_add(amount)
            .ok_or_else(|| overflow.clone())?;
        self.total_units = self
            .total_units
            .checked_add(amount)
            .ok_or_else(|| overflow.clone())?;
        self.capital_available = self.capital_available.checked_add(amount).ok_or(overflow)?;
        self.shares.insert(investor, units);
        Ok(())
    }

    pub(crate) fn close_subscription(&mut self) -> bool {
        std::mem::replace(&mut self.subscription_open, false)
    }

    pub(crate) fn add_holding(
        &mut self,
        token_id: TokenId,
        price: Amount,
    ) -> Result<(), DebtMarketError> {
        if price > self.capital_available {
            return Err(DebtMarketError::InsufficientFunds {
                holder: self.address,
                currency: self.currency,
                required: price,
                available: self.capital_available,
            });
        }
        self.capital_available -= price;
        self.holdings.push(token_id);
        Ok(())
    }

    pub(crate) fn remove_holding(&mut self, token_id: &TokenId) -> Result<(), DebtMarketError> {
        let position = self
            .holdings
            .iter()
            .position(|held| held == token_id)
            .ok_or(DebtMarketError::UnknownToken(*token_id))?;
        self.holdings.remove(position);
        Ok(())
    }

    pub(crate) fn add_proceeds(&mut self, amount: Amount) -> Result<(), DebtMarketError> {
        self.cumulative_proceeds = self
            .cumulative_proceeds
            .checked_add(amount)
            .ok_or(DebtMarketError::ArithmeticOverflow("pool proceeds"))?;
        Ok(())
    }

    /// Mark `investor`'s outstanding entitlement as paid and return it.
    pub(crate) fn settle(&mut self, investor: &Address) -> Result<Amount, DebtMarketError> {
        let owed = self.owed_to(investor)?;
        if owed > 0 {
            let paid = self.distributed_to(investor) + owed;
            self.distributed.insert(*investor, paid);
        }
        Ok(owed)
    }
}

/// `floor(a * b / c)` for `b <= c`, without forming `a * b` directly.
fn mul_div_floor(a: Amount, b: Amount, c: Amount) -> Result<Amount, DebtMarketError> {
    let overflow = || DebtMarketError::ArithmeticOverflow("pool entitlement");
    let whole = (a / c).checked_mul(b).ok_or_else(overflow)?;
    let part = (a % c).checked_mul(b).ok_or_else(overflow)? / c;
    whole.checked_add(part).ok_or_else(overflow)
}
