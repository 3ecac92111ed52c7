//! Fungible currency balances and the transfer proxy.
//!
//! Each currency is identified by an [`Address`]. The kernel and the router
//! never move funds directly: they go through the [`TransferProxy`], which
//! only honours agents that the deployment owner has authorized.

use std::collections::{BTreeMap, BTreeSet};

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DebtMarketError;
use crate::overlay::Overlay;
use crate::types::Amount;

type BalanceKey = (Address, Address);

/// Committed balances, keyed by `(currency, holder)`.
#[derive(Debug, Clone, Default)]
pub struct CurrencyBook {
    balances: BTreeMap<BalanceKey, Amount>,
}

impl CurrencyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, currency: &Address, holder: &Address) -> Amount {
        self.balances
            .get(&(*currency, *holder))
            .copied()
            .unwrap_or_default()
    }

    /// Total supply of `currency` across all holders.
    pub fn total_supply(&self, currency: &Address) -> Amount {
        self.balances
            .iter()
            .filter(|((c, _), _)| c == currency)
            .fold(0, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    pub(crate) fn view(&self) -> BalanceView<'_> {
        BalanceView {
            overlay: Overlay::new(&self.balances),
        }
    }

    pub(crate) fn apply(&mut self, staged: BTreeMap<BalanceKey, Amount>) {
        for (key, amount) in staged {
            if amount == 0 {
                self.balances.remove(&key);
            } else {
                self.balances.insert(key, amount);
            }
        }
    }
}

/// The set of agents allowed to move funds on behalf of holders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferProxy {
    agents: BTreeSet<Address>,
}

impl TransferProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authorize(&mut self, agent: Address) -> bool {
        self.agents.insert(agent)
    }

    pub fn revoke(&mut self, agent: &Address) -> bool {
        self.agents.remove(agent)
    }

    pub fn is_authorized_agent(&self, agent: &Address) -> bool {
        self.agents.contains(agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Address> {
        self.agents.iter()
    }
}

/// Staged balance changes inside a transaction.
#[derive(Debug)]
pub(crate) struct BalanceView<'a> {
    overlay: Overlay<'a, BalanceKey, Amount>,
}

impl<'a> BalanceView<'a> {
    pub(crate) fn balance_of(&self, currency: &Address, holder: &Address) -> Amount {
        self.overlay
            .get(&(*currency, *holder))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn credit(
        &mut self,
        currency: Address,
        holder: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        let updated = self
            .balance_of(&currency, &holder)
            .checked_add(amount)
            .ok_or(DebtMarketError::ArithmeticOverflow("currency credit"))?;
        self.overlay.insert((currency, holder), updated);
        Ok(())
    }

    /// Move `amount` of `currency` between holders without an agent check.
    ///
    /// Used for movements the holder initiates itself (pool deposits and
    /// payouts). Protocol contracts acting for a holder use [`Self::transfer_via`].
    pub(crate) fn transfer(
        &mut self,
        currency: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        let available = self.balance_of(&currency, &from);
        if available < amount {
            return Err(DebtMarketError::InsufficientFunds {
                holder: from,
                currency,
                required: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        self.overlay.insert((currency, from), available - amount);
        self.credit(currency, to, amount)?;
        debug!(%currency, %from, %to, amount, "staged transfer");
        Ok(())
    }

    pub(crate) fn transfer_via(
        &mut self,
        proxy: &TransferProxy,
        agent: Address,
        currency: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        if !proxy.is_authorized_agent(&agent) {
            return Err(DebtMarketError::UnauthorizedTransferAgent(agent));
        }
        self.transfer(currency, from, to, amount)
    }

    pub(crate) fn into_staged(self) -> BTreeMap<BalanceKey, Amount> {
        self.overlay.into_staged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep() -> Address {
        Address::derive("REP")
    }

    fn funded(holder: Address, amount: Amount) -> CurrencyBook {
        let mut book = CurrencyBook::new();
        let mut view = book.view();
        view.credit(rep(), holder, amount).unwrap();
        let staged = view.into_staged();
        book.apply(staged);
        book
    }

    #[test]
    fn transfer_moves_exact_amount() {
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut book = funded(alice, 100);

        let mut view = book.view();
        view.transfer(rep(), alice, bob, 40).unwrap();
        let staged = view.into_staged();
        book.apply(staged);

        assert_eq!(book.balance_of(&rep(), &alice), 60);
        assert_eq!(book.balance_of(&rep(), &bob), 40);
        assert_eq!(book.total_supply(&rep()), 100);
    }

    #[test]
    fn short_balance_is_rejected() {
        let alice = Address::derive("alice");
        let book = funded(alice, 10);
        let mut view = book.view();
        let err = view
            .transfer(rep(), alice, Address::derive("bob"), 11)
            .unwrap_err();
        assert_eq!(
            err,
            DebtMarketError::InsufficientFunds {
                holder: alice,
                currency: rep(),
                required: 11,
                available: 10,
            }
        );
    }

    #[test]
    fn proxy_requires_authorized_agent() {
        let alice = Address::derive("alice");
        let kernel = Address::derive("debt-kernel");
        let book = funded(alice, 10);
        let mut proxy = TransferProxy::new();

        let mut view = book.view();
        let err = view
            .transfer_via(&proxy, kernel, rep(), alice, Address::derive("bob"), 5)
            .unwrap_err();
        assert_eq!(err, DebtMarketError::UnauthorizedTransferAgent(kernel));

        proxy.authorize(kernel);
        view.transfer_via(&proxy, kernel, rep(), alice, Address::derive("bob"), 5)
            .unwrap();
        assert_eq!(view.balance_of(&rep(), &alice), 5);
    }

    #[test]
    fn dropped_view_leaves_book_untouched() {
        let alice = Address::derive("alice");
        let book = funded(alice, 10);
        {
            let mut view = book.view();
            view.transfer(rep(), alice, Address::derive("bob"), 10).unwrap();
        }
        assert_eq!(book.balance_of(&rep(), &alice), 10);
    }

    #[test]
    fn self_transfer_is_a_noop() {
        let alice = Address::derive("alice");
        let book = funded(alice, 10);
        let mut view = book.view();
        view.transfer(rep(), alice, alice, 10).unwrap();
        assert_eq!(view.balance_of(&rep(), &alice), 10);
    }
}
