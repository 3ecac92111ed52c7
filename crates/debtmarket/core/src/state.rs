use std::collections::BTreeMap;

use debtmarket_crypto::Address;
use tracing::debug;

use crate::currency::{CurrencyBook, TransferProxy};
use crate::kernel::Cancellation;
use crate::ledger::EventLedger;
use crate::pool::CdoPool;
use crate::registry::DebtRegistry;
use crate::terms::TermsContractRegistry;
use crate::token::DebtToken;
use crate::transaction::{Transaction, WriteSet};
use crate::types::{AgreementId, BlockContext};

/// Committed state of one deployment.
#[derive(Debug, Clone, Default)]
pub struct ProtocolState {
    pub(crate) currencies: CurrencyBook,
    pub(crate) proxy: TransferProxy,
    pub(crate) terms: TermsContractRegistry,
    pub(crate) registry: DebtRegistry,
    pub(crate) tokens: DebtToken,
    pub(crate) cancellations: BTreeMap<AgreementId, Cancellation>,
    pub(crate) pools: BTreeMap<Address, CdoPool>,
    pub(crate) ledger: EventLedger,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn currencies(&self) -> &CurrencyBook {
        &self.currencies
    }

    pub fn proxy(&self) -> &TransferProxy {
        &self.proxy
    }

    pub fn terms(&self) -> &TermsContractRegistry {
        &self.terms
    }

    pub fn registry(&self) -> &DebtRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &DebtToken {
        &self.tokens
    }

    pub fn cancellation(&self, id: &AgreementId) -> Option<&Cancellation> {
        self.cancellations.get(id)
    }

    pub fn pool(&self, address: &Address) -> Option<&CdoPool> {
        self.pools.get(address)
    }

    pub fn pools(&self) -> impl Iterator<Item = &CdoPool> {
        self.pools.values()
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub(crate) fn begin(&self, block: BlockContext) -> Transaction<'_> {
        Transaction::begin(self, block)
    }

    /// Commit a transaction's writes. Cannot fail: every check ran while staging.
    pub(crate) fn apply(&mut self, writes: WriteSet, block: BlockContext) {
        let WriteSet {
            balances,
            agreements,
            tokens,
            cancellations,
            pools,
            agents,
            terms,
            events,
        } = writes;

        debug!(
            balances = balances.len(),
            agreements = agreements.len(),
            tokens = tokens.len(),
            agents = agents.len(),
            events = events.len(),
            block = block.number,
            "applying write set"
        );

        self.currencies.apply(balances);
        self.registry.apply(agreements);
        self.tokens.apply(tokens);
        self.cancellations.extend(cancellations);
        self.pools.extend(pools);
        for (agent, authorized) in agents {
            if authorized {
                self.proxy.authorize(agent);
            } else {
                self.proxy.revoke(&agent);
            }
        }
        self.terms.extend(terms);
        for event in events {
            self.ledger.append(block, event);
        }
    }
}
