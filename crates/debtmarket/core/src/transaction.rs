use std::collections::BTreeMap;
use std::sync::Arc;

use debtmarket_crypto::Address;
use tracing::debug;

use crate::currency::{BalanceView, TransferProxy};
use crate::error::DebtMarketError;
use crate::kernel::Cancellation;
use crate::ledger::ProtocolEvent;
use crate::overlay::Overlay;
use crate::pool::CdoPool;
use crate::registry::{Agreement, RegistryView};
use crate::state::ProtocolState;
use crate::terms::{TermsContract, TermsContractRegistry};
use crate::token::{DebtTokenRecord, TokenView};
use crate::types::{AgreementId, Amount, BlockContext, TokenId};

/// One all-or-nothing protocol operation in progress.
///
/// Every store is read through a copy-on-write overlay. Dropping the
/// transaction discards everything it staged; [`Transaction::into_writes`]
/// hands the staged writes to [`ProtocolState::apply`].
pub struct Transaction<'a> {
    pub(crate) block: BlockContext,
    pub(crate) proxy: &'a TransferProxy,
    pub(crate) terms: &'a TermsContractRegistry,
    pub(crate) balances: BalanceView<'a>,
    pub(crate) registry: RegistryView<'a>,
    pub(crate) tokens: TokenView<'a>,
    pub(crate) cancellations: Overlay<'a, AgreementId, Cancellation>,
    pub(crate) pools: Overlay<'a, Address, CdoPool>,
    agents: BTreeMap<Address, bool>,
    new_terms: TermsContractRegistry,
    events: Vec<ProtocolEvent>,
}

/// Writes staged by a successful transaction.
#[derive(Debug, Default)]
pub struct WriteSet {
    pub(crate) balances: BTreeMap<(Address, Address), Amount>,
    pub(crate) agreements: BTreeMap<AgreementId, Agreement>,
    pub(crate) tokens: BTreeMap<TokenId, DebtTokenRecord>,
    pub(crate) cancellations: BTreeMap<AgreementId, Cancellation>,
    pub(crate) pools: BTreeMap<Address, CdoPool>,
    /// Transfer agents to authorize (`true`) or revoke (`false`).
    pub(crate) agents: BTreeMap<Address, bool>,
    pub(crate) terms: TermsContractRegistry,
    pub(crate) events: Vec<ProtocolEvent>,
}

impl WriteSet {
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(state: &'a ProtocolState, block: BlockContext) -> Self {
        Self {
            block,
            proxy: &state.proxy,
            terms: &state.terms,
            balances: state.currencies.view(),
            registry: state.registry.view(),
            tokens: state.tokens.view(),
            cancellations: Overlay::new(&state.cancellations),
            pools: Overlay::new(&state.pools),
            agents: BTreeMap::new(),
            new_terms: TermsContractRegistry::new(),
            events: Vec::new(),
        }
    }

    pub fn block(&self) -> BlockContext {
        self.block
    }

    pub(crate) fn emit(&mut self, event: ProtocolEvent) {
        debug!(kind = event.kind(), "staged event");
        self.events.push(event);
    }

    pub(crate) fn is_pool(&self, address: &Address) -> bool {
        self.pools.contains_key(address)
    }

    pub(crate) fn pool(&self, address: &Address) -> Result<&CdoPool, DebtMarketError> {
        self.pools
            .get(address)
            .ok_or(DebtMarketError::UnknownPool(*address))
    }

    pub(crate) fn pool_mut(&mut self, address: &Address) -> Result<&mut CdoPool, DebtMarketError> {
        self.pools
            .get_mut(address)
            .ok_or(DebtMarketError::UnknownPool(*address))
    }

    /// Owner transfer of a debt token. Pools only take tokens through `acquire`.
    pub(crate) fn transfer_token(
        &mut self,
        caller: Address,
        to: Address,
        token_id: &TokenId,
    ) -> Result<(), DebtMarketError> {
        if self.is_pool(&to) {
            return Err(DebtMarketError::InvalidRecipient(to));
        }
        if self.is_pool(&caller) {
            return Err(DebtMarketError::unauthorized(caller, "transfer pool-held token"));
        }
        let from = self.tokens.transfer(caller, to, token_id)?;
        self.emit(ProtocolEvent::TokenTransferred {
            token_id: *token_id,
            from,
            to,
        });
        Ok(())
    }

    pub(crate) fn approve_token(
        &mut self,
        caller: Address,
        spender: Option<Address>,
        token_id: &TokenId,
    ) -> Result<(), DebtMarketError> {
        if self.is_pool(&caller) {
            return Err(DebtMarketError::unauthorized(caller, "approve pool-held token"));
        }
        self.tokens.approve(caller, spender, token_id)?;
        let spender = self.tokens.get_approved(token_id)?;
        self.emit(ProtocolEvent::TokenApproved {
            token_id: *token_id,
            owner: caller,
            spender,
        });
        Ok(())
    }

    fn is_agent(&self, agent: &Address) -> bool {
        self.agents
            .get(agent)
            .copied()
            .unwrap_or_else(|| self.proxy.is_authorized_agent(agent))
    }

    /// Stage `agent` as an authorized transfer agent. Returns whether it was newly added.
    pub(crate) fn authorize_agent(&mut self, agent: Address) -> bool {
        if self.is_agent(&agent) {
            return false;
        }
        self.agents.insert(agent, true);
        self.emit(ProtocolEvent::TransferAgentAuthorized { agent });
        true
    }

    pub(crate) fn revoke_agent(&mut self, agent: Address) -> bool {
        if !self.is_agent(&agent) {
            return false;
        }
        self.agents.insert(agent, false);
        self.emit(ProtocolEvent::TransferAgentRevoked { agent });
        true
    }

    pub(crate) fn register_terms(
        &mut self,
        address: Address,
        contract: Arc<dyn TermsContract>,
    ) -> Result<(), DebtMarketError> {
        if self.terms.has(&address) {
            return Err(DebtMarketError::TermsContractAlreadyRegistered(address));
        }
        let kind = contract.kind();
        self.new_terms.register(address, contract)?;
        self.emit(ProtocolEvent::TermsContractRegistered { address, kind });
        Ok(())
    }

    pub fn into_writes(self) -> WriteSet {
        WriteSet {
            balances: self.balances.into_staged(),
            agreements: self.registry.into_staged(),
            tokens: self.tokens.into_staged(),
            cancellations: self.cancellations.into_staged(),
            pools: self.pools.into_staged(),
            agents: self.agents,
            terms: self.new_terms,
            events: self.events,
        }
    }
}
