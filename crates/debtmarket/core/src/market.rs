//! Deployment facade: one kernel, router, debt token and set of pools over a
//! single committed [`ProtocolState`].
//!
//! Every state-changing call runs as one [`Transaction`]: it either commits
//! all of its writes and events, or fails and leaves nothing behind.

use std::sync::{Arc, Mutex};

use debtmarket_crypto::Address;
use tracing::{info, warn};

use crate::config::{DeploymentAddresses, DeploymentConfig};
use crate::error::DebtMarketError;
use crate::kernel::DebtKernel;
use crate::ledger::EventLedger;
use crate::order::{DebtOrder, IssuanceCommitment, OrderFields, SignatureFields, SignedDebtOrder};
use crate::pool::{self, CdoPool, PoolPolicy};
use crate::registry::{Agreement, AgreementSource};
use crate::router::{repayment_progress, RepaymentProgress, RepaymentRecord, RepaymentRouter};
use crate::state::ProtocolState;
use crate::terms::TermsContract;
use crate::transaction::Transaction;
use crate::types::{AgreementId, Amount, BlockContext, TokenId};

/// A running deployment of the debt market.
#[derive(Debug, Clone)]
pub struct DebtMarket {
    addresses: DeploymentAddresses,
    kernel: DebtKernel,
    router: RepaymentRouter,
    block: BlockContext,
    state: ProtocolState,
}

impl DebtMarket {
    /// Stand up a deployment: authorize the kernel and router as transfer
    /// agents, register terms contracts and credit genesis allocations.
    pub fn genesis(config: &DeploymentConfig) -> Result<Self, DebtMarketError> {
        config.validate()?;
        let addresses = config.addresses();
        let mut state = ProtocolState::new();

        state.proxy.authorize(addresses.kernel);
        state.proxy.authorize(addresses.router);
        for terms in &config.terms_contracts {
            let address = addresses.terms_contract(&terms.label)?;
            state.terms.register(address, terms.kind.instantiate())?;
        }

        let mut tx = state.begin(config.genesis);
        for allocation in &config.allocations {
            let currency = addresses.currency(&allocation.currency)?;
            tx.balances
                .credit(currency, allocation.holder, allocation.amount)?;
        }
        let writes = tx.into_writes();
        state.apply(writes, config.genesis);

        info!(
            kernel = %addresses.kernel,
            router = %addresses.router,
            terms_contracts = config.terms_contracts.len(),
            allocations = config.allocations.len(),
            block = config.genesis.number,
            "debt market deployed"
        );

        Ok(Self {
            kernel: DebtKernel::new(addresses.kernel, addresses.issuance_version),
            router: RepaymentRouter::new(addresses.router),
            addresses,
            block: config.genesis,
            state,
        })
    }

    pub fn addresses(&self) -> &DeploymentAddresses {
        &self.addresses
    }

    pub fn kernel(&self) -> &DebtKernel {
        &self.kernel
    }

    pub fn router(&self) -> &RepaymentRouter {
        &self.router
    }

    pub fn block(&self) -> BlockContext {
        self.block
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn events(&self) -> &EventLedger {
        &self.state.ledger
    }

    /// Move the chain forward. Blocks and time never go backwards.
    pub fn advance(&mut self, blocks: u64, seconds: u64) -> BlockContext {
        self.block = self.block.advanced(blocks, seconds);
        self.block
    }

    fn execute<T>(
        &mut self,
        operation: &'static str,
        body: impl FnOnce(&mut Transaction<'_>) -> Result<T, DebtMarketError>,
    ) -> Result<T, DebtMarketError> {
        let block = self.block;
        let mut tx = self.state.begin(block);
        match body(&mut tx) {
            Ok(value) => {
                let writes = tx.into_writes();
                self.state.apply(writes, block);
                Ok(value)
            }
            Err(err) => {
                warn!(operation, error = %err, block = block.number, "operation rejected");
                Err(err)
            }
        }
    }

    fn require_owner(&self, caller: Address, action: &'static str) -> Result<(), DebtMarketError> {
        if caller != self.addresses.owner {
            warn!(%caller, action, "owner-only operation rejected");
            return Err(DebtMarketError::unauthorized(caller, action));
        }
        Ok(())
    }

    // --- Debt kernel ---

    /// Fill an order given in wire form: six address fields, eight numeric
    /// fields, one parameter blob and three signature slots.
    pub fn fill_debt_order(
        &mut self,
        caller: Address,
        creditor: Address,
        fields: &OrderFields,
        signatures: &SignatureFields,
    ) -> Result<AgreementId, DebtMarketError> {
        let order = match DebtOrder::from_fields(self.kernel.address(), creditor, fields) {
            Ok(order) => order,
            Err(err) => {
                warn!(operation = "fill_debt_order", error = %err, "operation rejected");
                return Err(err);
            }
        };
        self.fill_signed_order(caller, &SignedDebtOrder::from_parts(order, signatures))
    }

    pub fn fill_signed_order(
        &mut self,
        caller: Address,
        signed: &SignedDebtOrder,
    ) -> Result<AgreementId, DebtMarketError> {
        let kernel = self.kernel;
        let id = self.execute("fill_debt_order", |tx| {
            kernel.fill_debt_order(tx, caller, signed)
        })?;
        info!(
            agreement_id = %id,
            creditor = %signed.order.creditor,
            debtor = %signed.order.debtor,
            principal = signed.order.principal_amount,
            "debt order filled"
        );
        Ok(id)
    }

    pub fn cancel_debt_order(
        &mut self,
        caller: Address,
        commitment: &IssuanceCommitment,
    ) -> Result<AgreementId, DebtMarketError> {
        let kernel = self.kernel;
        let id = self.execute("cancel_debt_order", |tx| {
            kernel.cancel_debt_order(tx, caller, commitment)
        })?;
        info!(agreement_id = %id, cancelled_by = %caller, "debt order cancelled");
        Ok(id)
    }

    pub fn is_cancelled(&self, id: &AgreementId) -> bool {
        self.state.cancellation(id).is_some()
    }

    // --- Registry and repayment router ---

    pub fn agreement(&self, id: &AgreementId) -> Result<&Agreement, DebtMarketError> {
        self.state.registry.get_terms(id)
    }

    pub fn repay(
        &mut self,
        payer: Address,
        agreement_id: &AgreementId,
        amount: Amount,
        currency: Address,
    ) -> Result<RepaymentRecord, DebtMarketError> {
        let router = self.router;
        let record = self.execute("repay", |tx| {
            router.repay(tx, payer, agreement_id, amount, currency)
        })?;
        info!(
            agreement_id = %agreement_id,
            %payer,
            beneficiary = %record.beneficiary,
            amount,
            "repayment committed"
        );
        Ok(record)
    }

    pub fn repayment_progress(
        &self,
        agreement_id: &AgreementId,
    ) -> Result<RepaymentProgress, DebtMarketError> {
        repayment_progress(&self.state.registry, &self.state.terms, agreement_id)
    }

    // --- Debt token ---

    pub fn owner_of(&self, token_id: &TokenId) -> Result<Address, DebtMarketError> {
        self.state.tokens.owner_of(token_id)
    }

    pub fn get_approved(&self, token_id: &TokenId) -> Result<Option<Address>, DebtMarketError> {
        self.state.tokens.get_approved(token_id)
    }

    /// Number of debt tokens held by `owner`.
    pub fn token_balance_of(&self, owner: &Address) -> usize {
        self.state.tokens.balance_of(owner)
    }

    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        token_id: &TokenId,
    ) -> Result<(), DebtMarketError> {
        self.execute("transfer", |tx| tx.transfer_token(caller, to, token_id))?;
        info!(token_id = %token_id, from = %caller, %to, "debt token transferred");
        Ok(())
    }

    /// Approve `spender` to take `token_id`, or clear the approval with `None`.
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Option<Address>,
        token_id: &TokenId,
    ) -> Result<(), DebtMarketError> {
        self.execute("approve", |tx| tx.approve_token(caller, spender, token_id))
    }

    // --- Currency and administration ---

    pub fn balance_of(&self, currency: &Address, holder: &Address) -> Amount {
        self.state.currencies.balance_of(currency, holder)
    }

    pub fn mint_currency(
        &mut self,
        caller: Address,
        currency: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        self.require_owner(caller, "mint currency")?;
        if to.is_null() {
            return Err(DebtMarketError::InvalidRecipient(to));
        }
        self.execute("mint_currency", |tx| tx.balances.credit(currency, to, amount))?;
        info!(%currency, %to, amount, "currency minted");
        Ok(())
    }

    pub fn authorize_transfer_agent(
        &mut self,
        caller: Address,
        agent: Address,
    ) -> Result<bool, DebtMarketError> {
        self.require_owner(caller, "authorize transfer agent")?;
        let added = self.execute("authorize_transfer_agent", |tx| {
            Ok(tx.authorize_agent(agent))
        })?;
        info!(%agent, added, "transfer agent authorized");
        Ok(added)
    }

    pub fn revoke_transfer_agent(
        &mut self,
        caller: Address,
        agent: &Address,
    ) -> Result<bool, DebtMarketError> {
        self.require_owner(caller, "revoke transfer agent")?;
        let agent = *agent;
        let removed = self.execute("revoke_transfer_agent", |tx| Ok(tx.revoke_agent(agent)))?;
        info!(%agent, removed, "transfer agent revoked");
        Ok(removed)
    }

    /// Register a terms contract at a fresh address. Registered addresses are
    /// never rebound, so issued agreements keep their terms.
    pub fn register_terms_contract(
        &mut self,
        caller: Address,
        address: Address,
        contract: Arc<dyn TermsContract>,
    ) -> Result<(), DebtMarketError> {
        self.require_owner(caller, "register terms contract")?;
        let kind = contract.kind();
        self.execute("register_terms_contract", |tx| {
            tx.register_terms(address, contract)
        })?;
        info!(%address, %kind, "terms contract registered");
        Ok(())
    }

    // --- CDO pools ---

    pub fn pool(&self, address: &Address) -> Result<&CdoPool, DebtMarketError> {
        self.state
            .pool(address)
            .ok_or(DebtMarketError::UnknownPool(*address))
    }

    pub fn create_pool(
        &mut self,
        manager: Address,
        currency: Address,
        policy: PoolPolicy,
    ) -> Result<Address, DebtMarketError> {
        let nonce = self.state.pools.len() as u64;
        let address = self.execute("create_pool", |tx| {
            pool::create_pool(tx, manager, currency, policy, nonce)
        })?;
        info!(pool = %address, %manager, %currency, "pool created");
        Ok(address)
    }

    pub fn invest(
        &mut self,
        investor: Address,
        pool: Address,
        amount: Amount,
    ) -> Result<(), DebtMarketError> {
        self.execute("invest", |tx| pool::invest(tx, investor, pool, amount))
    }

    pub fn close_subscription(
        &mut self,
        caller: Address,
        pool: Address,
    ) -> Result<bool, DebtMarketError> {
        self.execute("close_subscription", |tx| {
            pool::close_subscription(tx, caller, pool)
        })
    }

    pub fn acquire(
        &mut self,
        manager: Address,
        pool: Address,
        token_id: &TokenId,
        price: Amount,
    ) -> Result<(), DebtMarketError> {
        self.execute("acquire", |tx| {
            pool::acquire(tx, manager, pool, token_id, price)
        })?;
        info!(%pool, token_id = %token_id, price, "pool acquired debt token");
        Ok(())
    }

    pub fn release(
        &mut self,
        manager: Address,
        pool: Address,
        token_id: &TokenId,
        to: Address,
    ) -> Result<(), DebtMarketError> {
        self.execute("release", |tx| pool::release(tx, manager, pool, token_id, to))?;
        info!(%pool, token_id = %token_id, %to, "pool released debt token");
        Ok(())
    }

    /// Pay every investor of `pool` what they are owed.
    pub fn distribute(&mut self, pool: Address) -> Result<Amount, DebtMarketError> {
        self.execute("distribute", |tx| pool::distribute(tx, pool))
    }

    pub fn claim(&mut self, investor: Address, pool: Address) -> Result<Amount, DebtMarketError> {
        self.execute("claim", |tx| pool::claim(tx, investor, pool))
    }

    pub fn expected_payout_total(&self, pool: &Address) -> Result<Amount, DebtMarketError> {
        self.pool(pool)?
            .expected_payout_total(&self.state.registry, &self.state.terms)
    }

    pub fn avg_lockup_time(&self, pool: &Address) -> Result<u64, DebtMarketError> {
        self.pool(pool)?
            .avg_lockup_time(&self.state.registry, &self.state.terms)
    }

    /// Expected repayment value of a single agreement.
    pub fn expected_repayment_value(&self, id: &AgreementId) -> Result<Amount, DebtMarketError> {
        let agreement = self.state.registry.agreement(id)?;
        self.state
            .terms
            .get(&agreement.terms_contract)?
            .expected_repayment_value(&agreement.terms_parameters)
    }
}

/// A deployment shared between threads. The mutex is the platform's
/// serialization point: operations run one at a time, in lock order.
#[derive(Debug, Clone)]
pub struct SharedDebtMarket {
    inner: Arc<Mutex<DebtMarket>>,
}

impl SharedDebtMarket {
    pub fn new(market: DebtMarket) -> Self {
        Self {
            inner: Arc::new(Mutex::new(market)),
        }
    }

    pub fn with<T>(
        &self,
        body: impl FnOnce(&mut DebtMarket) -> Result<T, DebtMarketError>,
    ) -> Result<T, DebtMarketError> {
        let mut market = self
            .inner
            .lock()
            .map_err(|_| DebtMarketError::Ledger("debt market lock poisoned".to_string()))?;
        body(&mut market)
    }
}
