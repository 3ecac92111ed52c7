use debtmarket_crypto::Address;
use tracing::debug;

use super::state::{CdoPool, DistributionTrigger, PoolPolicy, SubscriptionRule};
use crate::error::DebtMarketError;
use crate::ledger::ProtocolEvent;
use crate::registry::AgreementSource;
use crate::transaction::Transaction;
use crate::types::{Amount, TokenId};

/// Deterministic address of the `nonce`-th pool created by `manager`.
pub fn pool_address(manager: &Address, nonce: u64) -> Address {
    Address::derive_parts(&[b"cdo-pool", manager.as_bytes(), &nonce.to_be_bytes()])
}

fn managed_pool<'t>(
    tx: &'t Transaction<'_>,
    caller: Address,
    pool: &Address,
    action: &'static str,
) -> Result<&'t CdoPool, DebtMarketError> {
    let record = tx.pool(pool)?;
    if record.manager != caller {
        return Err(DebtMarketError::unauthorized(caller, action));
    }
    Ok(record)
}

pub(crate) fn create_pool(
    tx: &mut Transaction<'_>,
    manager: Address,
    currency: Address,
    policy: PoolPolicy,
    nonce: u64,
) -> Result<Address, DebtMarketError> {
    let address = pool_address(&manager, nonce);
    if tx.is_pool(&address) {
        return Err(DebtMarketError::unauthorized(manager, "recreate an existing pool"));
    }
    tx.pools
        .insert(address, CdoPool::new(address, manager, currency, policy));
    tx.emit(ProtocolEvent::PoolCreated {
        pool: address,
        manager,
        currency,
    });
    Ok(address)
}

pub(crate) fn invest(
    tx: &mut Transaction<'_>,
    investor: Address,
    pool: Address,
    amount: Amount,
) -> Result<(), DebtMarketError> {
    let currency = tx.pool(&pool)?.currency;
    tx.pool_mut(&pool)?.add_investment(investor, amount)?;
    tx.balances.transfer(currency, investor, pool, amount)?;
    tx.emit(ProtocolEvent::PoolInvestment {
        pool,
        investor,
        amount,
    });
    Ok(())
}

/// Freeze the share table. Returns whether it was open.
pub(crate) fn close_subscription(
    tx: &mut Transaction<'_>,
    caller: Address,
    pool: Address,
) -> Result<bool, DebtMarketError> {
    managed_pool(tx, caller, &pool, "close pool subscription")?;
    let was_open = tx.pool_mut(&pool)?.close_subscription();
    if was_open {
        tx.emit(ProtocolEvent::PoolSubscriptionClosed { pool });
    }
    Ok(was_open)
}

/// Buy `token_id` from its owner for `price` out of the pool's capital.
///
/// The owner must first have approved the pool as the token's spender.
pub(crate) fn acquire(
    tx: &mut Transaction<'_>,
    manager: Address,
    pool: Address,
    token_id: &TokenId,
    price: Amount,
) -> Result<(), DebtMarketError> {
    let record = managed_pool(tx, manager, &pool, "acquire for pool")?;
    let (currency, subscription) = (record.currency, record.policy.subscription);

    let seller = tx.tokens.owner_of(token_id)?;
    if tx.tokens.get_approved(token_id)? != Some(pool) {
        return Err(DebtMarketError::unauthorized(
            manager,
            "acquire a token not approved to the pool",
        ));
    }
    let agreement_currency = tx.registry.agreement(token_id)?.principal_currency;
    if agreement_currency != currency {
        return Err(DebtMarketError::CurrencyMismatch {
            expected: currency,
            actual: agreement_currency,
        });
    }

    tx.pool_mut(&pool)?.add_holding(*token_id, price)?;
    tx.balances.transfer(currency, pool, seller, price)?;
    tx.tokens.transfer_approved(pool, pool, token_id)?;

    debug!(%pool, token_id = %token_id, %seller, price, "pool acquired token");
    tx.emit(ProtocolEvent::PoolAcquired {
        pool,
        token_id: *token_id,
        seller,
        price,
    });

    if subscription == SubscriptionRule::UntilFirstAcquisition
        && tx.pool_mut(&pool)?.close_subscription()
    {
        tx.emit(ProtocolEvent::PoolSubscriptionClosed { pool });
    }
    Ok(())
}

pub(crate) fn release(
    tx: &mut Transaction<'_>,
    manager: Address,
    pool: Address,
    token_id: &TokenId,
    to: Address,
) -> Result<(), DebtMarketError> {
    managed_pool(tx, manager, &pool, "release from pool")?;
    if to.is_null() || tx.is_pool(&to) {
        return Err(DebtMarketError::InvalidRecipient(to));
    }
    tx.pool_mut(&pool)?.remove_holding(token_id)?;
    tx.tokens.transfer(pool, to, token_id)?;
    tx.emit(ProtocolEvent::PoolReleased {
        pool,
        token_id: *token_id,
        to,
    });
    Ok(())
}

/// Hook run by the router when a pool-held agreement is repaid.
pub(crate) fn receive_proceeds(
    tx: &mut Transaction<'_>,
    pool: Address,
    token_id: &TokenId,
    amount: Amount,
) -> Result<(), DebtMarketError> {
    let record = tx.pool_mut(&pool)?;
    record.add_proceeds(amount)?;
    let trigger = record.policy.distribution;
    let froze_shares = amount > 0 && record.close_subscription();

    tx.emit(ProtocolEvent::PoolProceedsReceived {
        pool,
        token_id: *token_id,
        amount,
    });
    if froze_shares {
        tx.emit(ProtocolEvent::PoolSubscriptionClosed { pool });
    }
    if trigger == DistributionTrigger::Immediate {
        distribute(tx, pool)?;
    }
    Ok(())
}

/// Pay every investor what they are owed. Returns the total paid out.
pub(crate) fn distribute(
    tx: &mut Transaction<'_>,
    pool: Address,
) -> Result<Amount, DebtMarketError> {
    let investors: Vec<Address> = tx.pool(&pool)?.investors().map(|(a, _)| *a).collect();
    let mut total: Amount = 0;
    for investor in investors {
        total += pay_out(tx, pool, investor)?;
    }
    Ok(total)
}

pub(crate) fn claim(
    tx: &mut Transaction<'_>,
    investor: Address,
    pool: Address,
) -> Result<Amount, DebtMarketError> {
    if tx.pool(&pool)?.shares_of(&investor) == 0 {
        return Err(DebtMarketError::unauthorized(
            investor,
            "claim from a pool without shares",
        ));
    }
    pay_out(tx, pool, investor)
}

fn pay_out(
    tx: &mut Transaction<'_>,
    pool: Address,
    investor: Address,
) -> Result<Amount, DebtMarketError> {
    let record = tx.pool_mut(&pool)?;
    let currency = record.currency;
    let owed = record.settle(&investor)?;
    if owed > 0 {
        tx.balances.transfer(currency, pool, investor, owed)?;
        tx.emit(ProtocolEvent::PoolDistribution {
            pool,
            investor,
            amount: owed,
        });
    }
    Ok(owed)
}
