//! In-process walkthrough: fill, partial repayment, pool acquisition, payout.

use anyhow::Context;
use debtmarket_core::{
    DebtMarket, DebtOrder, DeploymentConfig, FixedScheduleTerms, OrderRole, PoolPolicy,
    SignedDebtOrder, UNIT,
};
use debtmarket_crypto::{Address, OrderSigner};
use serde_json::json;
use tracing::info;

use super::print_json;

const PARTY_FUNDING: u128 = 10 * UNIT;
const TERM_BLOCKS: u64 = 43_200;
const THIRTY_DAYS: u64 = 30 * 86_400;

pub fn run(config: &DeploymentConfig, dump_ledger: bool) -> anyhow::Result<()> {
    let mut market = DebtMarket::genesis(config)?;
    let addresses = market.addresses().clone();
    let owner = addresses.owner;
    let (currency_label, currency) = addresses
        .currencies
        .iter()
        .next()
        .map(|(label, address)| (label.clone(), *address))
        .context("deployment has no currencies")?;
    let terms = addresses
        .terms_contracts
        .values()
        .next()
        .copied()
        .context("deployment has no terms contracts")?;

    let debtor = OrderSigner::from_seed([0xd0; 32]);
    let creditor = OrderSigner::from_seed([0xc0; 32]);
    let relayer = Address::derive("demo-relayer");
    let manager = Address::derive("demo-pool-manager");
    let investors = [Address::derive("demo-investor-a"), Address::derive("demo-investor-b")];

    for holder in [debtor.address(), creditor.address()]
        .into_iter()
        .chain(investors)
    {
        market.mint_currency(owner, currency, holder, PARTY_FUNDING)?;
    }
    info!(currency = %currency_label, "demo parties funded");

    // 1 unit lent against 1.1 units repaid over the term.
    let order = DebtOrder::builder(addresses.kernel, addresses.issuance_version)
        .debtor(debtor.address())
        .creditor(creditor.address())
        .principal(currency, UNIT)
        .terms(terms, FixedScheduleTerms::encode(11 * UNIT / 10, TERM_BLOCKS))
        .expires_at(market.block().timestamp.saturating_add(THIRTY_DAYS))
        .salt(1)
        .build();
    let signed = SignedDebtOrder::unsigned(order)
        .sign_as(OrderRole::Debtor, &debtor)
        .sign_as(OrderRole::Creditor, &creditor);
    let agreement_id = market.fill_signed_order(relayer, &signed)?;

    market.advance(600, 7_200);
    market.repay(debtor.address(), &agreement_id, UNIT / 2, currency)?;

    let pool = market.create_pool(manager, currency, PoolPolicy::default())?;
    market.invest(investors[0], pool, 6 * UNIT / 10)?;
    market.invest(investors[1], pool, 4 * UNIT / 10)?;
    market.approve(creditor.address(), Some(pool), &agreement_id)?;
    market.acquire(manager, pool, &agreement_id, UNIT)?;

    market.advance(600, 7_200);
    let progress = market.repayment_progress(&agreement_id)?;
    market.repay(debtor.address(), &agreement_id, progress.outstanding, currency)?;
    let claimed: Vec<u128> = investors
        .iter()
        .map(|investor| market.claim(*investor, pool))
        .collect::<Result<_, _>>()?;

    let progress = market.repayment_progress(&agreement_id)?;
    print_json(&json!({
        "agreement_id": agreement_id,
        "token_owner": market.owner_of(&agreement_id)?,
        "repaid": progress.repaid,
        "fully_repaid": progress.is_fully_repaid(),
        "pool": pool,
        "claimed": claimed,
        "balances": {
            "debtor": market.balance_of(&currency, &debtor.address()),
            "creditor": market.balance_of(&currency, &creditor.address()),
            "investor_a": market.balance_of(&currency, &investors[0]),
            "investor_b": market.balance_of(&currency, &investors[1]),
        },
        "events": market.events().len(),
        "ledger_intact": market.events().verify_chain(),
    }))?;

    if dump_ledger {
        print_json(&market.events().entries())?;
    }
    Ok(())
}
