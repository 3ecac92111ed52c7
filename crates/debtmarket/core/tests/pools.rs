//! CDO pool lifecycle and aggregation.

mod common;

use common::{Harness, GENESIS_UNITS};
use debtmarket_core::{
    AgreementId, Amount, DebtMarketError, DistributionTrigger, PoolPolicy, SubscriptionRule,
    TermsKind, UNIT,
};
use debtmarket_crypto::Address;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn policy(distribution: DistributionTrigger, subscription: SubscriptionRule) -> PoolPolicy {
    PoolPolicy {
        distribution,
        subscription,
    }
}

/// A pool funded 2:1 by investors A and B (3 units total).
fn funded_pool(h: &mut Harness, policy: PoolPolicy) -> Address {
    let pool = h.market.create_pool(h.manager, h.rep, policy).unwrap();
    h.market.invest(h.investor_a, pool, 2 * UNIT).unwrap();
    h.market.invest(h.investor_b, pool, UNIT).unwrap();
    pool
}

/// Fill `(expected, term)` loans and sell each into `pool` at `price`.
fn acquire_all(
    h: &mut Harness,
    pool: Address,
    loans: &[(Amount, u64)],
    price: Amount,
) -> Vec<AgreementId> {
    let creditor = h.creditor.address();
    let mut ids = Vec::new();
    for (salt, (expected, term)) in loans.iter().enumerate() {
        let id = h.fill(h.order(salt as u128 + 1, *expected, *term));
        h.market.approve(creditor, Some(pool), &id).unwrap();
        h.market.acquire(h.manager, pool, &id, price).unwrap();
        ids.push(id);
    }
    ids
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn empty_pool_reports_zero() {
    let mut h = Harness::new();
    let pool = h
        .market
        .create_pool(h.manager, h.rep, PoolPolicy::default())
        .unwrap();
    assert_eq!(h.market.expected_payout_total(&pool).unwrap(), 0);
    assert_eq!(h.market.avg_lockup_time(&pool).unwrap(), 0);
}

#[test]
fn payout_total_and_lockup_follow_holdings() {
    let mut h = Harness::new();
    let pool = funded_pool(
        &mut h,
        policy(DistributionTrigger::OnClaim, SubscriptionRule::ManagerClose),
    );
    let loans = [
        (11 * UNIT / 10, 43_200),
        (12 * UNIT / 10, 86_400),
        (UNIT, 1_000),
    ];
    let ids = acquire_all(&mut h, pool, &loans, UNIT / 2);

    assert_eq!(h.market.expected_payout_total(&pool).unwrap(), 33 * UNIT / 10);
    assert_eq!(h.market.avg_lockup_time(&pool).unwrap(), (43_200 + 86_400 + 1_000) / 3);
    assert_eq!(h.market.pool(&pool).unwrap().holdings(), ids.as_slice());

    let before = h.market.expected_payout_total(&pool).unwrap();
    let released = ids[1];
    h.market
        .release(h.manager, pool, &released, h.creditor2.address())
        .unwrap();
    assert_eq!(
        h.market.expected_payout_total(&pool).unwrap(),
        before - 12 * UNIT / 10
    );
    assert_eq!(h.market.avg_lockup_time(&pool).unwrap(), (43_200 + 1_000) / 2);
    assert_eq!(h.market.owner_of(&released).unwrap(), h.creditor2.address());
}

#[test]
fn acquisition_pays_seller_from_pool_capital() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    let creditor = h.creditor.address();
    let before = h.balance(&creditor);

    let ids = acquire_all(&mut h, pool, &[(11 * UNIT / 10, 43_200)], UNIT);
    assert_eq!(h.market.owner_of(&ids[0]).unwrap(), pool);
    // Paid one unit of principal, received one unit for the token.
    assert_eq!(h.balance(&creditor), before);
    assert_eq!(h.market.pool(&pool).unwrap().capital_available(), 2 * UNIT);
    assert_eq!(h.balance(&pool), 2 * UNIT);
}

#[test]
fn held_terms_survive_a_rejected_reregistration() {
    let mut h = Harness::new();
    let owner = h.owner();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    acquire_all(&mut h, pool, &[(11 * UNIT / 10, 43_200)], UNIT);

    assert_eq!(
        h.market
            .register_terms_contract(owner, h.terms, TermsKind::FixedSchedule.instantiate()),
        Err(DebtMarketError::TermsContractAlreadyRegistered(h.terms))
    );
    assert_eq!(h.market.expected_payout_total(&pool).unwrap(), 11 * UNIT / 10);
    assert_eq!(h.market.avg_lockup_time(&pool).unwrap(), 43_200);
}

// ---------------------------------------------------------------------------
// Lifecycle rules
// ---------------------------------------------------------------------------

#[test]
fn first_acquisition_closes_subscription() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    acquire_all(&mut h, pool, &[(UNIT, 100)], UNIT);
    assert!(!h.market.pool(&pool).unwrap().is_subscription_open());
    assert_eq!(
        h.market.invest(h.investor_a, pool, UNIT).unwrap_err(),
        DebtMarketError::PoolSubscriptionClosed(pool)
    );
}

#[test]
fn manager_closes_subscription() {
    let mut h = Harness::new();
    let pool = funded_pool(
        &mut h,
        policy(DistributionTrigger::OnClaim, SubscriptionRule::ManagerClose),
    );
    acquire_all(&mut h, pool, &[(UNIT, 100)], UNIT);
    h.market.invest(h.investor_a, pool, UNIT).unwrap();

    assert!(matches!(
        h.market.close_subscription(h.investor_a, pool),
        Err(DebtMarketError::Unauthorized { .. })
    ));
    assert!(h.market.close_subscription(h.manager, pool).unwrap());
    assert!(!h.market.close_subscription(h.manager, pool).unwrap());
    assert!(h.market.invest(h.investor_b, pool, UNIT).is_err());
}

#[test]
fn acquire_requires_approval_and_capital() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    let creditor = h.creditor.address();
    let id = h.fill(h.scenario_order());

    assert!(matches!(
        h.market.acquire(h.manager, pool, &id, UNIT),
        Err(DebtMarketError::Unauthorized { .. })
    ));

    h.market.approve(creditor, Some(pool), &id).unwrap();
    assert!(matches!(
        h.market.acquire(h.investor_a, pool, &id, UNIT),
        Err(DebtMarketError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.market.acquire(h.manager, pool, &id, 4 * UNIT),
        Err(DebtMarketError::InsufficientFunds { .. })
    ));
    // Nothing moved on failure.
    assert_eq!(h.market.owner_of(&id).unwrap(), creditor);
    assert_eq!(h.market.get_approved(&id).unwrap(), Some(pool));
    assert_eq!(h.balance(&pool), 3 * UNIT);

    h.market.acquire(h.manager, pool, &id, 3 * UNIT).unwrap();
    assert_eq!(h.market.pool(&pool).unwrap().capital_available(), 0);
}

#[test]
fn pools_only_take_tokens_through_acquire() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    let creditor = h.creditor.address();
    let id = h.fill(h.scenario_order());
    assert_eq!(
        h.market.transfer(creditor, pool, &id).unwrap_err(),
        DebtMarketError::InvalidRecipient(pool)
    );

    h.market.approve(creditor, Some(pool), &id).unwrap();
    h.market.acquire(h.manager, pool, &id, UNIT).unwrap();
    assert!(matches!(
        h.market.transfer(pool, creditor, &id),
        Err(DebtMarketError::Unauthorized { .. })
    ));
    let stray = h.order(77, UNIT, 10).agreement_id();
    assert_eq!(
        h.market
            .release(h.manager, pool, &stray, creditor)
            .unwrap_err(),
        DebtMarketError::UnknownToken(stray)
    );
}

#[test]
fn unknown_pool() {
    let mut h = Harness::new();
    let ghost = Address::derive("ghost-pool");
    assert_eq!(
        h.market.invest(h.investor_a, ghost, UNIT).unwrap_err(),
        DebtMarketError::UnknownPool(ghost)
    );
    assert!(h.market.expected_payout_total(&ghost).is_err());
}

// ---------------------------------------------------------------------------
// Proceeds
// ---------------------------------------------------------------------------

#[test]
fn on_claim_proceeds_are_pro_rata() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    let ids = acquire_all(&mut h, pool, &[(11 * UNIT / 10, 43_200)], UNIT);
    let start = GENESIS_UNITS * UNIT;
    let (a, b) = (h.investor_a, h.investor_b);

    let record = h
        .market
        .repay(h.debtor.address(), &ids[0], 9 * UNIT / 10, h.rep)
        .unwrap();
    assert_eq!(record.beneficiary, pool);
    assert_eq!(
        h.market.pool(&pool).unwrap().cumulative_proceeds(),
        9 * UNIT / 10
    );
    // Nothing paid until claimed.
    assert_eq!(h.balance(&a), start - 2 * UNIT);

    assert_eq!(h.market.claim(a, pool).unwrap(), 6 * UNIT / 10);
    assert_eq!(h.market.claim(a, pool).unwrap(), 0);
    assert_eq!(h.market.distribute(pool).unwrap(), 3 * UNIT / 10);
    assert_eq!(h.balance(&a), start - 2 * UNIT + 6 * UNIT / 10);
    assert_eq!(h.balance(&b), start - UNIT + 3 * UNIT / 10);

    assert!(matches!(
        h.market.claim(Address::derive("outsider"), pool),
        Err(DebtMarketError::Unauthorized { .. })
    ));
}

#[test]
fn immediate_distribution_pays_on_repayment() {
    let mut h = Harness::new();
    let pool = funded_pool(
        &mut h,
        policy(
            DistributionTrigger::Immediate,
            SubscriptionRule::UntilFirstAcquisition,
        ),
    );
    let ids = acquire_all(&mut h, pool, &[(11 * UNIT / 10, 43_200)], UNIT);
    let start = GENESIS_UNITS * UNIT;

    h.market
        .repay(h.debtor.address(), &ids[0], 3 * UNIT / 10, h.rep)
        .unwrap();
    assert_eq!(h.balance(&h.investor_a), start - 2 * UNIT + 2 * UNIT / 10);
    assert_eq!(h.balance(&h.investor_b), start - UNIT + UNIT / 10);

    let pool_state = h.market.pool(&pool).unwrap();
    assert_eq!(pool_state.distributed_to(&h.investor_a), 2 * UNIT / 10);
    assert_eq!(pool_state.owed_to(&h.investor_b).unwrap(), 0);
}

#[test]
fn distributions_never_exceed_entitlement() {
    let mut h = Harness::new();
    let pool = funded_pool(&mut h, PoolPolicy::default());
    let ids = acquire_all(&mut h, pool, &[(UNIT, 100)], UNIT);

    // 10 base units split 2:1 floors to 6 and 3, leaving one unit of dust.
    for _ in 0..10 {
        h.market
            .repay(h.debtor.address(), &ids[0], 1, h.rep)
            .unwrap();
        h.market.distribute(pool).unwrap();
    }
    let p = h.market.pool(&pool).unwrap();
    assert_eq!(p.cumulative_proceeds(), 10);
    assert_eq!(p.distributed_to(&h.investor_a), 6);
    assert_eq!(p.distributed_to(&h.investor_b), 3);
    assert_eq!(h.balance(&pool), 2 * UNIT + 1);
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

fn arb_loans() -> impl Strategy<Value = (Vec<(Amount, u64)>, Vec<(Amount, u64)>)> {
    prop::collection::vec((1u128..1_000_000_000_000_000_000_000, 1u64..1_000_000), 1..6)
        .prop_flat_map(|loans| (Just(loans.clone()), Just(loans).prop_shuffle()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Aggregates do not depend on the order agreements entered the pool.
    #[test]
    fn aggregation_is_order_independent((loans, shuffled) in arb_loans()) {
        let expected_total: Amount = loans.iter().map(|(e, _)| *e).sum();
        let expected_avg = loans.iter().map(|(_, t)| u128::from(*t)).sum::<u128>()
            / loans.len() as u128;

        let mut totals = Vec::new();
        for order in [&loans, &shuffled] {
            let mut h = Harness::new();
            let pool = funded_pool(
                &mut h,
                policy(DistributionTrigger::OnClaim, SubscriptionRule::ManagerClose),
            );
            acquire_all(&mut h, pool, order, 0);
            let total = h.market.expected_payout_total(&pool).unwrap();
            let avg = h.market.avg_lockup_time(&pool).unwrap();
            prop_assert_eq!(total, expected_total);
            prop_assert_eq!(u128::from(avg), expected_avg);
            totals.push((total, avg));
        }
        prop_assert_eq!(totals[0], totals[1]);
    }
}
