//! Shared fixture: a devnet deployment with funded, signing parties.

#![allow(dead_code)]

use debtmarket_core::{
    AgreementId, Amount, DebtMarket, DebtOrder, DeploymentConfig, FixedScheduleTerms, OrderRole,
    SignedDebtOrder, UNIT,
};
use debtmarket_crypto::{Address, OrderSigner};

/// Whole units given to every funded party at genesis.
pub const GENESIS_UNITS: Amount = 100;

/// Thirty days past the default genesis timestamp.
pub const EXPIRATION: u64 = 1_700_000_000 + 30 * 86_400;

pub struct Harness {
    pub market: DebtMarket,
    pub debtor: OrderSigner,
    pub creditor: OrderSigner,
    pub creditor2: OrderSigner,
    pub underwriter: OrderSigner,
    pub relayer: Address,
    pub submitter: Address,
    pub manager: Address,
    pub investor_a: Address,
    pub investor_b: Address,
    pub rep: Address,
    pub terms: Address,
}

impl Harness {
    pub fn new() -> Self {
        let debtor = OrderSigner::from_seed([1u8; 32]);
        let creditor = OrderSigner::from_seed([2u8; 32]);
        let creditor2 = OrderSigner::from_seed([3u8; 32]);
        let underwriter = OrderSigner::from_seed([4u8; 32]);
        let relayer = Address::derive("relayer");
        let submitter = Address::derive("submitter");
        let manager = Address::derive("pool-manager");
        let investor_a = Address::derive("investor-a");
        let investor_b = Address::derive("investor-b");

        let config = DeploymentConfig::devnet(
            &[
                debtor.address(),
                creditor.address(),
                creditor2.address(),
                investor_a,
                investor_b,
            ],
            GENESIS_UNITS,
        );
        let market = DebtMarket::genesis(&config).expect("genesis");
        let rep = market.addresses().currency("REP").expect("REP");
        let terms = market
            .addresses()
            .terms_contract("fixed-schedule")
            .expect("fixed-schedule");

        Self {
            market,
            debtor,
            creditor,
            creditor2,
            underwriter,
            relayer,
            submitter,
            manager,
            investor_a,
            investor_b,
            rep,
            terms,
        }
    }

    pub fn owner(&self) -> Address {
        self.market.addresses().owner
    }

    /// Principal of one unit, no fees, fixed schedule of `expected` over `term` blocks.
    pub fn order(&self, salt: u128, expected: Amount, term: u64) -> DebtOrder {
        let addresses = self.market.addresses();
        DebtOrder::builder(addresses.kernel, addresses.issuance_version)
            .debtor(self.debtor.address())
            .creditor(self.creditor.address())
            .principal(self.rep, UNIT)
            .terms(self.terms, FixedScheduleTerms::encode(expected, term))
            .expires_at(EXPIRATION)
            .salt(salt)
            .build()
    }

    /// The reference loan: 1 unit principal, 1.1 units expected over 43200 blocks.
    pub fn scenario_order(&self) -> DebtOrder {
        self.order(1, 11 * UNIT / 10, 43_200)
    }

    pub fn sign(&self, order: DebtOrder) -> SignedDebtOrder {
        let has_underwriter = order.has_underwriter();
        let signed = SignedDebtOrder::unsigned(order)
            .sign_as(OrderRole::Debtor, &self.debtor)
            .sign_as(OrderRole::Creditor, &self.creditor);
        if has_underwriter {
            signed.sign_as(OrderRole::Underwriter, &self.underwriter)
        } else {
            signed
        }
    }

    pub fn fill(&mut self, order: DebtOrder) -> AgreementId {
        let signed = self.sign(order);
        self.market
            .fill_signed_order(self.submitter, &signed)
            .expect("fill")
    }

    pub fn balance(&self, holder: &Address) -> Amount {
        self.market.balance_of(&self.rep, holder)
    }
}
