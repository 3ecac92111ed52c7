//! DebtMarket settlement core.
//!
//! Parties sign debt orders off-path; the [`DebtKernel`] validates them and
//! atomically moves principal, registers the agreement in the
//! [`DebtRegistry`] and mints a [`DebtToken`] claim to the creditor. The
//! [`RepaymentRouter`] sends every repayment to whoever holds that claim, and
//! [`CdoPool`]s aggregate many claims into one investor-shared payout.
//!
//! [`DebtMarket`] ties one deployment together and runs every operation as
//! an all-or-nothing transaction over the committed [`ProtocolState`].

#![deny(unsafe_code)]

pub mod config;
pub mod currency;
pub mod error;
pub mod kernel;
pub mod ledger;
pub mod market;
pub mod order;
mod overlay;
pub mod pool;
pub mod registry;
pub mod router;
pub mod state;
pub mod terms;
pub mod token;
pub mod transaction;
pub mod types;

pub use config::{
    currency_address, AllocationConfig, DeploymentAddresses, DeploymentConfig,
    TermsContractConfig,
};
pub use currency::{CurrencyBook, TransferProxy};
pub use error::DebtMarketError;
pub use kernel::{Cancellation, DebtKernel};
pub use ledger::{EventLedger, LedgerEntry, ProtocolEvent};
pub use market::{DebtMarket, SharedDebtMarket};
pub use order::{
    DebtOrder, DebtOrderBuilder, IssuanceCommitment, OrderFields, OrderRole, SignatureFields,
    SignedDebtOrder,
};
pub use pool::{pool_address, CdoPool, DistributionTrigger, PoolPolicy, SubscriptionRule};
pub use registry::{Agreement, AgreementSource, DebtRegistry};
pub use router::{RepaymentProgress, RepaymentRecord, RepaymentRouter};
pub use state::ProtocolState;
pub use terms::{FixedScheduleTerms, TermsContract, TermsContractRegistry, TermsKind};
pub use token::{DebtToken, DebtTokenRecord};
pub use types::{AgreementId, Amount, BlockContext, TermsParameters, TokenId, UNIT};
