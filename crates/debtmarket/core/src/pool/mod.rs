//! CDO pools: aggregate many debt tokens into one claim shared by investors.
//!
//! [`state`] holds the pool record and its pure aggregate views; [`ops`]
//! holds the transactional lifecycle operations.

mod ops;
mod state;

pub(crate) use ops::{
    acquire, claim, close_subscription, create_pool, distribute, invest, receive_proceeds,
    release,
};
pub use ops::pool_address;
pub use state::{CdoPool, DistributionTrigger, PoolPolicy, SubscriptionRule};
