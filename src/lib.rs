//! Token staking ledger with time-weighted yield accrual.
//!
//! Participants stake a fungible asset into a shared pool; the pool owner
//! manages a yield-asset reserve and a carbon-credit reserve; each
//! participant's entitlement is derived on demand from their stake history
//! and the elapsed time.
//!
//! * [`ledger`]: per-participant balances and append-only histories.
//! * [`reserve`]: owner-restricted reserve counters.
//! * [`yields`]: entitlement, projection curve and dashboard figures.
//! * [`pool`]: the [`StakingPool`] tying the above to an external asset
//!   ledger and a clock.
//! * [`snapshot`]: persisted state with a SHA-256 state root.
//! * [`scenario`]: scripted replays and seeded random workloads.

pub mod config;
pub mod external;
pub mod ledger;
pub mod pool;
pub mod reserve;
pub mod scenario;
pub mod snapshot;
pub mod yields;

mod error;

pub use config::{AccrualBasis, DayRounding, PoolConfig};
pub use error::{StakingError, TransferError};
pub use pool::StakingPool;
