//! Vote-escrow boost engine: a locker minting decaying voting positions, a
//! gauge controller routing emission by vote and per-pool gauges paying
//! boosted rewards.

pub mod math_macros;

pub mod boost;
pub mod emission;
pub mod formulas;
pub mod gauge;
pub mod locker;
pub mod protocol;

pub use boost::{Allocation, Ballot, Boost};
pub use emission::{EmissionSchedule, EmissionSegment};
pub use gauge::{Gauge, Harvest, UserInfo};
pub use locker::{LockedBalance, Locker, Point};
pub use protocol::{BoostClient, GaugeClient, LockerClient, Protocol};
