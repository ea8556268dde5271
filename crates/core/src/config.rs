use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{
    Amount, BlockHeight, Timestamp, Units, SECONDS_PER_DAY, SECONDS_PER_WEEK, SECONDS_PER_YEAR,
};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClockConfig {
    pub genesis_timestamp: Timestamp,

    #[serde(default)]
    pub genesis_block: BlockHeight,

    /// Seconds between blocks when mining without an explicit time jump
    #[serde(default = "default_block_time")]
    pub block_time: u64,
}

fn default_block_time() -> u64 {
    1
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            // 2021-01-07T00:00:00Z, a multiple of one week
            genesis_timestamp: 1_609_977_600,
            genesis_block: 0,
            block_time: default_block_time(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LockerConfig {
    /// Longest allowed lock; a lock of this length starts with a weight equal
    /// to its amount
    #[serde(default = "default_max_lock_duration")]
    pub max_lock_duration: u64,

    /// Unlock times are rounded down to a multiple of this many seconds
    #[serde(default = "default_lock_unit")]
    pub lock_unit: u64,
}

fn default_max_lock_duration() -> u64 {
    4 * SECONDS_PER_YEAR
}

fn default_lock_unit() -> u64 {
    SECONDS_PER_WEEK
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            max_lock_duration: default_max_lock_duration(),
            lock_unit: default_lock_unit(),
        }
    }
}

/// A rational factor applied to the emission rate at every period boundary
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecayRatio {
    pub numerator: u64,
    pub denominator: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EmissionConfig {
    /// Reward tokens emitted per second across all gauges
    #[serde(default = "default_reward_per_second")]
    pub reward_per_second: Units,

    /// Emission starts here; defaults to the genesis timestamp
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    /// Length in seconds of an emission period
    #[serde(default = "default_period")]
    pub period: u64,

    /// Rate multiplier applied at the end of every period, no decay if unset
    #[serde(default)]
    pub decay: Option<DecayRatio>,

    /// The decayed rate never drops below this floor
    #[serde(default)]
    pub min_reward_per_second: Units,
}

fn default_reward_per_second() -> Units {
    Units::tokens(1)
}

fn default_period() -> u64 {
    30 * SECONDS_PER_DAY
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            reward_per_second: default_reward_per_second(),
            start_time: None,
            period: default_period(),
            decay: None,
            min_reward_per_second: Units::default(),
        }
    }
}

impl EmissionConfig {
    pub fn rate(&self) -> Amount {
        self.reward_per_second.raw()
    }

    pub fn min_rate(&self) -> Amount {
        self.min_reward_per_second.raw()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BoostConfig {
    /// Share of the un-boosted reward every depositor is guaranteed, in
    /// percent. The maximum boost multiplier is its reciprocal.
    #[serde(default = "default_base_share_percent")]
    pub base_share_percent: u8,
}

fn default_base_share_percent() -> u8 {
    30
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            base_share_percent: default_base_share_percent(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub locker: LockerConfig,

    #[serde(default)]
    pub emission: EmissionConfig,

    #[serde(default)]
    pub boost: BoostConfig,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub max_level: tracing::Level,

    #[serde(default = "default_include_escrow")]
    pub include_escrow: bool,
}

fn default_include_escrow() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_level: tracing::Level::INFO,
            include_escrow: default_include_escrow(),
        }
    }
}
