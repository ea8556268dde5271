use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{config::ClockConfig, BlockHeight, TokenStore, Timestamp};

/// The ledger's notion of "now".
///
/// Time only moves when a caller moves it. Every state-changing operation and
/// every query reads the current timestamp / block from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    timestamp: Timestamp,
    block: BlockHeight,
    block_time: u64,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            timestamp: config.genesis_timestamp,
            block: config.genesis_block,
            block_time: config.block_time.max(1),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.timestamp
    }

    pub fn block(&self) -> BlockHeight {
        self.block
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    /// Moves time forward by `secs` and mines a single block. Time saturates
    /// at `Timestamp::MAX`.
    pub fn advance(&mut self, secs: u64) {
        self.timestamp = self.timestamp.saturating_add(secs);
        self.block = self.block.saturating_add(1);
        trace!(timestamp = self.timestamp, block = self.block, "clock advanced");
    }

    /// Mines `count` blocks, each `block_time` seconds apart
    pub fn mine(&mut self, count: u64) {
        let secs = count.saturating_mul(self.block_time);

        self.timestamp = self.timestamp.saturating_add(secs);
        self.block = self.block.saturating_add(count);
        trace!(timestamp = self.timestamp, block = self.block, "blocks mined");
    }
}

/// The shared environment every contract operates against: the clock and the
/// token balances.
pub struct Ledger<T: TokenStore> {
    pub clock: Clock,
    pub tokens: T,
}

impl<T: TokenStore> Ledger<T> {
    pub fn new(clock: Clock, tokens: T) -> Self {
        Self { clock, tokens }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn block(&self) -> BlockHeight {
        self.clock.block()
    }
}
