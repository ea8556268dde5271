//! Ready-made protocol deployments.

use veboost_core::{
    config::{ClockConfig, EmissionConfig, LockerConfig, ProtocolConfig},
    Address, Amount, Error, LockId, MemoryTokens, TokenStore, Units, SECONDS_PER_DAY,
    SECONDS_PER_YEAR,
};
use veboost_escrow::{Harvest, Protocol, UserInfo};

use crate::{boost_mul, to_wei, TestAddress, TestToken};

/// Deployment timestamp of every fixture, aligned to whole days and weeks
pub const GENESIS: u64 = 1_609_977_600;

pub fn protocol_config(lock_unit: u64, reward_per_second: Amount) -> ProtocolConfig {
    ProtocolConfig {
        clock: ClockConfig {
            genesis_timestamp: GENESIS,
            genesis_block: 1,
            block_time: 1,
        },
        locker: LockerConfig {
            max_lock_duration: 4 * SECONDS_PER_YEAR,
            lock_unit,
        },
        emission: EmissionConfig {
            reward_per_second: Units(reward_per_second),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A deployed protocol with a single usdc gauge, escrowing and rewarding fxs
pub struct TestWorld {
    pub protocol: Protocol<MemoryTokens>,
    pub operator: Address,
    pub fxs: Address,
    pub usdc: Address,
}

impl TestWorld {
    pub fn new(config: &ProtocolConfig, operator: &TestAddress, gauge_weight: Amount) -> Self {
        let fxs = TestToken::Fxs.address();
        let usdc = TestToken::Usdc.address();
        let operator = operator.address();

        let mut protocol =
            Protocol::deploy(config, MemoryTokens::new(), operator, fxs, fxs).unwrap();

        protocol.create_gauge(usdc, gauge_weight, true).unwrap();

        Self {
            protocol,
            operator,
            fxs,
            usdc,
        }
    }

    /// Mints both tokens to `who` and approves the locker and the gauge
    pub fn fund(&mut self, who: &TestAddress, fxs: Amount, usdc: Amount) {
        let who = who.address();
        let locker = self.protocol.locker.address();
        let gauge = self.gauge_address();

        let tokens = self.protocol.tokens_mut();

        tokens.mint(&self.fxs, &who, fxs).unwrap();
        tokens.mint(&self.usdc, &who, usdc).unwrap();
        tokens.approve(&self.fxs, &who, &locker, Amount::MAX);
        tokens.approve(&self.usdc, &who, &gauge, Amount::MAX);
    }

    pub fn gauge_address(&self) -> Address {
        self.protocol.boost.gauges(&self.usdc).unwrap()
    }

    pub fn balance(&self, token: &Address, who: &TestAddress) -> Amount {
        self.protocol.tokens().balance_of(token, &who.address())
    }

    pub fn advance(&mut self, secs: u64) {
        self.protocol.advance(secs);
    }

    pub fn lock(&mut self, who: &TestAddress, amount: Amount, duration: u64) -> LockId {
        self.protocol
            .locker_client(who.address())
            .create_lock(amount, duration)
            .unwrap()
    }

    pub fn deposit(&mut self, who: &TestAddress, amount: Amount) -> Harvest {
        let usdc = self.usdc;

        self.protocol
            .gauge_client(usdc, who.address())
            .deposit(amount)
            .unwrap()
    }

    pub fn withdraw(&mut self, who: &TestAddress, amount: Amount) -> Result<Harvest, Error> {
        let usdc = self.usdc;

        self.protocol
            .gauge_client(usdc, who.address())
            .withdraw(amount)
    }

    pub fn get_reward(&mut self, who: &TestAddress) -> Harvest {
        let usdc = self.usdc;

        self.protocol
            .gauge_client(usdc, who.address())
            .get_reward()
            .unwrap()
    }

    /// Votes the whole current weight of the lock for the usdc gauge
    pub fn vote_all(&mut self, who: &TestAddress, lock_id: LockId) {
        let usdc = self.usdc;
        let weight = self.protocol.balance_of_nft(lock_id);

        self.protocol
            .boost_client(who.address())
            .vote(lock_id, &[usdc], &[weight])
            .unwrap();
    }

    pub fn pending(&self, who: &TestAddress) -> Amount {
        self.protocol.pending(&self.usdc, &who.address()).unwrap()
    }

    pub fn pending_max(&self, who: &TestAddress) -> Amount {
        self.protocol
            .pending_max(&self.usdc, &who.address())
            .unwrap()
    }

    pub fn user_info(&self, who: &TestAddress) -> UserInfo {
        self.protocol
            .boost
            .user_info(&self.usdc, &who.address())
            .unwrap()
    }

    /// Observed multiplier of `who`, see [`boost_mul`]
    pub fn boost_mul(&self, who: &TestAddress, decimals: u32) -> String {
        boost_mul(self.pending(who), self.pending_max(who), decimals)
    }
}

/// Four accounts, one gauge and a one-token-per-second emission; unlock times
/// round to half hours.
pub fn boost_mul_world() -> TestWorld {
    let config = protocol_config(1_800, to_wei("1"));
    let mut world = TestWorld::new(&config, &TestAddress::Alice, 100);

    world.fund(&TestAddress::Alice, to_wei("10000000"), to_wei("10000000"));

    for who in [TestAddress::Bob, TestAddress::Carol, TestAddress::Dave] {
        world.fund(&who, to_wei("10000"), to_wei("100000"));
    }

    world
}

/// Two accounts with half a token each to lock and one usdc each to stake;
/// unlock times round to whole days.
pub fn dao_world() -> TestWorld {
    let config = protocol_config(SECONDS_PER_DAY, 10_000);
    let mut world = TestWorld::new(&config, &TestAddress::Alice, 100_000);

    for who in [TestAddress::Alice, TestAddress::Bob] {
        world.fund(&who, to_wei("0.5"), to_wei("1"));
    }

    world
}
