//! A deployed locker + boost pair sharing one ledger, and the caller-bound
//! clients used to drive it.

use tracing::info;
use veboost_core::{
    config::ProtocolConfig, Address, Amount, Clock, Error, Ledger, LockId, Timestamp, TokenStore,
};

use crate::{
    boost::Boost,
    emission::EmissionSchedule,
    formulas::Ratio,
    gauge::{Harvest, UserInfo},
    locker::Locker,
};

pub struct Protocol<T: TokenStore> {
    pub ledger: Ledger<T>,
    pub locker: Locker,
    pub boost: Boost,
    operator: Address,
}

impl<T: TokenStore> Protocol<T> {
    /// Deploys a locker escrowing `escrow_token` and a boost minting
    /// `reward_token`, both operated by `operator`.
    pub fn deploy(
        config: &ProtocolConfig,
        tokens: T,
        operator: Address,
        escrow_token: Address,
        reward_token: Address,
    ) -> Result<Self, Error> {
        let clock = Clock::new(&config.clock);

        let locker_address = Address::derive_child(&operator, "locker");
        let boost_address = Address::derive_child(&operator, "boost");

        let schedule = EmissionSchedule::new(&config.emission, clock.now())?;

        let mut locker = Locker::new(
            &config.locker,
            locker_address,
            escrow_token,
            operator,
            &clock,
        );

        let boost = Boost::new(
            &config.boost,
            schedule,
            boost_address,
            operator,
            reward_token,
        );

        locker.add_boosts(&operator, boost_address)?;

        info!(
            locker = %locker_address,
            boost = %boost_address,
            %escrow_token,
            %reward_token,
            "protocol deployed"
        );

        Ok(Self {
            ledger: Ledger::new(clock, tokens),
            locker,
            boost,
            operator,
        })
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn clock(&self) -> &Clock {
        &self.ledger.clock
    }

    pub fn now(&self) -> Timestamp {
        self.ledger.now()
    }

    pub fn tokens(&self) -> &T {
        &self.ledger.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.ledger.tokens
    }

    pub fn advance(&mut self, secs: u64) {
        self.ledger.clock.advance(secs);
    }

    pub fn mine(&mut self, blocks: u64) {
        self.ledger.clock.mine(blocks);
    }

    pub fn create_gauge(&mut self, pool: Address, weight: Amount, active: bool) -> Result<Address, Error> {
        self.boost
            .create_gauge(&self.ledger.clock, &self.operator, pool, weight, active)
    }

    pub fn set_gauge(&mut self, pool: &Address, weight: Amount, active: bool) -> Result<(), Error> {
        self.boost
            .set_gauge(&self.ledger.clock, &self.operator, pool, weight, active)
    }

    pub fn mass_update_pools(&mut self) -> Result<(), Error> {
        self.boost.mass_update_pools(&self.ledger.clock)
    }

    pub fn balance_of_nft(&self, lock_id: LockId) -> Amount {
        self.locker.balance_of_nft(lock_id, &self.ledger.clock)
    }

    pub fn pending(&self, pool: &Address, user: &Address) -> Result<Amount, Error> {
        self.boost
            .pending(&self.ledger.clock, &self.locker, pool, user)
    }

    pub fn pending_max(&self, pool: &Address, user: &Address) -> Result<Amount, Error> {
        self.boost.pending_max(&self.ledger.clock, pool, user)
    }

    pub fn boost_multiplier(&self, pool: &Address, user: &Address) -> Ratio {
        self.boost
            .boost_multiplier(&self.locker, pool, user, self.ledger.now())
    }

    pub fn voter_share(&self, pool: &Address, user: &Address) -> Ratio {
        self.boost
            .voter_share(&self.locker, pool, user, self.ledger.now())
    }

    pub fn locker_client(&mut self, caller: Address) -> LockerClient<'_, T> {
        LockerClient {
            protocol: self,
            caller,
        }
    }

    pub fn boost_client(&mut self, caller: Address) -> BoostClient<'_, T> {
        BoostClient {
            protocol: self,
            caller,
        }
    }

    pub fn gauge_client(&mut self, pool: Address, caller: Address) -> GaugeClient<'_, T> {
        GaugeClient {
            protocol: self,
            pool,
            caller,
        }
    }
}

/// Locker operations on behalf of one account
pub struct LockerClient<'a, T: TokenStore> {
    protocol: &'a mut Protocol<T>,
    caller: Address,
}

impl<T: TokenStore> LockerClient<'_, T> {
    /// Approves the locker to pull `amount` of the escrowed token
    pub fn approve_token(&mut self, amount: Amount) {
        let token = self.protocol.locker.token();
        let locker = self.protocol.locker.address();

        self.protocol
            .ledger
            .tokens
            .approve(&token, &self.caller, &locker, amount);
    }

    pub fn create_lock(&mut self, amount: Amount, duration: u64) -> Result<LockId, Error> {
        let Protocol { ledger, locker, .. } = &mut *self.protocol;
        locker.create_lock(ledger, &self.caller, amount, duration)
    }

    pub fn create_lock_for(
        &mut self,
        amount: Amount,
        duration: u64,
        to: Address,
    ) -> Result<LockId, Error> {
        let Protocol { ledger, locker, .. } = &mut *self.protocol;
        locker.create_lock_for(ledger, &self.caller, amount, duration, to)
    }

    pub fn deposit_for(&mut self, lock_id: LockId, amount: Amount) -> Result<(), Error> {
        let Protocol { ledger, locker, .. } = &mut *self.protocol;
        locker.deposit_for(ledger, &self.caller, lock_id, amount)
    }

    pub fn increase_unlock_time(&mut self, lock_id: LockId, duration: u64) -> Result<Timestamp, Error> {
        let Protocol { ledger, locker, .. } = &mut *self.protocol;
        locker.increase_unlock_time(ledger, &self.caller, lock_id, duration)
    }

    pub fn withdraw(&mut self, lock_id: LockId) -> Result<Amount, Error> {
        let Protocol { ledger, locker, .. } = &mut *self.protocol;
        locker.withdraw(ledger, &self.caller, lock_id)
    }

    pub fn approve(&mut self, approved: Address, lock_id: LockId) -> Result<(), Error> {
        self.protocol.locker.approve(&self.caller, approved, lock_id)
    }

    /// Moves a lock owned by the caller to `to`
    pub fn transfer(&mut self, to: Address, lock_id: LockId) -> Result<(), Error> {
        let caller = self.caller;
        self.protocol
            .locker
            .transfer_from(&caller, &caller, &to, lock_id)
    }

    pub fn transfer_from(&mut self, from: Address, to: Address, lock_id: LockId) -> Result<(), Error> {
        self.protocol
            .locker
            .transfer_from(&self.caller, &from, &to, lock_id)
    }
}

/// Voting on behalf of one account
pub struct BoostClient<'a, T: TokenStore> {
    protocol: &'a mut Protocol<T>,
    caller: Address,
}

impl<T: TokenStore> BoostClient<'_, T> {
    pub fn vote(&mut self, lock_id: LockId, pools: &[Address], weights: &[Amount]) -> Result<(), Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.vote(&ledger.clock, locker, &self.caller, lock_id, pools, weights)
    }

    pub fn poke(&mut self, lock_id: LockId) -> Result<(), Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.poke(&ledger.clock, locker, &self.caller, lock_id)
    }

    pub fn abstain(&mut self, lock_id: LockId) -> Result<(), Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.abstain(&ledger.clock, locker, &self.caller, lock_id)
    }
}

/// Staking in one pool's gauge on behalf of one account
pub struct GaugeClient<'a, T: TokenStore> {
    protocol: &'a mut Protocol<T>,
    pool: Address,
    caller: Address,
}

impl<T: TokenStore> GaugeClient<'_, T> {
    pub fn address(&self) -> Option<Address> {
        self.protocol.boost.gauges(&self.pool)
    }

    /// Approves the gauge to pull `amount` of the pool token
    pub fn approve_token(&mut self, amount: Amount) -> Result<(), Error> {
        let gauge = self.address().ok_or(Error::GaugeNotFound(self.pool))?;

        self.protocol
            .ledger
            .tokens
            .approve(&self.pool, &self.caller, &gauge, amount);

        Ok(())
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<Harvest, Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.deposit(ledger, locker, &self.caller, &self.pool, amount)
    }

    pub fn withdraw(&mut self, amount: Amount) -> Result<Harvest, Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.withdraw(ledger, locker, &self.caller, &self.pool, amount)
    }

    pub fn get_reward(&mut self) -> Result<Harvest, Error> {
        let Protocol {
            ledger,
            locker,
            boost,
            ..
        } = &mut *self.protocol;

        boost.get_reward(ledger, locker, &self.caller, &self.pool)
    }

    pub fn pending(&self) -> Result<Amount, Error> {
        self.protocol.pending(&self.pool, &self.caller)
    }

    pub fn pending_max(&self) -> Result<Amount, Error> {
        self.protocol.pending_max(&self.pool, &self.caller)
    }

    pub fn user_info(&self) -> Result<UserInfo, Error> {
        self.protocol.boost.user_info(&self.pool, &self.caller)
    }

    pub fn boost_multiplier(&self) -> Ratio {
        self.protocol.boost_multiplier(&self.pool, &self.caller)
    }
}
