//! Gauge controller.
//!
//! Owns the gauges, splits the global emission across them according to the
//! votes cast by locks and settles boosted rewards for depositors.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use veboost_core::{
    config::BoostConfig, Address, Amount, Clock, Error, Ledger, LockId, Timestamp, TokenStore,
    VotingEscrow,
};

use crate::{
    emission::EmissionSchedule,
    formulas::{self, pro_rata, Ratio},
    gauge::{Gauge, Harvest, StakeChange, UserInfo},
};

mod votes;

pub use votes::{Ballot, VoteBook};

pub struct Boost {
    address: Address,
    operator: Address,
    reward_token: Address,
    schedule: EmissionSchedule,
    base_share_percent: u8,

    gauges: BTreeMap<Address, Gauge>,
    pools: Vec<Address>,
    gauge_pools: BTreeMap<Address, Address>,

    votes: VoteBook,
}

/// Portion of the emission a gauge receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub numerator: Amount,
    pub denominator: Amount,
}

impl Boost {
    pub fn new(
        config: &BoostConfig,
        schedule: EmissionSchedule,
        address: Address,
        operator: Address,
        reward_token: Address,
    ) -> Self {
        Self {
            address,
            operator,
            reward_token,
            schedule,
            base_share_percent: config.base_share_percent.clamp(1, 100),
            gauges: Default::default(),
            pools: Default::default(),
            gauge_pools: Default::default(),
            votes: Default::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reward_token(&self) -> Address {
        self.reward_token
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    pub fn base_share_percent(&self) -> u8 {
        self.base_share_percent
    }

    fn ensure_operator(&self, caller: &Address) -> Result<(), Error> {
        if caller != &self.operator {
            return Err(Error::NotOperator(*caller));
        }

        Ok(())
    }

    fn gauge(&self, pool: &Address) -> Result<&Gauge, Error> {
        self.gauges.get(pool).ok_or(Error::GaugeNotFound(*pool))
    }

    fn gauge_mut(&mut self, pool: &Address) -> Result<&mut Gauge, Error> {
        self.gauges.get_mut(pool).ok_or(Error::GaugeNotFound(*pool))
    }

    /// Deploys a gauge for `pool`, returning its address
    pub fn create_gauge(
        &mut self,
        clock: &Clock,
        caller: &Address,
        pool: Address,
        weight: Amount,
        active: bool,
    ) -> Result<Address, Error> {
        self.ensure_operator(caller)?;

        if self.gauges.contains_key(&pool) {
            return Err(Error::GaugeExists(pool));
        }

        self.mass_update_pools(clock)?;

        let address = Address::derive_child(&self.address, &pool.to_string());
        let start = clock.now().max(self.schedule.start());

        self.gauges
            .insert(pool, Gauge::new(address, pool, weight, active, start));
        self.pools.push(pool);
        self.gauge_pools.insert(address, pool);

        info!(%pool, gauge = %address, weight, active, "gauge created");

        Ok(address)
    }

    /// Updates the base weight and activity of an existing gauge
    pub fn set_gauge(
        &mut self,
        clock: &Clock,
        caller: &Address,
        pool: &Address,
        weight: Amount,
        active: bool,
    ) -> Result<(), Error> {
        self.ensure_operator(caller)?;
        self.gauge(pool)?;

        self.mass_update_pools(clock)?;
        self.gauge_mut(pool)?.configure(weight, active);

        info!(%pool, weight, active, "gauge updated");

        Ok(())
    }

    /// Gauge address of a pool
    pub fn gauges(&self, pool: &Address) -> Option<Address> {
        self.gauges.get(pool).map(|x| x.address())
    }

    pub fn pool_for_gauge(&self, gauge: &Address) -> Option<Address> {
        self.gauge_pools.get(gauge).copied()
    }

    pub fn pool_length(&self) -> usize {
        self.pools.len()
    }

    /// Pools in creation order
    pub fn pools(&self) -> &[Address] {
        &self.pools
    }

    pub fn gauge_of(&self, pool: &Address) -> Option<&Gauge> {
        self.gauges.get(pool)
    }

    pub fn pool_votes(&self, pool: &Address) -> Amount {
        self.votes.pool_votes(pool)
    }

    pub fn total_votes(&self) -> Amount {
        self.votes.total_votes()
    }

    pub fn votes_of(&self, lock_id: LockId) -> Option<&Ballot> {
        self.votes.ballot(lock_id)
    }

    pub fn ballots(&self) -> impl Iterator<Item = (&LockId, &Ballot)> {
        self.votes.ballots()
    }

    fn active_votes(&self) -> Amount {
        self.gauges
            .values()
            .filter(|g| g.is_active())
            .map(|g| self.votes.pool_votes(&g.pool()))
            .sum()
    }

    /// The share of the global emission currently routed to `pool`.
    ///
    /// Votes decide once any active gauge has received some; until then the
    /// gauges' base weights do.
    pub fn allocation(&self, pool: &Address) -> Result<Allocation, Error> {
        let gauge = self.gauge(pool)?;

        if !gauge.is_active() {
            return Ok(Allocation {
                numerator: 0,
                denominator: 1,
            });
        }

        let active_votes = self.active_votes();

        if active_votes > 0 {
            return Ok(Allocation {
                numerator: self.votes.pool_votes(pool),
                denominator: active_votes,
            });
        }

        let active_weight: Amount = self
            .gauges
            .values()
            .filter(|g| g.is_active())
            .map(|g| g.base_weight())
            .sum();

        Ok(Allocation {
            numerator: gauge.base_weight(),
            denominator: active_weight,
        })
    }

    fn reward_between(&self, pool: &Address, from: Timestamp, to: Timestamp) -> Result<Amount, Error> {
        let Allocation {
            numerator,
            denominator,
        } = self.allocation(pool)?;

        let emitted = self.schedule.emitted(from, to)?;

        pro_rata(emitted, numerator, denominator)
    }

    /// Per second emission currently flowing into the gauge of `pool`
    pub fn reward_rate(&self, pool: &Address, clock: &Clock) -> Result<Amount, Error> {
        let Allocation {
            numerator,
            denominator,
        } = self.allocation(pool)?;

        pro_rata(self.schedule.rate_at(clock.now()), numerator, denominator)
    }

    /// Brings the accumulator of a single gauge up to date
    pub fn update_pool(&mut self, clock: &Clock, pool: &Address) -> Result<(), Error> {
        let now = clock.now();
        let last = self.gauge(pool)?.last_reward_time();
        let reward = self.reward_between(pool, last, now)?;

        self.gauge_mut(pool)?.accrue(reward, now)
    }

    /// Brings every gauge up to date at the current allocation
    pub fn mass_update_pools(&mut self, clock: &Clock) -> Result<(), Error> {
        let now = clock.now();

        let rewards = self
            .pools
            .iter()
            .map(|pool| {
                let last = self.gauge(pool)?.last_reward_time();
                Ok((*pool, self.reward_between(pool, last, now)?))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        for (pool, reward) in rewards {
            self.gauge_mut(&pool)?.accrue(reward, now)?;
        }

        debug!(now, pools = self.pools.len(), "mass update");

        Ok(())
    }

    fn ensure_voter<L: VotingEscrow>(
        &self,
        escrow: &L,
        caller: &Address,
        lock_id: LockId,
    ) -> Result<(), Error> {
        if escrow.owner_of(lock_id).is_none() {
            return Err(Error::LockNotFound(lock_id));
        }

        if !escrow.is_approved_or_owner(caller, lock_id) {
            return Err(Error::NotOwner {
                caller: *caller,
                lock_id,
            });
        }

        Ok(())
    }

    fn cast<L: VotingEscrow>(
        &mut self,
        clock: &Clock,
        escrow: &mut L,
        lock_id: LockId,
        ballot: Ballot,
    ) -> Result<(), Error> {
        self.mass_update_pools(clock)?;

        let tally = self.votes.tally(lock_id, &ballot)?;

        escrow.voting(&self.address, lock_id)?;

        info!(
            lock_id,
            voter = %ballot.voter,
            weight = ballot.weight_at_vote,
            directed = ballot.total(),
            "votes cast"
        );

        self.votes.commit(lock_id, ballot, tally);

        Ok(())
    }

    /// Directs `weights` of the lock's current voting weight to `pools`,
    /// replacing whatever the lock voted before.
    pub fn vote<L: VotingEscrow>(
        &mut self,
        clock: &Clock,
        escrow: &mut L,
        caller: &Address,
        lock_id: LockId,
        pools: &[Address],
        weights: &[Amount],
    ) -> Result<(), Error> {
        self.ensure_voter(escrow, caller, lock_id)?;

        if pools.len() != weights.len() {
            return Err(Error::LengthMismatch {
                pools: pools.len(),
                weights: weights.len(),
            });
        }

        for pool in pools {
            if !self.gauge(pool)?.is_active() {
                return Err(Error::GaugeInactive(*pool));
            }
        }

        let now = clock.now();
        let available = escrow.balance_of_nft_at(lock_id, now);

        let requested = weights
            .iter()
            .try_fold(0 as Amount, |acc, w| acc.checked_add(*w))
            .ok_or(Error::Overflow)?;

        if requested > available {
            return Err(Error::WeightExceeded {
                requested,
                available,
            });
        }

        if available == 0 {
            warn!(lock_id, "voting with a lock that has no weight left");
        }

        let ballot = Ballot::new(
            *caller,
            now,
            available,
            pools.iter().copied().zip(weights.iter().copied()),
        );

        self.cast(clock, escrow, lock_id, ballot)
    }

    /// Re-casts the lock's ballot in the same proportions, scaled to the
    /// lock's current weight.
    pub fn poke<L: VotingEscrow>(
        &mut self,
        clock: &Clock,
        escrow: &mut L,
        caller: &Address,
        lock_id: LockId,
    ) -> Result<(), Error> {
        self.ensure_voter(escrow, caller, lock_id)?;

        let Some(previous) = self.votes.ballot(lock_id) else {
            debug!(lock_id, "poke on a lock without votes");
            return Ok(());
        };

        let now = clock.now();
        let available = escrow.balance_of_nft_at(lock_id, now);

        let allocations = previous
            .allocations
            .iter()
            .map(|(pool, w)| Ok((*pool, pro_rata(*w, available, previous.weight_at_vote)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let ballot = Ballot::new(*caller, now, available, allocations);

        self.cast(clock, escrow, lock_id, ballot)
    }

    /// Clears every vote of the lock
    pub fn abstain<L: VotingEscrow>(
        &mut self,
        clock: &Clock,
        escrow: &mut L,
        caller: &Address,
        lock_id: LockId,
    ) -> Result<(), Error> {
        self.ensure_voter(escrow, caller, lock_id)?;

        self.mass_update_pools(clock)?;

        escrow.abstain(&self.address, lock_id)?;

        if let Some(ballot) = self.votes.retract(lock_id) {
            info!(lock_id, directed = ballot.total(), "votes withdrawn");
        }

        Ok(())
    }

    /// Share of the pool's vote total controlled by the ballots `user` cast
    pub fn voter_share<L: VotingEscrow>(
        &self,
        escrow: &L,
        pool: &Address,
        user: &Address,
        t: Timestamp,
    ) -> Ratio {
        let ballots = self.votes.ballots_for(user, pool).map(|(lock_id, b)| {
            (
                b.directed(pool),
                b.weight_at_vote,
                escrow.balance_of_nft_at(lock_id, t),
            )
        });

        formulas::voter_share(ballots, self.votes.pool_votes(pool))
    }

    pub fn boost_multiplier<L: VotingEscrow>(
        &self,
        escrow: &L,
        pool: &Address,
        user: &Address,
        t: Timestamp,
    ) -> Ratio {
        let share = self.voter_share(escrow, pool, user, t);

        formulas::boost_multiplier(&share, self.base_share_percent)
    }

    fn payout_fraction<L: VotingEscrow>(
        &self,
        escrow: &L,
        pool: &Address,
        user: &Address,
        t: Timestamp,
    ) -> Ratio {
        let multiplier = self.boost_multiplier(escrow, pool, user, t);

        formulas::payout_fraction(&multiplier, self.base_share_percent)
    }

    /// Reward `user` would receive at the pool's full, un-boosted rate
    pub fn pending_max(&self, clock: &Clock, pool: &Address, user: &Address) -> Result<Amount, Error> {
        let gauge = self.gauge(pool)?;
        let now = clock.now();

        let acc = if now > gauge.last_reward_time() {
            let reward = self.reward_between(pool, gauge.last_reward_time(), now)?;
            gauge.projected_acc(reward)?
        } else {
            gauge.acc_reward_per_share()
        };

        gauge.pending_max_at(user, acc)
    }

    /// Reward `user` would receive right now, boost applied
    pub fn pending<L: VotingEscrow>(
        &self,
        clock: &Clock,
        escrow: &L,
        pool: &Address,
        user: &Address,
    ) -> Result<Amount, Error> {
        let pending_max = self.pending_max(clock, pool, user)?;
        let fraction = self.payout_fraction(escrow, pool, user, clock.now());

        formulas::boosted_pending(pending_max, &fraction)
    }

    pub fn user_info(&self, pool: &Address, user: &Address) -> Result<UserInfo, Error> {
        Ok(self.gauge(pool)?.user_info(user))
    }

    fn settle<T: TokenStore, L: VotingEscrow>(
        &mut self,
        ledger: &mut Ledger<T>,
        escrow: &L,
        pool: &Address,
        user: &Address,
        change: StakeChange,
    ) -> Result<Harvest, Error> {
        self.update_pool(&ledger.clock, pool)?;

        let fraction = self.payout_fraction(escrow, pool, user, ledger.now());

        let due = self.gauge(pool)?.harvest_of(user, &fraction)?;
        ledger.tokens.ensure_mintable(&self.reward_token, due.paid)?;

        let harvest = self.gauge_mut(pool)?.settle(user, &fraction, change)?;

        if harvest.paid > 0 {
            ledger
                .tokens
                .mint(&self.reward_token, user, harvest.paid)?;
        }

        debug!(
            %pool,
            %user,
            paid = harvest.paid,
            forfeited = harvest.forfeited,
            "reward settled"
        );

        Ok(harvest)
    }

    /// Stakes `amount` of pool token, harvesting the caller's reward first
    pub fn deposit<T: TokenStore, L: VotingEscrow>(
        &mut self,
        ledger: &mut Ledger<T>,
        escrow: &L,
        caller: &Address,
        pool: &Address,
        amount: Amount,
    ) -> Result<Harvest, Error> {
        let gauge = self.gauge(pool)?.address();

        ledger
            .tokens
            .ensure_transferable(pool, &gauge, caller, amount)?;

        let harvest = self.settle(ledger, escrow, pool, caller, StakeChange::Deposit(amount))?;

        ledger
            .tokens
            .transfer_from(pool, &gauge, caller, &gauge, amount)?;

        info!(%pool, %caller, amount, "deposit");

        Ok(harvest)
    }

    /// Unstakes `amount` of pool token. Withdrawing zero only harvests.
    pub fn withdraw<T: TokenStore, L: VotingEscrow>(
        &mut self,
        ledger: &mut Ledger<T>,
        escrow: &L,
        caller: &Address,
        pool: &Address,
        amount: Amount,
    ) -> Result<Harvest, Error> {
        let gauge = self.gauge(pool)?;
        let address = gauge.address();

        gauge.ensure_withdrawable(caller, amount)?;

        let harvest = self.settle(ledger, escrow, pool, caller, StakeChange::Withdraw(amount))?;

        ledger.tokens.transfer(pool, &address, caller, amount)?;

        info!(%pool, %caller, amount, "withdraw");

        Ok(harvest)
    }

    /// Pays out the boosted reward accrued by `user`
    pub fn get_reward<T: TokenStore, L: VotingEscrow>(
        &mut self,
        ledger: &mut Ledger<T>,
        escrow: &L,
        user: &Address,
        pool: &Address,
    ) -> Result<Harvest, Error> {
        self.gauge(pool)?;

        self.settle(ledger, escrow, pool, user, StakeChange::None)
    }
}

#[cfg(test)]
mod tests;
