//! Per-pool staking ledger.
//!
//! A gauge only does the accounting: the boost contract decides how much
//! reward reaches the gauge, which fraction of it a depositor is paid and it
//! moves the tokens.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use veboost_core::{Address, Amount, Error, Timestamp};

use crate::formulas::{acc_increment, accrued, boosted_pending, Ratio};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub amount: Amount,
    pub reward_debt: Amount,
    pub claimed: Amount,
}

/// The outcome of settling a user's accrued reward
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Harvest {
    pub paid: Amount,
    pub forfeited: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct Gauge {
    address: Address,
    pool: Address,
    base_weight: Amount,
    active: bool,
    total_supply: Amount,
    acc_reward_per_share: Amount,
    last_reward_time: Timestamp,
    distributed: Amount,
    forfeited: Amount,
    users: BTreeMap<Address, UserInfo>,
}

impl Gauge {
    pub fn new(
        address: Address,
        pool: Address,
        base_weight: Amount,
        active: bool,
        start: Timestamp,
    ) -> Self {
        Self {
            address,
            pool,
            base_weight,
            active,
            total_supply: 0,
            acc_reward_per_share: 0,
            last_reward_time: start,
            distributed: 0,
            forfeited: 0,
            users: Default::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pool(&self) -> Address {
        self.pool
    }

    pub fn base_weight(&self) -> Amount {
        self.base_weight
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn configure(&mut self, base_weight: Amount, active: bool) {
        self.base_weight = base_weight;
        self.active = active;
    }

    /// Total amount of pool token deposited
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn acc_reward_per_share(&self) -> Amount {
        self.acc_reward_per_share
    }

    pub fn last_reward_time(&self) -> Timestamp {
        self.last_reward_time
    }

    /// Boosted rewards paid out so far
    pub fn distributed(&self) -> Amount {
        self.distributed
    }

    /// Un-boosted rewards depositors did not receive
    pub fn forfeited(&self) -> Amount {
        self.forfeited
    }

    pub fn user_info(&self, user: &Address) -> UserInfo {
        self.users.get(user).copied().unwrap_or_default()
    }

    pub fn depositors(&self) -> impl Iterator<Item = (&Address, &UserInfo)> {
        self.users.iter()
    }

    /// Accumulator value after crediting `reward`, without storing it
    pub(crate) fn projected_acc(&self, reward: Amount) -> Result<Amount, Error> {
        let inc = acc_increment(reward, self.total_supply)?;

        self.acc_reward_per_share
            .checked_add(inc)
            .ok_or(Error::Overflow)
    }

    /// Credits `reward` emitted up to `now` to the depositors
    pub(crate) fn accrue(&mut self, reward: Amount, now: Timestamp) -> Result<(), Error> {
        if now <= self.last_reward_time {
            return Ok(());
        }

        if self.total_supply > 0 {
            self.acc_reward_per_share = self.projected_acc(reward)?;
        }

        self.last_reward_time = now;

        debug!(
            gauge = %self.address,
            reward,
            acc = self.acc_reward_per_share,
            "gauge accrued"
        );

        Ok(())
    }

    /// Un-boosted reward owed to `user` for the accumulator value `acc`
    pub(crate) fn pending_max_at(&self, user: &Address, acc: Amount) -> Result<Amount, Error> {
        let info = self.user_info(user);
        let owed = accrued(info.amount, acc)?;

        Ok(owed.saturating_sub(info.reward_debt))
    }

    /// Checks a stake change of `user` would be accepted
    pub(crate) fn ensure_withdrawable(&self, user: &Address, amount: Amount) -> Result<(), Error> {
        let deposited = self.user_info(user).amount;

        if amount > deposited {
            return Err(Error::WithdrawExceedsDeposit {
                requested: amount,
                deposited,
            });
        }

        Ok(())
    }

    /// What settling `user` at the stored accumulator would pay out
    pub(crate) fn harvest_of(&self, user: &Address, fraction: &Ratio) -> Result<Harvest, Error> {
        let pending_max = self.pending_max_at(user, self.acc_reward_per_share)?;
        let paid = boosted_pending(pending_max, fraction)?;

        Ok(Harvest {
            paid,
            forfeited: pending_max - paid,
        })
    }

    /// Settles the accrued reward of `user` at the stored accumulator, paying
    /// `fraction` of it. `delta` is then applied to the stake.
    pub(crate) fn settle(
        &mut self,
        user: &Address,
        fraction: &Ratio,
        delta: StakeChange,
    ) -> Result<Harvest, Error> {
        let acc = self.acc_reward_per_share;
        let harvest = self.harvest_of(user, fraction)?;

        let mut info = self.user_info(user);

        let amount = match delta {
            StakeChange::Deposit(x) => info.amount.checked_add(x).ok_or(Error::Overflow)?,
            StakeChange::Withdraw(x) => {
                self.ensure_withdrawable(user, x)?;
                info.amount - x
            }
            StakeChange::None => info.amount,
        };

        let total_supply = self
            .total_supply
            .checked_add(amount)
            .and_then(|x| x.checked_sub(info.amount))
            .ok_or(Error::Overflow)?;

        info.reward_debt = accrued(amount, acc)?;
        info.amount = amount;
        info.claimed += harvest.paid;

        self.total_supply = total_supply;
        self.users.insert(*user, info);

        self.distributed += harvest.paid;
        self.forfeited += harvest.forfeited;

        Ok(harvest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StakeChange {
    Deposit(Amount),
    Withdraw(Amount),
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratio;

    fn gauge() -> Gauge {
        Gauge::new(
            Address::derive("gauge"),
            Address::derive("usdc"),
            100,
            true,
            1_000,
        )
    }

    #[test]
    fn reward_splits_by_deposit() {
        let mut gauge = gauge();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let full = ratio!(1);

        gauge
            .settle(&alice, &full, StakeChange::Deposit(300))
            .unwrap();
        gauge.settle(&bob, &full, StakeChange::Deposit(100)).unwrap();

        gauge.accrue(4_000, 1_010).unwrap();

        let acc = gauge.acc_reward_per_share();
        assert_eq!(gauge.pending_max_at(&alice, acc).unwrap(), 3_000);
        assert_eq!(gauge.pending_max_at(&bob, acc).unwrap(), 1_000);
    }

    #[test]
    fn settle_pays_fraction_and_tracks_forfeit() {
        let mut gauge = gauge();
        let alice = Address::derive("alice");

        gauge
            .settle(&alice, &ratio!(1), StakeChange::Deposit(10))
            .unwrap();
        gauge.accrue(1_000, 1_100).unwrap();

        let harvest = gauge
            .settle(&alice, &ratio!(3, 10), StakeChange::None)
            .unwrap();

        assert_eq!(harvest.paid, 300);
        assert_eq!(harvest.forfeited, 700);
        assert_eq!(gauge.user_info(&alice).claimed, 300);

        let again = gauge
            .settle(&alice, &ratio!(3, 10), StakeChange::None)
            .unwrap();

        assert_eq!(again, Harvest::default());
    }

    #[test]
    fn over_withdrawal_is_rejected_untouched() {
        let mut gauge = gauge();
        let alice = Address::derive("alice");

        gauge
            .settle(&alice, &ratio!(1), StakeChange::Deposit(10))
            .unwrap();

        let err = gauge
            .settle(&alice, &ratio!(1), StakeChange::Withdraw(11))
            .unwrap_err();

        assert_eq!(err.reason(), "withdrawSwap: not good");
        assert_eq!(gauge.user_info(&alice).amount, 10);
        assert_eq!(gauge.total_supply(), 10);
    }

    #[test]
    fn empty_gauge_accrues_nothing() {
        let mut gauge = gauge();

        gauge.accrue(1_000, 1_050).unwrap();

        assert_eq!(gauge.acc_reward_per_share(), 0);
        assert_eq!(gauge.last_reward_time(), 1_050);
    }
}
