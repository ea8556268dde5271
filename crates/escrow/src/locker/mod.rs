//! Vote-escrow locker.
//!
//! Locks an escrowed token for a chosen duration and mints an NFT-like
//! position whose voting weight decays linearly to zero at its unlock time.
//! Weight accounting follows the slope/bias checkpoint model: every lock has a
//! `slope = amount / max_lock_duration` and its weight at `t` is
//! `slope × (end − t)`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use veboost_core::{
    config::LockerConfig, Address, Amount, BlockHeight, Clock, Error, Ledger, LockId, Timestamp,
    TokenStore, VotingEscrow,
};

mod history;

pub use history::Point;

use history::{changes_between, point_at_block, point_at_time, supply_at, BLOCK_SLOPE_SCALE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBalance {
    pub amount: Amount,
    pub end: Timestamp,
    pub created_at: Timestamp,
}

/// The lock state transition a checkpoint records
struct LockChange {
    lock_id: LockId,
    old: LockedBalance,
    new: LockedBalance,
}

pub struct Locker {
    address: Address,
    token: Address,
    operator: Address,
    max_time: u64,
    unit: u64,

    token_id: LockId,
    supply: Amount,

    locked: BTreeMap<LockId, LockedBalance>,
    owners: BTreeMap<LockId, Address>,
    owned: BTreeMap<Address, BTreeSet<LockId>>,
    approvals: BTreeMap<LockId, Address>,

    voted: BTreeSet<LockId>,
    boosts: BTreeSet<Address>,

    point_history: Vec<Point>,
    user_point_history: BTreeMap<LockId, Vec<Point>>,
    slope_changes: BTreeMap<Timestamp, i128>,
}

fn to_signed(value: Amount) -> Result<i128, Error> {
    i128::try_from(value).map_err(|_| Error::Overflow)
}

impl Locker {
    pub fn new(
        config: &LockerConfig,
        address: Address,
        token: Address,
        operator: Address,
        clock: &Clock,
    ) -> Self {
        Self {
            address,
            token,
            operator,
            max_time: config.max_lock_duration.max(1),
            unit: config.lock_unit.max(1),
            token_id: 0,
            supply: 0,
            locked: Default::default(),
            owners: Default::default(),
            owned: Default::default(),
            approvals: Default::default(),
            voted: Default::default(),
            boosts: Default::default(),
            point_history: vec![Point::genesis(clock.now(), clock.block())],
            user_point_history: Default::default(),
            slope_changes: Default::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn max_lock_duration(&self) -> u64 {
        self.max_time
    }

    pub fn lock_unit(&self) -> u64 {
        self.unit
    }

    /// The id of the most recently minted lock
    pub fn token_id(&self) -> LockId {
        self.token_id
    }

    /// Total amount of escrowed token currently held
    pub fn supply(&self) -> Amount {
        self.supply
    }

    pub fn add_boosts(&mut self, caller: &Address, boost: Address) -> Result<(), Error> {
        if caller != &self.operator {
            return Err(Error::NotOperator(*caller));
        }

        self.boosts.insert(boost);
        info!(%boost, "boost registered with locker");

        Ok(())
    }

    pub fn is_boost(&self, who: &Address) -> bool {
        self.boosts.contains(who)
    }

    fn round_to_unit(&self, t: Timestamp) -> Timestamp {
        (t / self.unit) * self.unit
    }

    fn unlock_time_for(&self, now: Timestamp, duration: u64) -> Result<Timestamp, Error> {
        let target = now.checked_add(duration).ok_or(Error::InvalidDuration)?;
        let unlock = self.round_to_unit(target);

        if unlock <= now || unlock > now.saturating_add(self.max_time) {
            return Err(Error::InvalidDuration);
        }

        Ok(unlock)
    }

    fn lock(&self, lock_id: LockId) -> Result<LockedBalance, Error> {
        self.locked
            .get(&lock_id)
            .copied()
            .ok_or(Error::LockNotFound(lock_id))
    }

    fn ensure_approved(&self, caller: &Address, lock_id: LockId) -> Result<(), Error> {
        if !self.owners.contains_key(&lock_id) {
            return Err(Error::LockNotFound(lock_id));
        }

        if !self.is_approved_or_owner(caller, lock_id) {
            return Err(Error::NotApproved {
                caller: *caller,
                lock_id,
            });
        }

        Ok(())
    }

    pub fn create_lock<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        caller: &Address,
        amount: Amount,
        duration: u64,
    ) -> Result<LockId, Error> {
        self.create_lock_for(ledger, caller, amount, duration, *caller)
    }

    /// Locks the caller's tokens into a new position owned by `to`
    pub fn create_lock_for<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        caller: &Address,
        amount: Amount,
        duration: u64,
        to: Address,
    ) -> Result<LockId, Error> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let now = ledger.now();
        let unlock_time = self.unlock_time_for(now, duration)?;

        to_signed(amount)?;

        ledger
            .tokens
            .ensure_transferable(&self.token, &self.address, caller, amount)?;

        let lock_id = self.token_id + 1;

        let old = LockedBalance {
            amount: 0,
            end: 0,
            created_at: now,
        };

        self.deposit(ledger, caller, lock_id, amount, Some(unlock_time), old)?;

        self.token_id = lock_id;
        self.owners.insert(lock_id, to);
        self.owned.entry(to).or_default().insert(lock_id);

        info!(lock_id, owner = %to, amount, unlock_time, "lock created");

        Ok(lock_id)
    }

    /// Adds `amount` to an existing lock without touching its unlock time
    pub fn deposit_for<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        caller: &Address,
        lock_id: LockId,
        amount: Amount,
    ) -> Result<(), Error> {
        let old = self.lock(lock_id)?;

        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        if old.end <= ledger.now() || old.amount == 0 {
            return Err(Error::LockExpired(lock_id));
        }

        old.amount
            .checked_add(amount)
            .and_then(|x| i128::try_from(x).ok())
            .ok_or(Error::Overflow)?;

        ledger
            .tokens
            .ensure_transferable(&self.token, &self.address, caller, amount)?;

        self.deposit(ledger, caller, lock_id, amount, None, old)?;

        info!(lock_id, amount, "deposit for lock");

        Ok(())
    }

    /// Moves the unlock time of a live lock further into the future
    pub fn increase_unlock_time<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        caller: &Address,
        lock_id: LockId,
        duration: u64,
    ) -> Result<Timestamp, Error> {
        self.ensure_approved(caller, lock_id)?;

        let old = self.lock(lock_id)?;
        let now = ledger.now();

        if old.end <= now || old.amount == 0 {
            return Err(Error::LockExpired(lock_id));
        }

        let target = now.checked_add(duration).ok_or(Error::InvalidDuration)?;
        let unlock_time = self.round_to_unit(target);

        if unlock_time <= old.end {
            return Err(Error::UnlockNotIncreased(lock_id));
        }

        if unlock_time > now.saturating_add(self.max_time) {
            return Err(Error::InvalidDuration);
        }

        self.deposit(ledger, caller, lock_id, 0, Some(unlock_time), old)?;

        info!(lock_id, unlock_time, "unlock time increased");

        Ok(unlock_time)
    }

    /// Returns the escrowed tokens of an expired lock to its owner. The lock
    /// record stays around, inert, with a zero amount.
    pub fn withdraw<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        caller: &Address,
        lock_id: LockId,
    ) -> Result<Amount, Error> {
        self.ensure_approved(caller, lock_id)?;

        if self.voted.contains(&lock_id) {
            return Err(Error::LockVoted(lock_id));
        }

        let old = self.lock(lock_id)?;

        if ledger.now() < old.end {
            return Err(Error::LockNotExpired(lock_id));
        }

        let owner = self
            .owners
            .get(&lock_id)
            .copied()
            .ok_or(Error::LockNotFound(lock_id))?;

        let value = old.amount;

        ledger
            .tokens
            .transfer(&self.token, &self.address, &owner, value)?;

        let new = LockedBalance {
            amount: 0,
            end: 0,
            created_at: old.created_at,
        };

        self.locked.insert(lock_id, new);
        self.supply -= value;

        self.checkpoint_with(
            &ledger.clock,
            Some(LockChange {
                lock_id,
                old,
                new,
            }),
        )?;

        info!(lock_id, %owner, value, "lock withdrawn");

        Ok(value)
    }

    fn deposit<T: TokenStore>(
        &mut self,
        ledger: &mut Ledger<T>,
        from: &Address,
        lock_id: LockId,
        value: Amount,
        unlock_time: Option<Timestamp>,
        old: LockedBalance,
    ) -> Result<(), Error> {
        if value > 0 {
            ledger
                .tokens
                .transfer_from(&self.token, &self.address, from, &self.address, value)?;
        }

        let mut new = old;
        new.amount += value;

        if let Some(end) = unlock_time {
            new.end = end;
        }

        self.locked.insert(lock_id, new);
        self.supply += value;

        self.checkpoint_with(
            &ledger.clock,
            Some(LockChange {
                lock_id,
                old,
                new,
            }),
        )
    }

    /// Records a global checkpoint without any lock change
    pub fn checkpoint(&mut self, clock: &Clock) -> Result<(), Error> {
        self.checkpoint_with(clock, None)
    }

    fn checkpoint_with(&mut self, clock: &Clock, change: Option<LockChange>) -> Result<(), Error> {
        let now = clock.now();
        let block = clock.block();

        let mut u_old = Point::default();
        let mut u_new = Point::default();
        let mut old_dslope = 0i128;
        let mut new_dslope = 0i128;

        if let Some(LockChange { old, new, .. }) = &change {
            let max_time = self.max_time as u128;

            if old.end > now && old.amount > 0 {
                u_old.slope = to_signed(old.amount / max_time)?;
                u_old.bias = u_old.slope * (old.end - now) as i128;
            }

            if new.end > now && new.amount > 0 {
                u_new.slope = to_signed(new.amount / max_time)?;
                u_new.bias = u_new.slope * (new.end - now) as i128;
            }

            old_dslope = self.slope_changes.get(&old.end).copied().unwrap_or_default();

            if new.end != 0 {
                if new.end == old.end {
                    new_dslope = old_dslope;
                } else {
                    new_dslope = self.slope_changes.get(&new.end).copied().unwrap_or_default();
                }
            }
        }

        let initial = self
            .point_history
            .last()
            .copied()
            .unwrap_or(Point::genesis(now, block));

        let mut last_point = initial;
        let mut last_checkpoint = initial.ts;

        let block_slope = if now > initial.ts {
            (block - initial.blk) as u128 * BLOCK_SLOPE_SCALE / (now - initial.ts) as u128
        } else {
            0
        };

        // one point per scheduled slope change crossed since the last one
        for (t_i, d_slope) in changes_between(&self.slope_changes, last_checkpoint, now) {
            last_point.bias -= last_point.slope * (t_i - last_checkpoint) as i128;
            last_point.slope += d_slope;
            last_point.bias = last_point.bias.max(0);
            last_point.slope = last_point.slope.max(0);

            last_checkpoint = t_i;
            last_point.ts = t_i;
            last_point.blk = initial.blk
                + (block_slope * (t_i - initial.ts) as u128 / BLOCK_SLOPE_SCALE) as BlockHeight;

            if t_i < now {
                self.point_history.push(last_point);
            }
        }

        last_point.bias -= last_point.slope * (now - last_checkpoint) as i128;
        last_point.bias = last_point.bias.max(0);
        last_point.ts = now;
        last_point.blk = block;

        if change.is_some() {
            last_point.slope = (last_point.slope + u_new.slope - u_old.slope).max(0);
            last_point.bias = (last_point.bias + u_new.bias - u_old.bias).max(0);
        }

        self.point_history.push(last_point);

        debug!(
            epoch = self.epoch(),
            bias = last_point.bias,
            slope = last_point.slope,
            "global checkpoint"
        );

        let Some(LockChange { lock_id, old, new }) = change else {
            return Ok(());
        };

        if old.end > now {
            old_dslope += u_old.slope;

            if new.end == old.end {
                old_dslope -= u_new.slope;
            }

            self.slope_changes.insert(old.end, old_dslope);
        }

        if new.end > now && new.end > old.end {
            new_dslope -= u_new.slope;
            self.slope_changes.insert(new.end, new_dslope);
        }

        u_new.ts = now;
        u_new.blk = block;

        self.user_point_history
            .entry(lock_id)
            .or_default()
            .push(u_new);

        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        lock_id: LockId,
    ) -> Result<(), Error> {
        let owner = self
            .owners
            .get(&lock_id)
            .copied()
            .ok_or(Error::LockNotFound(lock_id))?;

        if &owner != from {
            return Err(Error::NotOwner {
                caller: *from,
                lock_id,
            });
        }

        if !self.is_approved_or_owner(caller, lock_id) {
            return Err(Error::NotApproved {
                caller: *caller,
                lock_id,
            });
        }

        self.approvals.remove(&lock_id);

        if let Some(set) = self.owned.get_mut(from) {
            set.remove(&lock_id);
        }

        self.owned.entry(*to).or_default().insert(lock_id);
        self.owners.insert(lock_id, *to);

        if self.voted.contains(&lock_id) {
            debug!(lock_id, "lock transferred with votes attached");
        }

        info!(lock_id, %from, %to, "lock transferred");

        Ok(())
    }

    pub fn approve(
        &mut self,
        caller: &Address,
        approved: Address,
        lock_id: LockId,
    ) -> Result<(), Error> {
        let owner = self
            .owners
            .get(&lock_id)
            .copied()
            .ok_or(Error::LockNotFound(lock_id))?;

        if &owner != caller {
            return Err(Error::NotOwner {
                caller: *caller,
                lock_id,
            });
        }

        if approved.is_zero() {
            self.approvals.remove(&lock_id);
        } else {
            self.approvals.insert(lock_id, approved);
        }

        Ok(())
    }

    pub fn get_approved(&self, lock_id: LockId) -> Option<Address> {
        self.approvals.get(&lock_id).copied()
    }

    /// Number of locks owned by `owner`
    pub fn balance_of(&self, owner: &Address) -> usize {
        self.owned.get(owner).map(|x| x.len()).unwrap_or_default()
    }

    pub fn locks_of(&self, owner: &Address) -> impl Iterator<Item = LockId> + '_ {
        self.owned.get(owner).into_iter().flatten().copied()
    }

    pub fn locked(&self, lock_id: LockId) -> Option<LockedBalance> {
        self.locked.get(&lock_id).copied()
    }

    pub fn voted(&self, lock_id: LockId) -> bool {
        self.voted.contains(&lock_id)
    }

    /// Index of the latest global checkpoint
    pub fn epoch(&self) -> usize {
        self.point_history.len() - 1
    }

    pub fn point_history(&self, epoch: usize) -> Option<Point> {
        self.point_history.get(epoch).copied()
    }

    /// Number of checkpoints recorded for a lock
    pub fn user_point_epoch(&self, lock_id: LockId) -> usize {
        self.user_point_history
            .get(&lock_id)
            .map(|x| x.len())
            .unwrap_or_default()
    }

    pub fn user_point_history(&self, lock_id: LockId, idx: usize) -> Option<Point> {
        self.user_point_history
            .get(&lock_id)
            .and_then(|x| x.get(idx))
            .copied()
    }

    pub fn user_point_history_ts(&self, lock_id: LockId, idx: usize) -> Option<Timestamp> {
        self.user_point_history(lock_id, idx).map(|p| p.ts)
    }

    pub fn get_last_user_slope(&self, lock_id: LockId) -> i128 {
        self.user_point_history
            .get(&lock_id)
            .and_then(|x| x.last())
            .map(|p| p.slope)
            .unwrap_or_default()
    }

    pub fn block_number(&self, clock: &Clock) -> BlockHeight {
        clock.block()
    }

    /// Current voting weight of a lock
    pub fn balance_of_nft(&self, lock_id: LockId, clock: &Clock) -> Amount {
        self.balance_of_nft_at(lock_id, clock.now())
    }

    /// Weight of a lock at a past block, interpolating the block's timestamp
    /// from the global history.
    pub fn balance_of_at_nft(&self, lock_id: LockId, block: BlockHeight, clock: &Clock) -> Amount {
        if block > clock.block() {
            return 0;
        }

        let Some(points) = self.user_point_history.get(&lock_id) else {
            return 0;
        };

        let Some((_, upoint)) = point_at_block(points, block) else {
            return 0;
        };

        let block_time = self.block_time_estimate(block, clock);

        upoint.weight_at(block_time.max(upoint.ts))
    }

    fn block_time_estimate(&self, block: BlockHeight, clock: &Clock) -> Timestamp {
        let Some((epoch, point0)) = point_at_block(&self.point_history, block) else {
            return self.point_history[0].ts;
        };

        let (d_block, d_t) = match self.point_history.get(epoch + 1) {
            Some(point1) => (point1.blk - point0.blk, point1.ts - point0.ts),
            None => (clock.block() - point0.blk, clock.now() - point0.ts),
        };

        if d_block == 0 {
            return point0.ts;
        }

        point0.ts + d_t * (block - point0.blk) / d_block
    }

    /// Aggregate voting weight at timestamp `t`
    pub fn total_supply_at_t(&self, t: Timestamp) -> Amount {
        match point_at_time(&self.point_history, t) {
            Some(point) => supply_at(point, t, &self.slope_changes),
            None => 0,
        }
    }

    pub fn total_supply(&self, clock: &Clock) -> Amount {
        self.total_supply_at_t(clock.now())
    }

    /// Aggregate voting weight at a past block
    pub fn total_supply_at(&self, block: BlockHeight, clock: &Clock) -> Amount {
        if block > clock.block() {
            return 0;
        }

        let Some((_, point)) = point_at_block(&self.point_history, block) else {
            return 0;
        };

        let t = self.block_time_estimate(block, clock).max(point.ts);

        supply_at(point, t, &self.slope_changes)
    }

    /// A JSON description of a lock
    pub fn lock_metadata(&self, lock_id: LockId, clock: &Clock) -> Result<serde_json::Value, Error> {
        let locked = self.lock(lock_id)?;
        let owner = self.owners.get(&lock_id).copied();

        Ok(serde_json::json!({
            "name": format!("lock #{lock_id}"),
            "token_id": lock_id,
            "owner": owner,
            "amount": locked.amount.to_string(),
            "locked_end": locked.end,
            "created_at": locked.created_at,
            "voting_weight": self.balance_of_nft(lock_id, clock).to_string(),
            "voted": self.voted(lock_id),
        }))
    }
}

impl VotingEscrow for Locker {
    fn owner_of(&self, lock_id: LockId) -> Option<Address> {
        self.owners.get(&lock_id).copied()
    }

    fn is_approved_or_owner(&self, spender: &Address, lock_id: LockId) -> bool {
        let owner = self.owners.get(&lock_id);
        let approved = self.approvals.get(&lock_id);

        owner == Some(spender) || approved == Some(spender)
    }

    fn balance_of_nft_at(&self, lock_id: LockId, t: Timestamp) -> Amount {
        let Some(points) = self.user_point_history.get(&lock_id) else {
            return 0;
        };

        match point_at_time(points, t) {
            Some(point) => point.weight_at(t),
            None => 0,
        }
    }

    fn locked_end(&self, lock_id: LockId) -> Option<Timestamp> {
        self.locked.get(&lock_id).map(|x| x.end)
    }

    fn voting(&mut self, caller: &Address, lock_id: LockId) -> Result<(), Error> {
        if !self.boosts.contains(caller) {
            return Err(Error::NotBoost(*caller));
        }

        if !self.locked.contains_key(&lock_id) {
            return Err(Error::LockNotFound(lock_id));
        }

        self.voted.insert(lock_id);

        Ok(())
    }

    fn abstain(&mut self, caller: &Address, lock_id: LockId) -> Result<(), Error> {
        if !self.boosts.contains(caller) {
            return Err(Error::NotBoost(*caller));
        }

        if !self.voted.remove(&lock_id) {
            warn!(lock_id, "abstain on a lock without votes");
        }

        Ok(())
    }
}
