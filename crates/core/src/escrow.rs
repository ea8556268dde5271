use crate::{Address, Amount, Error, LockId, Timestamp};

/// Read access to lock positions, plus the vote bookkeeping hooks a boost
/// contract needs. The locker implements it; boosts and gauges only ever see
/// this trait.
pub trait VotingEscrow {
    fn owner_of(&self, lock_id: LockId) -> Option<Address>;

    fn is_approved_or_owner(&self, spender: &Address, lock_id: LockId) -> bool;

    /// Voting weight of a lock at an arbitrary timestamp
    fn balance_of_nft_at(&self, lock_id: LockId, t: Timestamp) -> Amount;

    fn locked_end(&self, lock_id: LockId) -> Option<Timestamp>;

    /// Flags a lock as having votes attached. Only registered boosts may call.
    fn voting(&mut self, caller: &Address, lock_id: LockId) -> Result<(), Error>;

    /// Clears the voted flag. Only registered boosts may call.
    fn abstain(&mut self, caller: &Address, lock_id: LockId) -> Result<(), Error>;
}
