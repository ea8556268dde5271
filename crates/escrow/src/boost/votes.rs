use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use veboost_core::{Address, Amount, Error, LockId, Timestamp};

/// The votes a lock currently directs, as cast by `voter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ballot {
    pub voter: Address,
    pub cast_at: Timestamp,
    pub weight_at_vote: Amount,
    pub allocations: Vec<(Address, Amount)>,
}

impl Ballot {
    /// Builds a ballot, merging repeated pools
    pub fn new<I>(voter: Address, cast_at: Timestamp, weight_at_vote: Amount, allocations: I) -> Self
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let allocations = allocations
            .into_iter()
            .into_group_map()
            .into_iter()
            .map(|(pool, weights)| (pool, weights.into_iter().sum()))
            .sorted()
            .collect();

        Self {
            voter,
            cast_at,
            weight_at_vote,
            allocations,
        }
    }

    pub fn directed(&self, pool: &Address) -> Amount {
        self.allocations
            .iter()
            .find(|(x, _)| x == pool)
            .map(|(_, w)| *w)
            .unwrap_or_default()
    }

    pub fn total(&self) -> Amount {
        self.allocations.iter().map(|(_, w)| *w).sum()
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct VoteBook {
    ballots: BTreeMap<LockId, Ballot>,
    pool_votes: BTreeMap<Address, Amount>,
}

impl VoteBook {
    pub fn ballot(&self, lock_id: LockId) -> Option<&Ballot> {
        self.ballots.get(&lock_id)
    }

    pub fn ballots(&self) -> impl Iterator<Item = (&LockId, &Ballot)> {
        self.ballots.iter()
    }

    /// Ballots cast by `voter` that direct weight to `pool`
    pub fn ballots_for<'a>(
        &'a self,
        voter: &'a Address,
        pool: &'a Address,
    ) -> impl Iterator<Item = (LockId, &'a Ballot)> + 'a {
        self.ballots
            .iter()
            .filter(move |(_, b)| &b.voter == voter && b.directed(pool) > 0)
            .map(|(id, b)| (*id, b))
    }

    pub fn pool_votes(&self, pool: &Address) -> Amount {
        self.pool_votes.get(pool).copied().unwrap_or_default()
    }

    pub fn total_votes(&self) -> Amount {
        self.pool_votes.values().sum()
    }

    /// Pool vote totals touched by swapping the ballot of `lock_id` for
    /// `ballot`, as they would be after the swap
    pub(crate) fn tally(
        &self,
        lock_id: LockId,
        ballot: &Ballot,
    ) -> Result<BTreeMap<Address, Amount>, Error> {
        let previous = self.ballots.get(&lock_id);

        let mut updated = BTreeMap::new();

        for (pool, weight) in previous.iter().flat_map(|b| b.allocations.iter()) {
            let entry = updated.entry(*pool).or_insert_with(|| self.pool_votes(pool));
            *entry -= weight;
        }

        for (pool, weight) in ballot.allocations.iter() {
            let entry = updated.entry(*pool).or_insert_with(|| self.pool_votes(pool));
            *entry = entry.checked_add(*weight).ok_or(Error::Overflow)?;
        }

        Ok(updated)
    }

    pub(crate) fn commit(
        &mut self,
        lock_id: LockId,
        ballot: Ballot,
        tally: BTreeMap<Address, Amount>,
    ) {
        self.pool_votes.extend(tally);
        self.ballots.insert(lock_id, ballot);
    }

    /// Swaps the ballot of `lock_id` for `ballot`. Nothing changes on error.
    pub fn replace(&mut self, lock_id: LockId, ballot: Ballot) -> Result<(), Error> {
        let tally = self.tally(lock_id, &ballot)?;
        self.commit(lock_id, ballot, tally);

        Ok(())
    }

    /// Removes the ballot of `lock_id`, returning it
    pub fn retract(&mut self, lock_id: LockId) -> Option<Ballot> {
        let ballot = self.ballots.remove(&lock_id)?;

        for (pool, weight) in ballot.allocations.iter() {
            if let Some(entry) = self.pool_votes.get_mut(pool) {
                *entry -= weight;
            }
        }

        Some(ballot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> (Address, Address) {
        (Address::derive("usdc"), Address::derive("dai"))
    }

    #[test]
    fn ballot_merges_repeated_pools() {
        let (usdc, dai) = pools();
        let voter = Address::derive("alice");

        let ballot = Ballot::new(voter, 0, 100, [(usdc, 10), (dai, 5), (usdc, 20)]);

        assert_eq!(ballot.directed(&usdc), 30);
        assert_eq!(ballot.directed(&dai), 5);
        assert_eq!(ballot.total(), 35);
        assert_eq!(ballot.allocations.len(), 2);
    }

    #[test]
    fn votes_overwrite_instead_of_adding() {
        let (usdc, dai) = pools();
        let voter = Address::derive("alice");
        let mut book = VoteBook::default();

        book.replace(1, Ballot::new(voter, 0, 100, [(usdc, 60), (dai, 40)]))
            .unwrap();
        book.replace(2, Ballot::new(voter, 0, 50, [(usdc, 50)]))
            .unwrap();

        assert_eq!(book.pool_votes(&usdc), 110);

        book.replace(1, Ballot::new(voter, 10, 90, [(dai, 90)]))
            .unwrap();

        assert_eq!(book.pool_votes(&usdc), 50);
        assert_eq!(book.pool_votes(&dai), 90);
        assert_eq!(book.total_votes(), 140);

        let retracted = book.retract(2).unwrap();
        assert_eq!(retracted.total(), 50);
        assert_eq!(book.pool_votes(&usdc), 0);
        assert!(book.retract(2).is_none());
    }

    #[test]
    fn ballots_are_attributed_to_their_voter() {
        let (usdc, _) = pools();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let mut book = VoteBook::default();

        book.replace(1, Ballot::new(alice, 0, 10, [(usdc, 10)]))
            .unwrap();
        book.replace(2, Ballot::new(bob, 0, 10, [(usdc, 10)]))
            .unwrap();

        let ids: Vec<_> = book.ballots_for(&alice, &usdc).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1]);
    }
}
