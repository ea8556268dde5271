use std::collections::BTreeSet;

use veboost_core::{
    config::{ClockConfig, EmissionConfig, LockerConfig},
    ErrorKind, MemoryTokens, SECONDS_PER_WEEK, WEI,
};

use super::*;
use crate::{locker::Locker, ratio};

const GENESIS: Timestamp = 1_609_977_600;

struct Fixture {
    ledger: Ledger<MemoryTokens>,
    locker: Locker,
    boost: Boost,
    operator: Address,
    fxs: Address,
    usdc: Address,
    dai: Address,
    alice: Address,
    bob: Address,
}

fn fixture() -> Fixture {
    let clock = Clock::new(&ClockConfig {
        genesis_timestamp: GENESIS,
        ..Default::default()
    });

    let operator = Address::derive("operator");
    let fxs = Address::derive("fxs");
    let usdc = Address::derive("usdc");
    let dai = Address::derive("dai");
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");

    let mut locker = Locker::new(
        &LockerConfig::default(),
        Address::derive_child(&operator, "locker"),
        fxs,
        operator,
        &clock,
    );

    let schedule = EmissionSchedule::new(&EmissionConfig::default(), clock.now()).unwrap();

    let mut boost = Boost::new(
        &BoostConfig::default(),
        schedule,
        Address::derive_child(&operator, "boost"),
        operator,
        fxs,
    );

    locker.add_boosts(&operator, boost.address()).unwrap();

    let usdc_gauge = boost.create_gauge(&clock, &operator, usdc, 100, true).unwrap();
    let dai_gauge = boost.create_gauge(&clock, &operator, dai, 100, true).unwrap();

    let mut tokens = MemoryTokens::new();

    for who in [alice, bob] {
        tokens.mint(&fxs, &who, 1_000 * WEI).unwrap();
        tokens.approve(&fxs, &who, &locker.address(), Amount::MAX);

        tokens.mint(&usdc, &who, 1_000 * WEI).unwrap();
        tokens.approve(&usdc, &who, &usdc_gauge, Amount::MAX);

        tokens.mint(&dai, &who, 1_000 * WEI).unwrap();
        tokens.approve(&dai, &who, &dai_gauge, Amount::MAX);
    }

    Fixture {
        ledger: Ledger::new(clock, tokens),
        locker,
        boost,
        operator,
        fxs,
        usdc,
        dai,
        alice,
        bob,
    }
}

/// An escrow where every lock carries the largest possible weight
#[derive(Default)]
struct Whale {
    voted: BTreeSet<LockId>,
}

impl VotingEscrow for Whale {
    fn owner_of(&self, _: LockId) -> Option<Address> {
        Some(Address::derive("whale"))
    }

    fn is_approved_or_owner(&self, _: &Address, _: LockId) -> bool {
        true
    }

    fn balance_of_nft_at(&self, _: LockId, _: Timestamp) -> Amount {
        Amount::MAX
    }

    fn locked_end(&self, _: LockId) -> Option<Timestamp> {
        Some(Timestamp::MAX)
    }

    fn voting(&mut self, _: &Address, lock_id: LockId) -> Result<(), Error> {
        self.voted.insert(lock_id);
        Ok(())
    }

    fn abstain(&mut self, _: &Address, lock_id: LockId) -> Result<(), Error> {
        self.voted.remove(&lock_id);
        Ok(())
    }
}

impl Fixture {
    fn lock(&mut self, who: Address, amount: Amount, duration: u64) -> LockId {
        self.locker
            .create_lock(&mut self.ledger, &who, amount, duration)
            .unwrap()
    }

    fn weight(&self, lock_id: LockId) -> Amount {
        self.locker.balance_of_nft(lock_id, &self.ledger.clock)
    }

    fn vote(&mut self, who: Address, lock_id: LockId, pools: &[Address], weights: &[Amount]) -> Result<(), Error> {
        self.boost.vote(
            &self.ledger.clock,
            &mut self.locker,
            &who,
            lock_id,
            pools,
            weights,
        )
    }

    fn deposit(&mut self, who: Address, pool: Address, amount: Amount) -> Harvest {
        self.boost
            .deposit(&mut self.ledger, &self.locker, &who, &pool, amount)
            .unwrap()
    }

    fn pending_max(&self, pool: Address, who: Address) -> Amount {
        self.boost
            .pending_max(&self.ledger.clock, &pool, &who)
            .unwrap()
    }

    fn pending(&self, pool: Address, who: Address) -> Amount {
        self.boost
            .pending(&self.ledger.clock, &self.locker, &pool, &who)
            .unwrap()
    }
}

#[test]
fn gauges_are_registered_once() {
    let mut f = fixture();
    let clock = f.ledger.clock.clone();
    let alice = f.alice;
    let usdc = f.usdc;

    assert_eq!(f.boost.pool_length(), 2);

    let gauge = f.boost.gauges(&usdc).unwrap();
    assert_eq!(f.boost.pool_for_gauge(&gauge), Some(usdc));

    let err = f
        .boost
        .create_gauge(&clock, &f.operator, usdc, 1, true)
        .unwrap_err();
    assert_eq!(err, Error::GaugeExists(usdc));

    let other = Address::derive("frax");
    let err = f
        .boost
        .create_gauge(&clock, &alice, other, 1, true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(f.boost.pool_length(), 2);
}

#[test]
fn base_weights_split_emission_until_someone_votes() {
    let mut f = fixture();
    let (alice, bob, usdc, dai) = (f.alice, f.bob, f.usdc, f.dai);

    f.deposit(alice, usdc, 10 * WEI);
    f.deposit(bob, dai, 10 * WEI);

    assert_eq!(f.boost.reward_rate(&usdc, &f.ledger.clock).unwrap(), WEI / 2);

    f.ledger.clock.advance(100);

    assert_eq!(f.pending_max(usdc, alice), 50 * WEI);
    assert_eq!(f.pending_max(dai, bob), 50 * WEI);

    // the vote first settles the old split, then routes everything to usdc
    let lock = f.lock(alice, 100 * WEI, 52 * SECONDS_PER_WEEK);
    let weight = f.weight(lock);
    f.vote(alice, lock, &[usdc], &[weight]).unwrap();

    f.ledger.clock.advance(100);

    assert_eq!(f.pending_max(usdc, alice), 150 * WEI);
    assert_eq!(f.pending_max(dai, bob), 50 * WEI);
    assert_eq!(f.boost.reward_rate(&usdc, &f.ledger.clock).unwrap(), WEI);
    assert_eq!(f.boost.reward_rate(&dai, &f.ledger.clock).unwrap(), 0);
}

#[test]
fn inactive_gauges_get_nothing() {
    let mut f = fixture();
    let (alice, usdc, dai) = (f.alice, f.usdc, f.dai);
    let clock = f.ledger.clock.clone();

    f.boost
        .set_gauge(&clock, &f.operator, &dai, 100, false)
        .unwrap();

    assert_eq!(f.boost.reward_rate(&usdc, &clock).unwrap(), WEI);
    assert_eq!(f.boost.reward_rate(&dai, &clock).unwrap(), 0);

    let lock = f.lock(alice, 100 * WEI, SECONDS_PER_WEEK * 10);
    let err = f.vote(alice, lock, &[dai], &[1]).unwrap_err();
    assert_eq!(err, Error::GaugeInactive(dai));
}

#[test]
fn rejected_votes_leave_no_trace() {
    let mut f = fixture();
    let (alice, bob, usdc, dai) = (f.alice, f.bob, f.usdc, f.dai);

    let lock = f.lock(alice, 100 * WEI, 52 * SECONDS_PER_WEEK);
    let weight = f.weight(lock);

    let err = f.vote(alice, lock, &[usdc, dai], &[1]).unwrap_err();
    assert_eq!(err.reason(), "length mismatch");

    let err = f
        .vote(alice, lock, &[usdc, dai], &[weight, 1])
        .unwrap_err();
    assert_eq!(err.reason(), "weight exceeded");

    let err = f.vote(bob, lock, &[usdc], &[1]).unwrap_err();
    assert_eq!(err.reason(), "not owner");

    let frax = Address::derive("frax");
    let err = f.vote(alice, lock, &[frax], &[1]).unwrap_err();
    assert_eq!(err, Error::GaugeNotFound(frax));

    let err = f.vote(alice, 77, &[usdc], &[1]).unwrap_err();
    assert_eq!(err, Error::LockNotFound(77));

    assert_eq!(f.boost.total_votes(), 0);
    assert!(f.boost.votes_of(lock).is_none());
    assert!(!f.locker.voted(lock));
}

#[test]
fn votes_overwrite_and_abstain_clears() {
    let mut f = fixture();
    let (alice, usdc, dai) = (f.alice, f.usdc, f.dai);

    let lock = f.lock(alice, 100 * WEI, 52 * SECONDS_PER_WEEK);
    let weight = f.weight(lock);

    f.vote(alice, lock, &[usdc, dai], &[weight / 2, weight / 2])
        .unwrap();
    assert_eq!(f.boost.pool_votes(&usdc), weight / 2);
    assert!(f.locker.voted(lock));

    f.vote(alice, lock, &[dai], &[weight]).unwrap();
    assert_eq!(f.boost.pool_votes(&usdc), 0);
    assert_eq!(f.boost.pool_votes(&dai), weight);
    assert_eq!(f.boost.total_votes(), weight);

    let clock = f.ledger.clock.clone();
    f.boost
        .abstain(&clock, &mut f.locker, &alice, lock)
        .unwrap();

    assert_eq!(f.boost.total_votes(), 0);
    assert!(!f.locker.voted(lock));

    // with no votes left the base weights are back in charge
    assert_eq!(f.boost.reward_rate(&usdc, &clock).unwrap(), WEI / 2);
}

#[test]
fn poke_rescales_to_current_weight() {
    let mut f = fixture();
    let (alice, usdc, dai) = (f.alice, f.usdc, f.dai);

    let lock = f.lock(alice, 100 * WEI, 20 * SECONDS_PER_WEEK);
    let cast_weight = f.weight(lock);
    let (a, b) = (cast_weight / 4, cast_weight - cast_weight / 4);

    f.vote(alice, lock, &[usdc, dai], &[a, b]).unwrap();

    f.ledger.clock.advance(10 * SECONDS_PER_WEEK);
    let now_weight = f.weight(lock);

    let clock = f.ledger.clock.clone();
    f.boost.poke(&clock, &mut f.locker, &alice, lock).unwrap();

    assert_eq!(
        f.boost.pool_votes(&usdc),
        pro_rata(a, now_weight, cast_weight).unwrap()
    );
    assert_eq!(
        f.boost.pool_votes(&dai),
        pro_rata(b, now_weight, cast_weight).unwrap()
    );
    assert_eq!(f.boost.votes_of(lock).unwrap().weight_at_vote, now_weight);
}

#[test]
fn sole_voter_is_fully_boosted_and_others_get_the_floor() {
    let mut f = fixture();
    let (alice, bob, usdc) = (f.alice, f.bob, f.usdc);

    let lock = f.lock(alice, 100 * WEI, 52 * SECONDS_PER_WEEK);
    let weight = f.weight(lock);

    f.deposit(alice, usdc, 10 * WEI);
    f.deposit(bob, usdc, 10 * WEI);
    f.vote(alice, lock, &[usdc], &[weight]).unwrap();

    let share = f.boost.voter_share(&f.locker, &usdc, &alice, f.ledger.now());
    assert_eq!(share, ratio!(1));

    f.ledger.clock.advance(1_000);

    let max_bob = f.pending_max(usdc, bob);
    assert_eq!(f.pending(usdc, bob), max_bob * 30 / 100);

    let max_alice = f.pending_max(usdc, alice);
    let pending_alice = f.pending(usdc, alice);
    assert!(pending_alice <= max_alice);
    assert!(pending_alice > max_alice * 99 / 100);
}

#[test]
fn boost_follows_the_voter_not_the_lock_owner() {
    let mut f = fixture();
    let (alice, bob, usdc) = (f.alice, f.bob, f.usdc);

    let lock = f.lock(alice, 100 * WEI, 52 * SECONDS_PER_WEEK);
    let weight = f.weight(lock);
    f.vote(alice, lock, &[usdc], &[weight]).unwrap();

    f.locker.transfer_from(&alice, &alice, &bob, lock).unwrap();

    let now = f.ledger.now();
    assert_eq!(f.boost.voter_share(&f.locker, &usdc, &alice, now), ratio!(1));
    assert_eq!(f.boost.voter_share(&f.locker, &usdc, &bob, now), ratio!(0));

    // the new owner takes the votes over by voting again
    f.vote(bob, lock, &[usdc], &[weight]).unwrap();

    assert_eq!(f.boost.voter_share(&f.locker, &usdc, &alice, now), ratio!(0));
    assert_eq!(f.boost.voter_share(&f.locker, &usdc, &bob, now), ratio!(1));
}

#[test]
fn rewards_are_paid_once() {
    let mut f = fixture();
    let (alice, usdc, fxs) = (f.alice, f.usdc, f.fxs);

    f.deposit(alice, usdc, 10 * WEI);
    f.ledger.clock.advance(100);

    let expected = f.pending(usdc, alice);
    let before = f.ledger.tokens.balance_of(&fxs, &alice);

    let harvest = f
        .boost
        .get_reward(&mut f.ledger, &f.locker, &alice, &usdc)
        .unwrap();

    assert_eq!(harvest.paid, expected);
    assert_eq!(harvest.forfeited, 50 * WEI - expected);
    assert_eq!(f.ledger.tokens.balance_of(&fxs, &alice), before + expected);

    let again = f
        .boost
        .get_reward(&mut f.ledger, &f.locker, &alice, &usdc)
        .unwrap();

    assert_eq!(again.paid, 0);
    assert_eq!(f.ledger.tokens.balance_of(&fxs, &alice), before + expected);

    let info = f.boost.user_info(&usdc, &alice).unwrap();
    assert_eq!(info.claimed, expected);
    assert_eq!(info.reward_debt, 50 * WEI);
}

#[test]
fn withdraw_is_bounded_by_deposit() {
    let mut f = fixture();
    let (alice, usdc) = (f.alice, f.usdc);

    f.deposit(alice, usdc, 10 * WEI);
    f.ledger.clock.advance(10);

    let err = f
        .boost
        .withdraw(&mut f.ledger, &f.locker, &alice, &usdc, 11 * WEI)
        .unwrap_err();
    assert_eq!(err.reason(), "withdrawSwap: not good");
    assert_eq!(f.boost.user_info(&usdc, &alice).unwrap().amount, 10 * WEI);

    // withdrawing nothing is a harvest
    let harvest = f
        .boost
        .withdraw(&mut f.ledger, &f.locker, &alice, &usdc, 0)
        .unwrap();
    assert!(harvest.paid > 0);

    f.boost
        .withdraw(&mut f.ledger, &f.locker, &alice, &usdc, 10 * WEI)
        .unwrap();

    assert_eq!(f.ledger.tokens.balance_of(&usdc, &alice), 1_000 * WEI);
    assert_eq!(f.boost.gauge_of(&usdc).unwrap().total_supply(), 0);
}

#[test]
fn expired_ballots_keep_routing_until_withdrawn() {
    let mut f = fixture();
    let (alice, bob, usdc, dai) = (f.alice, f.bob, f.usdc, f.dai);

    let short = f.lock(alice, 100 * WEI, 2 * SECONDS_PER_WEEK);
    let long = f.lock(bob, 100 * WEI, 200 * SECONDS_PER_WEEK);
    let (ws, wl) = (f.weight(short), f.weight(long));

    f.vote(alice, short, &[usdc], &[ws]).unwrap();
    f.vote(bob, long, &[dai], &[wl]).unwrap();

    f.ledger.clock.advance(10 * SECONDS_PER_WEEK);

    let clock = f.ledger.clock.clone();
    f.boost.mass_update_pools(&clock).unwrap();

    // pool totals hold the weight at vote time, expired or not
    assert_eq!(f.weight(short), 0);
    assert_eq!(f.boost.pool_votes(&usdc), ws);
    assert_eq!(
        f.boost.allocation(&usdc).unwrap(),
        Allocation {
            numerator: ws,
            denominator: ws + wl,
        }
    );

    let rate = f.boost.schedule().rate_at(clock.now());
    assert_eq!(
        f.boost.reward_rate(&usdc, &clock).unwrap(),
        pro_rata(rate, ws, ws + wl).unwrap()
    );

    f.boost
        .abstain(&clock, &mut f.locker, &alice, short)
        .unwrap();

    assert_eq!(f.boost.reward_rate(&usdc, &clock).unwrap(), 0);
    assert_eq!(f.boost.reward_rate(&dai, &clock).unwrap(), rate);
}

#[test]
fn overflowing_vote_does_not_flag_the_lock() {
    let mut f = fixture();
    let usdc = f.usdc;
    let clock = f.ledger.clock.clone();

    let mut whale = Whale::default();
    let voter = Address::derive("whale");

    f.boost
        .vote(&clock, &mut whale, &voter, 1, &[usdc], &[Amount::MAX])
        .unwrap();

    let err = f
        .boost
        .vote(&clock, &mut whale, &voter, 2, &[usdc], &[1])
        .unwrap_err();

    assert_eq!(err, Error::Overflow);
    assert!(!whale.voted.contains(&2));
    assert!(f.boost.votes_of(2).is_none());
    assert_eq!(f.boost.pool_votes(&usdc), Amount::MAX);
}

#[test]
fn unpayable_reward_leaves_the_position_untouched() {
    let mut f = fixture();
    let (alice, usdc, fxs) = (f.alice, f.usdc, f.fxs);

    f.deposit(alice, usdc, 10 * WEI);
    f.ledger.clock.advance(100);

    let headroom = Amount::MAX - f.ledger.tokens.total_supply(&fxs);
    f.ledger.tokens.mint(&fxs, &f.operator, headroom).unwrap();

    let info = f.boost.user_info(&usdc, &alice).unwrap();

    let err = f
        .boost
        .get_reward(&mut f.ledger, &f.locker, &alice, &usdc)
        .unwrap_err();

    assert_eq!(err, Error::Overflow);
    assert_eq!(f.boost.user_info(&usdc, &alice).unwrap(), info);
    assert_eq!(f.boost.gauge_of(&usdc).unwrap().distributed(), 0);
    assert_eq!(f.pending_max(usdc, alice), 50 * WEI);
}
