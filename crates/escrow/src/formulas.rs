use num_traits::ToPrimitive;
use veboost_core::{Amount, Error};

use crate::{floor_int, ratio};

pub type Ratio = num_rational::BigRational;

/// Fixed point scale of a gauge's accumulated reward per deposited unit
pub const ACC_PRECISION: Amount = 1_000_000_000_000;

/// Share of the pool vote total a voter currently controls.
///
/// Each of the voter's ballots contributes the weight it directed to the pool,
/// decayed by how much the lock's weight has dropped since the vote was cast.
/// The pool total is the sum recorded at vote time and does not decay.
pub fn voter_share<I>(ballots: I, pool_votes: Amount) -> Ratio
where
    I: IntoIterator<Item = (Amount, Amount, Amount)>,
{
    if pool_votes == 0 {
        return ratio!(0);
    }

    let mut share = ratio!(0);

    for (directed, weight_at_vote, weight_now) in ballots {
        if weight_at_vote == 0 {
            continue;
        }

        // directed × (w(t) / w(t_vote)) / pool_votes
        share += ratio!(directed) * ratio!(weight_now, weight_at_vote) / ratio!(pool_votes);
    }

    share
}

/// Reward multiplier relative to the guaranteed base share.
///
/// Grows linearly with the voter share from 1 to `1 / base`, the point at
/// which the depositor receives the whole un-boosted reward.
pub fn boost_multiplier(voter_share: &Ratio, base_share_percent: u8) -> Ratio {
    let base = base_share_percent.clamp(1, 100);
    let max = ratio!(100, base);

    // 1 + (1/base − 1) × share
    let raw = ratio!(1) + (&max - ratio!(1)) * voter_share;

    raw.clamp(ratio!(1), max)
}

/// Fraction of the un-boosted reward paid out, in [base, 1]
pub fn payout_fraction(multiplier: &Ratio, base_share_percent: u8) -> Ratio {
    let base = ratio!(base_share_percent.clamp(1, 100), 100);

    (base * multiplier).clamp(ratio!(0), ratio!(1))
}

/// ⌊ pending_max × fraction ⌋
pub fn boosted_pending(pending_max: Amount, fraction: &Ratio) -> Result<Amount, Error> {
    let out = ratio!(pending_max) * fraction;

    floor_int!(out, Amount)
}

/// Reward owed to a deposit for the accumulated value `acc`, before the debt
/// already accounted for is subtracted.
pub fn accrued(amount: Amount, acc_reward_per_share: Amount) -> Result<Amount, Error> {
    let out = ratio!(amount) * ratio!(acc_reward_per_share, ACC_PRECISION);

    floor_int!(out, Amount)
}

/// Accumulator increment for `reward` spread over `total_supply` deposits
pub fn acc_increment(reward: Amount, total_supply: Amount) -> Result<Amount, Error> {
    if total_supply == 0 {
        return Ok(0);
    }

    let out = ratio!(reward) * ratio!(ACC_PRECISION, total_supply);

    floor_int!(out, Amount)
}

/// ⌊ amount × numer / denom ⌋
pub fn pro_rata(amount: Amount, numer: Amount, denom: Amount) -> Result<Amount, Error> {
    if denom == 0 {
        return Ok(0);
    }

    let out = ratio!(amount) * ratio!(numer, denom);

    floor_int!(out, Amount)
}

/// Decimal rendering of a ratio, truncated to `decimals` places
pub fn format_ratio(value: &Ratio, decimals: u32) -> String {
    let scale = num_bigint::BigInt::from(10u64).pow(decimals);
    let scaled = (value * ratio!(scale.clone())).floor().to_integer();

    let int = &scaled / &scale;
    let frac = (&scaled % &scale).to_u64().unwrap_or_default();

    if decimals == 0 {
        return int.to_string();
    }

    format!("{int}.{frac:0width$}", width = decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn multiplier_is_clamped() {
        assert_eq!(boost_multiplier(&ratio!(0), 30), ratio!(1));
        assert_eq!(boost_multiplier(&ratio!(1), 30), ratio!(10, 3));
        assert_eq!(boost_multiplier(&ratio!(2), 30), ratio!(10, 3));
        assert_eq!(boost_multiplier(&ratio!(1, 2), 30), ratio!(13, 6));
    }

    #[test]
    fn dominant_voter_reads_close_to_max() {
        // 1000 of 1051 tokens of directed weight
        let share = voter_share([(1_000, 1_000, 1_000)], 1_051);
        let mul = boost_multiplier(&share, 30);

        assert_eq!(format_ratio(&mul, 4), "3.2201");
    }

    #[test]
    fn share_decays_with_lock_weight() {
        let fresh = voter_share([(500, 1_000, 1_000)], 1_000);
        let decayed = voter_share([(500, 1_000, 800)], 1_000);

        assert_eq!(fresh, ratio!(1, 2));
        assert_eq!(decayed, ratio!(2, 5));
        assert_eq!(voter_share([(500, 0, 0)], 1_000), ratio!(0));
        assert_eq!(voter_share([(500, 1_000, 1_000)], 0), ratio!(0));
    }

    #[test]
    fn accumulator_round_trips_within_rounding() {
        let inc = acc_increment(3_000, 7).unwrap();
        let owed = accrued(7, inc).unwrap();

        assert!(owed <= 3_000);
        assert!(3_000 - owed < 7);
        assert_eq!(acc_increment(10, 0).unwrap(), 0);
    }

    #[test]
    fn ratios_are_truncated() {
        assert_eq!(format_ratio(&ratio!(2, 3), 4), "0.6666");
        assert_eq!(format_ratio(&ratio!(1), 3), "1.000");
        assert_eq!(format_ratio(&ratio!(7, 2), 0), "3");
        assert_eq!(format_ratio(&ratio!(1, 200), 3), "0.005");
    }

    proptest! {
        #[test]
        fn payout_stays_between_floor_and_cap(
            pending_max in 0u128..1_000_000_000_000_000_000_000,
            directed in 0u128..1_000_000,
            pool in 1u128..1_000_000,
        ) {
            let share = voter_share([(directed, 10, 7)], pool);
            let mul = boost_multiplier(&share, 30);
            let fraction = payout_fraction(&mul, 30);
            let pending = boosted_pending(pending_max, &fraction).unwrap();

            prop_assert!(pending <= pending_max);
            prop_assert!(pending >= pending_max * 30 / 100);
        }
    }
}
