//! Weight checkpoints.
//!
//! Voting weight is a linear function of time between checkpoints: every
//! point stores the weight (`bias`) at its timestamp and the rate at which it
//! decays (`slope`). The global history additionally relies on scheduled
//! slope changes at lock ends, so that the aggregate slope drops exactly when
//! a lock expires.

use std::{collections::BTreeMap, ops::Bound};

use serde::{Deserialize, Serialize};
use veboost_core::{Amount, BlockHeight, Timestamp};

/// Fixed point scale used when interpolating block numbers over time
pub(crate) const BLOCK_SLOPE_SCALE: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub bias: i128,
    pub slope: i128,
    pub ts: Timestamp,
    pub blk: BlockHeight,
}

impl Point {
    pub fn genesis(ts: Timestamp, blk: BlockHeight) -> Self {
        Self {
            bias: 0,
            slope: 0,
            ts,
            blk,
        }
    }

    /// The weight this point describes, extrapolated to `t >= ts`
    pub fn weight_at(&self, t: Timestamp) -> Amount {
        let elapsed = t.saturating_sub(self.ts) as i128;
        let bias = self.bias.saturating_sub(self.slope.saturating_mul(elapsed));

        bias.max(0) as Amount
    }
}

/// Latest point with `ts <= t`
pub(crate) fn point_at_time(points: &[Point], t: Timestamp) -> Option<&Point> {
    let idx = points.partition_point(|p| p.ts <= t);

    match idx {
        0 => None,
        x => points.get(x - 1),
    }
}

/// Latest point with `blk <= block`, with its index
pub(crate) fn point_at_block(points: &[Point], block: BlockHeight) -> Option<(usize, &Point)> {
    let idx = points.partition_point(|p| p.blk <= block);

    match idx {
        0 => None,
        x => points.get(x - 1).map(|p| (x - 1, p)),
    }
}

/// Scheduled slope changes in `(from, to]`, in time order
pub(crate) fn changes_between(
    slope_changes: &BTreeMap<Timestamp, i128>,
    from: Timestamp,
    to: Timestamp,
) -> impl Iterator<Item = (Timestamp, i128)> + '_ {
    let range = (from < to)
        .then(|| slope_changes.range((Bound::Excluded(from), Bound::Included(to))));

    range.into_iter().flatten().map(|(t, d)| (*t, *d))
}

/// Walks the aggregate point forward to `t`, applying every scheduled slope
/// change crossed on the way.
pub(crate) fn supply_at(
    point: &Point,
    t: Timestamp,
    slope_changes: &BTreeMap<Timestamp, i128>,
) -> Amount {
    let mut last = *point;

    if t <= last.ts {
        return last.bias.max(0) as Amount;
    }

    for (t_i, d_slope) in changes_between(slope_changes, last.ts, t) {
        if t_i == t {
            break;
        }

        last.bias -= last.slope * (t_i - last.ts) as i128;
        last.slope += d_slope;
        last.ts = t_i;
    }

    last.bias -= last.slope * (t - last.ts) as i128;

    last.bias.max(0) as Amount
}
