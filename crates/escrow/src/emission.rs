//! Global reward emission.
//!
//! The rate is piecewise constant: it starts at `reward_per_second` and, at
//! every period boundary, is multiplied by the decay ratio (rounded down),
//! never falling below the configured floor.

use serde::Serialize;
use veboost_core::{
    config::{DecayRatio, EmissionConfig},
    Amount, Error, Timestamp,
};

#[derive(Debug, Clone, Serialize)]
pub struct EmissionSchedule {
    start: Timestamp,
    rate: Amount,
    period: u64,
    decay: Option<DecayRatio>,
    min_rate: Amount,
}

/// A stretch of time emitting at a constant rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmissionSegment {
    pub from: Timestamp,
    pub to: Timestamp,
    pub rate: Amount,
}

impl EmissionSchedule {
    pub fn new(config: &EmissionConfig, genesis: Timestamp) -> Result<Self, Error> {
        if config.period == 0 {
            return Err(Error::InvalidEmission("period must be positive".into()));
        }

        if let Some(decay) = &config.decay {
            if decay.denominator == 0 || decay.numerator > decay.denominator {
                return Err(Error::InvalidEmission(format!(
                    "decay {}/{} is not a ratio in [0, 1]",
                    decay.numerator, decay.denominator
                )));
            }
        }

        if config.min_rate() > config.rate() {
            return Err(Error::InvalidEmission(
                "minimum rate exceeds initial rate".into(),
            ));
        }

        Ok(Self {
            start: config.start_time.unwrap_or(genesis),
            rate: config.rate(),
            period: config.period,
            decay: config.decay,
            min_rate: config.min_rate(),
        })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    fn decayed(&self, rate: Amount) -> Amount {
        match &self.decay {
            Some(DecayRatio {
                numerator,
                denominator,
            }) => {
                // rate × n / d without widening: rate = q·d + r
                let n = *numerator as Amount;
                let d = *denominator as Amount;
                let next = (rate / d) * n + (rate % d) * n / d;
                next.max(self.min_rate)
            }
            None => rate,
        }
    }

    fn rate_of_period(&self, index: u64) -> Amount {
        let mut rate = self.rate;

        for _ in 0..index {
            let next = self.decayed(rate);

            if next == rate {
                break;
            }

            rate = next;
        }

        rate
    }

    /// Emission rate in effect at `t`
    pub fn rate_at(&self, t: Timestamp) -> Amount {
        if t < self.start {
            return 0;
        }

        self.rate_of_period((t - self.start) / self.period)
    }

    /// The constant-rate segments covering `[from, to)`
    pub fn segments(&self, from: Timestamp, to: Timestamp) -> Vec<EmissionSegment> {
        let from = from.max(self.start);

        if to <= from {
            return vec![];
        }

        let mut index = (from - self.start) / self.period;
        let mut rate = self.rate_of_period(index);
        let mut cursor = from;
        let mut out = vec![];

        while cursor < to {
            let boundary = self.start + (index + 1) * self.period;
            let end = boundary.min(to);

            out.push(EmissionSegment {
                from: cursor,
                to: end,
                rate,
            });

            cursor = end;
            index += 1;
            rate = self.decayed(rate);
        }

        out
    }

    /// Total emitted over `[from, to)`
    pub fn emitted(&self, from: Timestamp, to: Timestamp) -> Result<Amount, Error> {
        self.segments(from, to).iter().try_fold(0 as Amount, |acc, s| {
            let secs = (s.to - s.from) as Amount;
            let part = s.rate.checked_mul(secs).ok_or(Error::Overflow)?;
            acc.checked_add(part).ok_or(Error::Overflow)
        })
    }
}
