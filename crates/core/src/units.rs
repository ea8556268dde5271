use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::{Amount, Error};

pub const DECIMALS: u32 = 18;

/// One whole token, in its smallest unit
pub const WEI: Amount = 10u128.pow(DECIMALS);

/// A token quantity written in whole-token decimal notation ("0.5", "1000").
///
/// Scenario files and reports use this representation; the engine itself
/// always works on raw [`Amount`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Units(pub Amount);

impl Units {
    pub fn tokens(whole: u64) -> Self {
        Self(whole as Amount * WEI)
    }

    pub fn raw(&self) -> Amount {
        self.0
    }
}

impl From<Units> for Amount {
    fn from(value: Units) -> Self {
        value.0
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidUnits(s.to_owned());

        let trimmed = s.trim().replace('_', "");

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed.as_str(), ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        if fraction.len() > DECIMALS as usize {
            return Err(invalid());
        }

        let whole: Amount = match whole {
            "" => 0,
            x => x.parse().map_err(|_| invalid())?,
        };

        let fraction_value: Amount = match fraction {
            "" => 0,
            x => x.parse().map_err(|_| invalid())?,
        };

        let scale = 10u128.pow(DECIMALS - fraction.len() as u32);

        whole
            .checked_mul(WEI)
            .and_then(|w| w.checked_add(fraction_value * scale))
            .map(Units)
            .ok_or_else(invalid)
    }
}

impl Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / WEI;
        let fraction = self.0 % WEI;

        if fraction == 0 {
            return write!(f, "{whole}");
        }

        let fraction = format!("{fraction:018}");
        write!(f, "{whole}.{}", fraction.trim_end_matches('0'))
    }
}

impl Serialize for Units {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr: String = Deserialize::deserialize(deserializer)?;
        Units::from_str(&repr).map_err(serde::de::Error::custom)
    }
}
