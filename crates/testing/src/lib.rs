use std::str::FromStr;

use veboost_core::{Address, Amount, Units};
use veboost_escrow::{formulas::format_ratio, ratio};

pub mod fixtures;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestAddress {
    Alice,
    Bob,
    Carol,
    Dave,
    Eve,
    Custom(String),
}

pub const ADDRESS_LABELS: [&str; 5] = ["alice", "bob", "carol", "dave", "eve"];

impl TestAddress {
    pub fn everyone() -> Vec<Self> {
        vec![
            TestAddress::Alice,
            TestAddress::Bob,
            TestAddress::Carol,
            TestAddress::Dave,
            TestAddress::Eve,
        ]
    }

    pub fn ordinal(&self) -> usize {
        match self {
            TestAddress::Alice => 0,
            TestAddress::Bob => 1,
            TestAddress::Carol => 2,
            TestAddress::Dave => 3,
            TestAddress::Eve => 4,
            TestAddress::Custom(_) => 5,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TestAddress::Custom(label) => label,
            x => ADDRESS_LABELS[x.ordinal()],
        }
    }

    pub fn address(&self) -> Address {
        Address::derive(self.as_str())
    }
}

impl From<TestAddress> for Address {
    fn from(value: TestAddress) -> Self {
        value.address()
    }
}

impl From<&TestAddress> for Address {
    fn from(value: &TestAddress) -> Self {
        value.address()
    }
}

impl From<&str> for TestAddress {
    fn from(value: &str) -> Self {
        TestAddress::Custom(value.to_owned())
    }
}

impl From<String> for TestAddress {
    fn from(value: String) -> Self {
        TestAddress::Custom(value)
    }
}

pub enum TestToken {
    Fxs,
    Usdc,
    Dai,
    Custom(&'static str),
}

impl TestToken {
    pub fn symbol(&self) -> &str {
        match self {
            TestToken::Fxs => "fxs",
            TestToken::Usdc => "usdc",
            TestToken::Dai => "dai",
            TestToken::Custom(x) => x,
        }
    }

    pub fn address(&self) -> Address {
        Address::derive(&format!("token/{}", self.symbol()))
    }
}

/// Whole-token decimal notation to raw amount, e.g. `to_wei("0.5")`
pub fn to_wei(tokens: &str) -> Amount {
    Units::from_str(tokens).unwrap().raw()
}

pub mod duration {
    use veboost_core::{SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_WEEK, SECONDS_PER_YEAR};

    pub fn minutes(n: u64) -> u64 {
        n * 60
    }

    pub fn hours(n: u64) -> u64 {
        n * SECONDS_PER_HOUR
    }

    pub fn days(n: u64) -> u64 {
        n * SECONDS_PER_DAY
    }

    pub fn weeks(n: u64) -> u64 {
        n * SECONDS_PER_WEEK
    }

    pub fn years(n: u64) -> u64 {
        n * SECONDS_PER_YEAR
    }
}

/// Reads a depositor's effective multiplier the way an observer would: the
/// boosted pending reward over 30% of the un-boosted one, truncated to
/// `decimals` places.
pub fn boost_mul(pending: Amount, pending_max: Amount, decimals: u32) -> String {
    if pending_max == 0 {
        return format_ratio(&ratio!(0), decimals);
    }

    let value = ratio!(pending, pending_max) * ratio!(100, 30);

    format_ratio(&value, decimals)
}
