use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

mod clock;
mod error;
mod escrow;
mod token;
mod units;

pub mod config;

/// A quantity of some token, in its smallest unit (18 decimals)
pub type Amount = u128;

/// Seconds since the unix epoch, as seen by the ledger
pub type Timestamp = u64;

/// The height of a block (a.k.a. block number)
pub type BlockHeight = u64;

/// The id of a lock position, minted by the locker
pub type LockId = u64;

pub use clock::*;
pub use error::*;
pub use escrow::*;
pub use token::*;
pub use units::*;

pub const SECONDS_PER_HOUR: u64 = 60 * 60;
pub const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;
pub const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// An account or contract identity on the ledger.
///
/// Addresses are opaque 20-byte values. Contracts deployed by the engine
/// (lockers, gauges) and named accounts used by scenarios get deterministic
/// addresses derived from a label, so that runs are reproducible.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derives a stable address from a human readable label
    pub fn derive(label: &str) -> Self {
        let wide = xxhash_rust::xxh3::xxh3_128(label.as_bytes()).to_be_bytes();
        let tail = xxhash_rust::xxh3::xxh3_64(label.as_bytes()).to_be_bytes();

        let mut bytes = [0u8; 20];
        bytes[..16].copy_from_slice(&wide);
        bytes[16..].copy_from_slice(&tail[..4]);

        Self(bytes)
    }

    /// Derives the address of a contract deployed by `deployer` under `salt`
    pub fn derive_child(deployer: &Address, salt: &str) -> Self {
        Self::derive(&format!("{deployer}/{salt}"))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);

        let bytes = hex::decode(raw).map_err(|_| Error::InvalidAddress(s.to_owned()))?;

        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(s.to_owned()))?;

        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr: String = Deserialize::deserialize(deserializer)?;
        Address::from_str(&repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_addresses_are_stable_and_distinct() {
        let alice = Address::derive("alice");

        assert_eq!(alice, Address::derive("alice"));
        assert_ne!(alice, Address::derive("bob"));
        assert!(!alice.is_zero());
    }

    #[test]
    fn address_hex_roundtrip() {
        let alice = Address::derive("alice");
        let repr = alice.to_string();

        assert!(repr.starts_with("0x"));
        assert_eq!(repr.len(), 42);
        assert_eq!(Address::from_str(&repr).unwrap(), alice);
    }

    #[test]
    fn malformed_address_is_rejected() {
        assert!(matches!(
            Address::from_str("0x1234"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(Address::from_str("not hex at all").is_err());
    }

    #[test]
    fn child_address_depends_on_deployer() {
        let a = Address::derive("boost-a");
        let b = Address::derive("boost-b");

        assert_ne!(
            Address::derive_child(&a, "gauge"),
            Address::derive_child(&b, "gauge")
        );
    }
}
