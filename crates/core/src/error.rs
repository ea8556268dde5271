use thiserror::Error;

use crate::{Address, Amount, LockId};

/// Broad classification of a rejected state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments: zero durations, mismatched arrays, exceeded weight
    Validation,
    /// The caller is not the owner, an approved spender or an operator
    Authorization,
    /// The ledger is not in a state that allows the operation
    State,
}

/// A rejected operation.
///
/// Every failure is an atomic revert: when an operation returns an error, no
/// part of its state transition has been applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid lock duration")]
    InvalidDuration,

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("pools and weights differ in length ({pools} != {weights})")]
    LengthMismatch { pools: usize, weights: usize },

    #[error("requested weight {requested} exceeds available weight {available}")]
    WeightExceeded { requested: Amount, available: Amount },

    #[error("can only increase the unlock time of lock {0}")]
    UnlockNotIncreased(LockId),

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("invalid token units {0}")]
    InvalidUnits(String),

    #[error("invalid emission schedule: {0}")]
    InvalidEmission(String),

    #[error("{caller} does not own lock {lock_id}")]
    NotOwner { caller: Address, lock_id: LockId },

    #[error("{caller} is neither owner nor approved for lock {lock_id}")]
    NotApproved { caller: Address, lock_id: LockId },

    #[error("{0} is not an operator")]
    NotOperator(Address),

    #[error("{0} is not a registered boost")]
    NotBoost(Address),

    #[error("lock {0} not found")]
    LockNotFound(LockId),

    #[error("lock {0} has expired")]
    LockExpired(LockId),

    #[error("lock {0} has not expired yet")]
    LockNotExpired(LockId),

    #[error("lock {0} has attached votes")]
    LockVoted(LockId),

    #[error("no gauge for pool {0}")]
    GaugeNotFound(Address),

    #[error("pool {0} already has a gauge")]
    GaugeExists(Address),

    #[error("gauge for pool {0} is inactive")]
    GaugeInactive(Address),

    #[error("insufficient balance of {token}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("insufficient allowance of {token}: needed {needed}, available {available}")]
    InsufficientAllowance {
        token: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("withdraw of {requested} exceeds deposited {deposited}")]
    WithdrawExceedsDeposit { requested: Amount, deposited: Amount },

    #[error("arithmetic overflow")]
    Overflow,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDuration
            | Error::InvalidAmount
            | Error::LengthMismatch { .. }
            | Error::WeightExceeded { .. }
            | Error::UnlockNotIncreased(_)
            | Error::InvalidAddress(_)
            | Error::InvalidUnits(_)
            | Error::InvalidEmission(_) => ErrorKind::Validation,

            Error::NotOwner { .. }
            | Error::NotApproved { .. }
            | Error::NotOperator(_)
            | Error::NotBoost(_) => ErrorKind::Authorization,

            Error::LockNotFound(_)
            | Error::LockExpired(_)
            | Error::LockNotExpired(_)
            | Error::LockVoted(_)
            | Error::GaugeNotFound(_)
            | Error::GaugeExists(_)
            | Error::GaugeInactive(_)
            | Error::InsufficientBalance { .. }
            | Error::InsufficientAllowance { .. }
            | Error::WithdrawExceedsDeposit { .. }
            | Error::Overflow => ErrorKind::State,
        }
    }

    /// Short, stable reason string, suitable for machine checks
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidDuration => "invalid duration",
            Error::InvalidAmount => "invalid amount",
            Error::LengthMismatch { .. } => "length mismatch",
            Error::WeightExceeded { .. } => "weight exceeded",
            Error::UnlockNotIncreased(_) => "can only increase lock duration",
            Error::InvalidAddress(_) => "invalid address",
            Error::InvalidUnits(_) => "invalid units",
            Error::InvalidEmission(_) => "invalid emission",
            Error::NotOwner { .. } => "not owner",
            Error::NotApproved { .. } => "not approved",
            Error::NotOperator(_) => "not operator",
            Error::NotBoost(_) => "not boost",
            Error::LockNotFound(_) => "lock not found",
            Error::LockExpired(_) => "lock expired",
            Error::LockNotExpired(_) => "lock not expired",
            Error::LockVoted(_) => "lock voted",
            Error::GaugeNotFound(_) => "gauge not found",
            Error::GaugeExists(_) => "gauge exists",
            Error::GaugeInactive(_) => "gauge inactive",
            Error::InsufficientBalance { .. } => "insufficient balance",
            Error::InsufficientAllowance { .. } => "insufficient allowance",
            Error::WithdrawExceedsDeposit { .. } => "withdrawSwap: not good",
            Error::Overflow => "overflow",
        }
    }
}
