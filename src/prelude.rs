pub use veboost_core::{Address, Amount, LockId, Timestamp, Units};

use miette::Diagnostic;
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("protocol error: {0}")]
    ProtocolError(#[from] veboost_core::Error),

    #[error("step {index} ({action}) reverted: {source}")]
    StepReverted {
        index: usize,
        action: String,
        #[source]
        source: veboost_core::Error,
    },

    #[error("step {index} ({action}) expected to revert with `{expected}`, {actual}")]
    UnexpectedOutcome {
        index: usize,
        action: String,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    Message(String),
}

impl Error {
    pub fn config(text: impl Display) -> Error {
        Error::ConfigError(text.to_string())
    }

    pub fn parse(error: impl Display) -> Error {
        Error::ParseError(error.to_string())
    }

    pub fn message(text: impl Into<String>) -> Error {
        Error::Message(text.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::parse(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse(err)
    }
}
