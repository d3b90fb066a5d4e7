//! Parse errors for user-supplied values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid txid: {0}")]
    InvalidTxid(String),

    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}
