//! Transaction decode errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("truncated transaction data")]
    Truncated,

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("length prefix {0} exceeds remaining data")]
    OversizedLength(u64),

    #[error("output value total overflows")]
    ValueOverflow,
}
