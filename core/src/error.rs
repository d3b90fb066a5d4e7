//! Error taxonomy for the toolkit.
//!
//! Every failure mode from the node collaborator boundary is an explicit
//! variant checked at the call site; none of them are retried except the
//! per-candidate `Rejected` handling inside the burn scanner.

use rbf_types::Txid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transaction {0} not found")]
    TxNotFound(Txid),

    #[error("transaction already mined; {confirmations} confirmations")]
    AlreadyConfirmed { confirmations: u32 },

    #[error("not enough confirmed funds left unspent to reach the fee target")]
    InsufficientFunds,

    #[error("node returned an incomplete signature set")]
    SigningIncomplete,

    #[error("broadcast rejected by network: {0}")]
    Rejected(String),

    #[error("node error {code}: {message}")]
    NodeRpc { code: i64, message: String },

    #[error("node RPC error: {0}")]
    Node(String),

    #[error("malformed transaction data: {0}")]
    InvalidTransaction(String),

    #[error("amount overflow while mutating transaction")]
    AmountOverflow,

    #[error("config error: {0}")]
    Config(String),
}

impl From<rbf_tx::TxError> for Error {
    fn from(e: rbf_tx::TxError) -> Self {
        Error::InvalidTransaction(e.to_string())
    }
}

impl From<rbf_types::ParseError> for Error {
    fn from(e: rbf_types::ParseError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}
