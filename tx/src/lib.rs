//! Mutable draft transactions for the RBF toolkit.
//!
//! A draft is an ordered list of inputs and outputs that is mutated in
//! place by the convergence engine and serialized for the node's sign and
//! broadcast RPCs. Serialized byte length is a pure function of the current
//! contents; unsigned inputs carry empty unlocking scripts, so the length
//! is only accurate once the node has signed.

pub mod encode;
pub mod error;
pub mod script;
pub mod transaction;

pub use error::TxError;
pub use script::Script;
pub use transaction::{Transaction, TxIn, TxOut};
