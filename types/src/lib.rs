//! Fundamental types for the RBF toolkit.
//!
//! - Integer satoshi amounts (never floating point)
//! - Exact-rational fee rates compared by cross-multiplication
//! - Transaction ids and outpoints
//! - Network selection and protocol constants

pub mod amount;
pub mod error;
pub mod feerate;
pub mod network;
pub mod params;
pub mod txid;

pub use amount::Amount;
pub use error::ParseError;
pub use feerate::FeeRate;
pub use network::Network;
pub use txid::{OutPoint, Txid};
