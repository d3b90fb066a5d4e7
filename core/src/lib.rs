//! Fee-bumping core: the convergence engine, the node RPC collaborator,
//! and the scenario orchestrators built on both.
//!
//! The one piece of real machinery here is [`engine::converge`]: given a
//! draft transaction, a target fee rate and a pool of unspent outputs, it
//! mutates the draft (shrinking change or adding inputs) until the fee
//! rate meets the target, re-signing through the node whenever an input
//! addition changes the serialized size.

pub mod engine;
pub mod error;
pub mod known_scripts;
pub mod node_client;
pub mod policy;
pub mod pool;
pub mod scenarios;

pub use engine::{converge, Converged, Draft, ResignTx};
pub use error::Error;
pub use known_scripts::{KnownScripts, SpendTemplate};
pub use node_client::{NodeClient, NodeEndpoint};
pub use pool::{Unspent, UnspentPool};
