//! Scenario orchestrators wiring the convergence engine to the node.

pub mod bump;
pub mod burn;
pub mod doublespend;
pub mod sendmany;
