//! Shared utilities for the RBF toolkit.

pub mod logging;

pub use logging::init_tracing;
