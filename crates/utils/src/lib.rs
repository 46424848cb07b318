//! idb Utils - Shared functionality for idb components
//!
//! This crate provides shared utilities used by the idb binary, the
//! transformer engine, and the test suites, currently logging setup.

pub mod logging;

pub use logging::*;
