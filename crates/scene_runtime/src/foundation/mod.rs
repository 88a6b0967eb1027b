//! Foundation utilities
//!
//! Shared building blocks used by the rest of the runtime: math types,
//! logging setup, and name hashing.

pub mod hash;
pub mod logging;
pub mod math;
