//! Judging.
//!
//! Language profiles, the read-only toolchain registry and the engine that
//! drives a request through compile, execute and aggregate.

pub mod engine;
pub mod languages;
pub mod profile;
pub mod registry;
