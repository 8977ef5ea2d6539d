//! Configuration and shared types
//!
//! Engine settings, the request/verdict data model and the crate error type.

pub mod loader;
pub mod types;
