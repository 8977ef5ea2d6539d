//! Language-agnostic process core.
//!
//! Core owns the process model: spawning, deadlines, process-group kill,
//! bounded capture and cancellation. Language-specific compile/run logic
//! lives in judge profiles.

pub mod cancel;
pub mod reaper;
pub mod runner;
pub mod types;
