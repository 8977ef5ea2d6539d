//! Execution control
//!
//! Drives a language profile through its compile step and its test cases
//! using the process core.

pub mod compile;
pub mod testcase;
