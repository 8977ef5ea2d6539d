//! judgebox: a submission judging engine
//! Compiles and runs untrusted submissions against test cases and produces a verdict
//!
//! # Architecture
//!
//! This crate is organized by concern:
//!
//! ## Judging ([`judge`])
//! - [`judge::engine`]: Request orchestration and the per-request state machine
//! - [`judge::registry`]: Read-only language lookup and toolchain checks
//! - [`judge::profile`]: Language profiles and argv command templates
//! - [`judge::languages`]: Built-in Python, C++, Java and Rust profiles
//!
//! ## Process Core ([`core`](crate::core))
//! - [`core::runner`](crate::core::runner): Process-group supervision with deadlines and bounded capture
//! - [`core::types`](crate::core::types): Process specs, outcomes and template substitution
//! - [`core::cancel`](crate::core::cancel): Cooperative cancellation
//!
//! ## Execution Control ([`exec`])
//! - [`exec::compile`]: Compile step
//! - [`exec::testcase`]: Sequential test case execution and classification
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::normalize`]: Output normalization policy
//! - [`verdict::aggregate`]: Verdict precedence
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::workspace`]: Per-request scratch directories
//!
//! ## Observability ([`observability`])
//! - [`observability::judge_log`]: Non-blocking per-request journal
//!
//! ## Configuration ([`config`])
//! - [`config::loader`]: Engine configuration
//! - [`config::types`]: Shared data model and the error type
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output collection
//!
//! # Design Principles
//!
//! 1. **Submission failures are data** - only the host failing is an error
//! 2. **Every wait has a deadline** - no child can hold a worker forever
//! 3. **Kill the group, then reap** - no descendant outlives its run
//! 4. **Release on every path** - workspaces never leak, even on panic
//! 5. **No shell** - command templates are argument vectors

// Judging
pub mod judge;

// Language-agnostic process core
pub mod core;

// Execution Control
pub mod exec;

// Verdict
pub mod verdict;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// Re-export commonly used types for convenience
pub use config::loader::EngineConfig;
pub use config::types::*;
pub use crate::core::cancel::CancelToken;
pub use judge::engine::JudgeEngine;
pub use judge::profile::{CommandTemplate, CompileFailure, LanguageProfile};
