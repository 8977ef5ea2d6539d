//! Utilities
//!
//! Cross-cutting helpers for bounded output collection.

pub mod output;
