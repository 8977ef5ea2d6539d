//! Observability
//!
//! Structured per-request journal plus logger setup for embedders.

pub mod judge_log;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
///
/// Safe to call more than once. The library itself never installs a logger.
pub fn init_logging() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            eprintln!("judgebox: logger already installed: {}", e);
        }
    });
}
