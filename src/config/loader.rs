/// Engine configuration loading from JSON and the environment
use crate::config::types::{JudgeError, Result};
use crate::judge::profile::LanguageProfile;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path of a JSON config file to load instead of the defaults.
pub const CONFIG_ENV: &str = "JUDGEBOX_CONFIG";
/// Overrides `workspace_root` after the file is loaded.
pub const WORKSPACE_ROOT_ENV: &str = "JUDGEBOX_WORKSPACE_ROOT";

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join(format!("judgebox-uid-{}", nix::unistd::geteuid()))
}

fn default_output_limit_bytes() -> usize {
    1024 * 1024
}

fn default_stored_output_limit_bytes() -> usize {
    64 * 1024
}

fn default_diagnostic_limit_bytes() -> usize {
    16 * 1024
}

fn default_compile_time_limit_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_output_drain_grace_ms() -> u64 {
    500
}

fn default_stale_workspace_age_secs() -> u64 {
    3600
}

/// Engine-wide settings. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Per-stream capture bound in the process runner
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
    /// Bound on `actual_output` kept in each test result
    #[serde(default = "default_stored_output_limit_bytes")]
    pub stored_output_limit_bytes: usize,
    #[serde(default = "default_diagnostic_limit_bytes")]
    pub diagnostic_limit_bytes: usize,
    #[serde(default = "default_compile_time_limit_ms")]
    pub compile_time_limit_ms: u64,
    /// Granularity of deadline and cancellation checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long to wait for pipe readers once the process group is dead
    #[serde(default = "default_output_drain_grace_ms")]
    pub output_drain_grace_ms: u64,
    /// Apply `memory_limit_mb` as RLIMIT_AS on the run step
    #[serde(default)]
    pub enforce_memory_limit: bool,
    #[serde(default = "default_stale_workspace_age_secs")]
    pub stale_workspace_age_secs: u64,
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    /// Merged over the built-in profiles by id
    #[serde(default)]
    pub languages: Vec<LanguageProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            output_limit_bytes: default_output_limit_bytes(),
            stored_output_limit_bytes: default_stored_output_limit_bytes(),
            diagnostic_limit_bytes: default_diagnostic_limit_bytes(),
            compile_time_limit_ms: default_compile_time_limit_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            output_drain_grace_ms: default_output_drain_grace_ms(),
            enforce_memory_limit: false,
            stale_workspace_age_secs: default_stale_workspace_age_secs(),
            journal_path: None,
            languages: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JudgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| JudgeError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// `$JUDGEBOX_CONFIG` if set, else defaults; then `$JUDGEBOX_WORKSPACE_ROOT`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_values(
            std::env::var_os(CONFIG_ENV),
            std::env::var_os(WORKSPACE_ROOT_ENV),
        )
    }

    fn from_env_values(
        config_path: Option<OsString>,
        workspace_root: Option<OsString>,
    ) -> Result<Self> {
        let mut config = match config_path.filter(|p| !p.is_empty()) {
            Some(path) => Self::load_from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        if let Some(root) = workspace_root.filter(|r| !r.is_empty()) {
            config.workspace_root = PathBuf::from(root);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("output_limit_bytes", self.output_limit_bytes as u64),
            ("stored_output_limit_bytes", self.stored_output_limit_bytes as u64),
            ("diagnostic_limit_bytes", self.diagnostic_limit_bytes as u64),
            ("compile_time_limit_ms", self.compile_time_limit_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(JudgeError::Config(format!("{} must be positive", name)));
            }
        }
        if self.workspace_root.as_os_str().is_empty() {
            return Err(JudgeError::Config("workspace_root must not be empty".to_string()));
        }
        for profile in &self.languages {
            profile.validate()?;
        }
        Ok(())
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.compile_time_limit_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn output_drain_grace(&self) -> Duration {
        Duration::from_millis(self.output_drain_grace_ms)
    }

    pub fn stale_workspace_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_age_secs)
    }
}
