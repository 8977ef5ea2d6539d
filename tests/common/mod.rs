//! Shared fixtures for engine integration tests.
//!
//! Uses POSIX `sh` profiles registered through configuration so the suite
//! runs on any Linux host without compilers installed.

#![allow(dead_code)]

use judgebox::judge::registry::resolve_program;
use judgebox::{CommandTemplate, CompileFailure, EngineConfig, JudgeEngine, LanguageProfile};
use std::path::Path;
use tempfile::TempDir;

/// Interpreted: the source is run directly.
pub fn sh_profile() -> LanguageProfile {
    LanguageProfile {
        id: "sh".to_string(),
        aliases: vec!["posix-sh".to_string()],
        source_file_extension: "sh".to_string(),
        source_file_stem: "main".to_string(),
        compile_command: None,
        compile_failure: CompileFailure::CompileError,
        run_command: CommandTemplate::new(["sh", "{source}"]),
        compiled_artifact_extensions: Vec::new(),
    }
}

/// Has a compile step: `sh -n` parses without executing.
pub fn checked_sh_profile() -> LanguageProfile {
    LanguageProfile {
        id: "sh-checked".to_string(),
        aliases: Vec::new(),
        source_file_extension: "sh".to_string(),
        source_file_stem: "main".to_string(),
        compile_command: Some(CommandTemplate::new(["sh", "-n", "{source}"])),
        compile_failure: CompileFailure::CompileError,
        run_command: CommandTemplate::new(["sh", "{source}"]),
        compiled_artifact_extensions: Vec::new(),
    }
}

/// Workspace root for one test. Removed on drop, including when an
/// assertion fails first.
pub fn test_root(name: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("judgebox_it_{}_", name))
        .tempdir()
        .expect("temp dir should be creatable")
}

pub fn config(root: &Path) -> EngineConfig {
    EngineConfig {
        workspace_root: root.to_path_buf(),
        languages: vec![sh_profile(), checked_sh_profile()],
        ..EngineConfig::default()
    }
}

pub fn engine(root: &Path) -> JudgeEngine {
    JudgeEngine::new(config(root)).expect("engine should start")
}

/// Directories left under the workspace root.
pub fn leftover_workspaces(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .count(),
        Err(_) => 0,
    }
}

pub fn has_program(program: &str) -> bool {
    resolve_program(program).is_some()
}
