use crate::config::types::{JudgeError, Result};
use crate::judge::languages::builtin_profiles;
use crate::judge::profile::LanguageProfile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-profile result of the startup dependency check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolchainStatus {
    pub language_id: String,
    pub missing_programs: Vec<String>,
}

impl ToolchainStatus {
    pub fn is_ready(&self) -> bool {
        self.missing_programs.is_empty()
    }
}

/// Read-only language lookup table, built once at startup.
#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    profiles: Vec<LanguageProfile>,
    index: HashMap<String, usize>,
}

impl ToolchainRegistry {
    /// Built-in profiles only.
    pub fn with_builtin() -> Result<Self> {
        Self::from_profiles(builtin_profiles())
    }

    /// Built-ins overridden (by id) and extended by `extra`.
    pub fn with_overrides(extra: Vec<LanguageProfile>) -> Result<Self> {
        let mut profiles = builtin_profiles();
        for profile in extra {
            match profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => profiles.push(profile),
            }
        }
        Self::from_profiles(profiles)
    }

    pub fn from_profiles(profiles: Vec<LanguageProfile>) -> Result<Self> {
        let mut index = HashMap::new();
        for (position, profile) in profiles.iter().enumerate() {
            profile.validate()?;
            if index.insert(profile.id.clone(), position).is_some() {
                return Err(JudgeError::Config(format!(
                    "duplicate language id: {}",
                    profile.id
                )));
            }
        }
        // Aliases never shadow a real id.
        for (position, profile) in profiles.iter().enumerate() {
            for alias in &profile.aliases {
                if index.contains_key(alias) {
                    log::warn!(
                        "Ignoring alias '{}' of '{}': name already registered",
                        alias,
                        profile.id
                    );
                    continue;
                }
                index.insert(alias.clone(), position);
            }
        }
        Ok(Self { profiles, index })
    }

    pub fn resolve(&self, language_id: &str) -> Result<&LanguageProfile> {
        self.index
            .get(language_id)
            .map(|&position| &self.profiles[position])
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language_id.to_string()))
    }

    pub fn language_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.id.as_str())
    }

    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// Report which toolchain programs are absent from `PATH`.
    pub fn check_toolchains(&self) -> Vec<ToolchainStatus> {
        self.profiles
            .iter()
            .map(|profile| ToolchainStatus {
                language_id: profile.id.clone(),
                missing_programs: profile
                    .toolchain_programs()
                    .into_iter()
                    .filter(|program| resolve_program(program).is_none())
                    .map(str::to_string)
                    .collect(),
            })
            .collect()
    }
}

/// Resolve a program name the way `execvp` would.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return is_executable(path).then(|| path.to_path_buf());
    }
    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::profile::{CommandTemplate, CompileFailure};

    fn sh_profile(id: &str) -> LanguageProfile {
        LanguageProfile {
            id: id.to_string(),
            aliases: vec!["shell".to_string()],
            source_file_extension: "sh".to_string(),
            source_file_stem: "main".to_string(),
            compile_command: None,
            compile_failure: CompileFailure::CompileError,
            run_command: CommandTemplate::new(["sh", "{source}"]),
            compiled_artifact_extensions: Vec::new(),
        }
    }

    #[test]
    fn resolves_builtin_ids_and_aliases() {
        let registry = ToolchainRegistry::with_builtin().unwrap();
        assert_eq!(registry.resolve("python").unwrap().id, "python");
        assert_eq!(registry.resolve("py").unwrap().id, "python");
        assert_eq!(registry.resolve("c++").unwrap().id, "cpp");
        assert_eq!(registry.resolve("java").unwrap().source_file_name(), "Main.java");
    }

    #[test]
    fn unknown_language_is_unsupported() {
        let registry = ToolchainRegistry::with_builtin().unwrap();
        let err = registry.resolve("cobol").unwrap_err();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref id) if id == "cobol"));
    }

    #[test]
    fn overrides_replace_builtins_by_id() {
        let mut python = sh_profile("python");
        python.aliases.clear();
        let registry = ToolchainRegistry::with_overrides(vec![python, sh_profile("sh")]).unwrap();
        assert_eq!(registry.resolve("python").unwrap().run_command.program(), Some("sh"));
        assert_eq!(registry.resolve("shell").unwrap().id, "sh");
        assert_eq!(registry.language_ids().filter(|id| *id == "python").count(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = ToolchainRegistry::from_profiles(vec![sh_profile("sh"), sh_profile("sh")]);
        assert!(matches!(result, Err(JudgeError::Config(_))));
    }

    #[test]
    fn sh_is_found_on_path() {
        assert!(resolve_program("sh").is_some());
        assert!(resolve_program("definitely-not-a-real-toolchain-binary").is_none());
    }

    #[test]
    fn check_toolchains_reports_missing_programs() {
        let mut broken = sh_profile("broken");
        broken.aliases.clear();
        broken.run_command = CommandTemplate::new(["/nonexistent/interpreter", "{source}"]);
        let registry = ToolchainRegistry::from_profiles(vec![sh_profile("sh"), broken]).unwrap();
        let report = registry.check_toolchains();
        assert!(report[0].is_ready());
        assert_eq!(report[1].missing_programs, vec!["/nonexistent/interpreter"]);
    }
}
