use crate::config::types::{JudgeError, Result, VerdictStatus};
use serde::{Deserialize, Serialize};

/// Argument-vector command template.
///
/// Elements may contain `{source}`, `{artifact}`, `{workdir}` and `{stem}`
/// placeholders. Each element becomes exactly one argv entry; nothing is ever
/// handed to a shell.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CommandTemplate(pub Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Program element, unsubstituted.
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// True when the program comes from the workspace rather than the host.
    pub fn program_is_placeholder(&self) -> bool {
        self.program().map(|p| p.contains('{')).unwrap_or(false)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Verdict used when a profile's compile step fails.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CompileFailure {
    #[default]
    #[serde(rename = "compile_error")]
    CompileError,
    /// Interpreted languages whose compile step is only a syntax check
    #[serde(rename = "runtime_error")]
    RuntimeError,
}

impl CompileFailure {
    pub fn status(self) -> VerdictStatus {
        match self {
            CompileFailure::CompileError => VerdictStatus::CompileError,
            CompileFailure::RuntimeError => VerdictStatus::RuntimeError,
        }
    }
}

fn default_stem() -> String {
    "main".to_string()
}

/// A supported language. Immutable after the registry is built.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageProfile {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Without the leading dot
    pub source_file_extension: String,
    #[serde(default = "default_stem")]
    pub source_file_stem: String,
    #[serde(default)]
    pub compile_command: Option<CommandTemplate>,
    #[serde(default)]
    pub compile_failure: CompileFailure,
    pub run_command: CommandTemplate,
    /// Extensions of compiler outputs removed on workspace release
    #[serde(default)]
    pub compiled_artifact_extensions: Vec<String>,
}

impl LanguageProfile {
    pub fn source_file_name(&self) -> String {
        if self.source_file_extension.is_empty() {
            self.source_file_stem.clone()
        } else {
            format!("{}.{}", self.source_file_stem, self.source_file_extension)
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compile_command.is_some()
    }

    /// Host programs this profile needs, excluding workspace artifacts.
    pub fn toolchain_programs(&self) -> Vec<&str> {
        let mut programs = Vec::new();
        for template in self.compile_command.iter().chain(Some(&self.run_command)) {
            if template.program_is_placeholder() {
                continue;
            }
            if let Some(program) = template.program() {
                if !programs.contains(&program) {
                    programs.push(program);
                }
            }
        }
        programs
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(JudgeError::Config("language profile without id".to_string()));
        }
        if self.run_command.is_empty() {
            return Err(JudgeError::Config(format!(
                "language '{}' has an empty run command",
                self.id
            )));
        }
        if matches!(&self.compile_command, Some(t) if t.is_empty()) {
            return Err(JudgeError::Config(format!(
                "language '{}' has an empty compile command",
                self.id
            )));
        }
        if self.source_file_stem.is_empty()
            || self.source_file_stem.contains('/')
            || self.source_file_extension.contains('/')
        {
            return Err(JudgeError::Config(format!(
                "language '{}' has an invalid source file name",
                self.id
            )));
        }
        Ok(())
    }
}
