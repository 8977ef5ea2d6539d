use crate::config::types::{JudgeError, Result};
use crate::judge::profile::{CommandTemplate, LanguageProfile};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values substituted into a [`CommandTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    pub source: PathBuf,
    pub artifact: PathBuf,
    pub workdir: PathBuf,
    pub stem: String,
}

impl TemplateContext {
    pub fn for_workspace(workdir: &Path, profile: &LanguageProfile) -> Self {
        Self {
            source: workdir.join(profile.source_file_name()),
            artifact: workdir.join(&profile.source_file_stem),
            workdir: workdir.to_path_buf(),
            stem: profile.source_file_stem.clone(),
        }
    }

    /// Replace every placeholder in one argv element.
    pub fn substitute(&self, part: &str) -> String {
        if !part.contains('{') {
            return part.to_string();
        }
        part.replace("{source}", &self.source.to_string_lossy())
            .replace("{artifact}", &self.artifact.to_string_lossy())
            .replace("{workdir}", &self.workdir.to_string_lossy())
            .replace("{stem}", &self.stem)
    }
}

/// Everything needed to launch one child process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Bytes written to stdin, which is then closed
    pub stdin: Vec<u8>,
    /// Wall-clock deadline measured from spawn
    pub timeout: Duration,
    /// Address-space cap applied in the child before exec
    pub memory_limit_bytes: Option<u64>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            stdin: Vec::new(),
            timeout: Duration::from_secs(10),
            memory_limit_bytes: None,
        }
    }

    /// Expand a template; the first element becomes the program.
    pub fn from_template(template: &CommandTemplate, ctx: &TemplateContext) -> Result<Self> {
        let mut parts = template.parts().iter().map(|part| ctx.substitute(part));
        let program = parts
            .next()
            .ok_or_else(|| JudgeError::Config("empty command template".to_string()))?;
        let mut spec = Self::new(program, ctx.workdir.clone());
        spec.args = parts.collect();
        Ok(spec)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_memory_limit_bytes(mut self, limit: Option<u64>) -> Self {
        self.memory_limit_bytes = limit;
        self
    }
}

/// What happened to one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// None when killed by a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Killed by the runner at the deadline
    pub timed_out: bool,
    pub wall_time_ms: u64,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::languages;

    #[test]
    fn template_expands_into_argv() {
        let profile = languages::cpp::profile();
        let workdir = Path::new("/tmp/ws-1");
        let ctx = TemplateContext::for_workspace(workdir, &profile);
        let spec = ProcessSpec::from_template(
            profile.compile_command.as_ref().unwrap(),
            &ctx,
        )
        .unwrap();
        assert_eq!(spec.program, "g++");
        assert_eq!(
            spec.args,
            vec!["-std=c++17", "-O2", "-pipe", "-o", "/tmp/ws-1/main", "/tmp/ws-1/main.cpp"]
        );
        assert_eq!(spec.working_dir, workdir);
    }

    #[test]
    fn artifact_program_is_substituted() {
        let profile = languages::cpp::profile();
        let ctx = TemplateContext::for_workspace(Path::new("/w"), &profile);
        let spec = ProcessSpec::from_template(&profile.run_command, &ctx).unwrap();
        assert_eq!(spec.program, "/w/main");
        assert!(spec.args.is_empty());
    }

    #[test]
    fn placeholder_inside_argument_is_replaced() {
        let profile = languages::java::profile();
        let ctx = TemplateContext::for_workspace(Path::new("/w"), &profile);
        assert_eq!(ctx.substitute("-Dout={workdir}/x"), "/w/x");
        assert_eq!(ctx.substitute("{stem}"), "Main");
    }

    #[test]
    fn success_requires_zero_exit_without_timeout() {
        let mut outcome = ProcessOutcome {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(outcome.success());
        outcome.timed_out = true;
        assert!(!outcome.success());
    }
}
