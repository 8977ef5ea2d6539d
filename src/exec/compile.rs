use crate::config::types::{Result, VerdictStatus};
use crate::core::cancel::CancelToken;
use crate::core::runner::ProcessRunner;
use crate::core::types::{ProcessSpec, TemplateContext};
use crate::judge::profile::LanguageProfile;
use std::time::Duration;

/// Result of a profile's compile step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Profile has no compile step
    Skipped,
    Succeeded { wall_time_ms: u64 },
    Failed {
        /// Compiler stderr, falling back to stdout when stderr is empty
        stderr: String,
        timed_out: bool,
        /// Verdict this failure maps to, taken from the profile
        status: VerdictStatus,
    },
}

impl CompileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CompileOutcome::Failed { .. })
    }
}

/// Run the compile step, if any, inside the workspace.
pub fn compile(
    runner: &ProcessRunner,
    profile: &LanguageProfile,
    ctx: &TemplateContext,
    time_limit: Duration,
    cancel: &CancelToken,
) -> Result<CompileOutcome> {
    let Some(template) = &profile.compile_command else {
        return Ok(CompileOutcome::Skipped);
    };

    let spec = ProcessSpec::from_template(template, ctx)?.with_timeout(time_limit);
    let outcome = runner.run(&spec, cancel)?;

    if outcome.success() {
        log::debug!(
            "Compiled {} source in {}ms",
            profile.id,
            outcome.wall_time_ms
        );
        return Ok(CompileOutcome::Succeeded {
            wall_time_ms: outcome.wall_time_ms,
        });
    }

    let mut stderr = outcome.stderr_lossy();
    if stderr.trim().is_empty() {
        stderr = outcome.stdout_lossy();
    }
    Ok(CompileOutcome::Failed {
        stderr,
        timed_out: outcome.timed_out,
        status: profile.compile_failure.status(),
    })
}
