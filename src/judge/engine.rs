use crate::config::loader::EngineConfig;
use crate::config::types::{JudgeError, JudgingRequest, JudgingVerdict, Result};
use crate::core::cancel::CancelToken;
use crate::core::runner::ProcessRunner;
use crate::core::types::TemplateContext;
use crate::exec::compile::compile;
use crate::exec::testcase::{ExecutionPlan, TestCaseExecutor};
use crate::judge::profile::LanguageProfile;
use crate::judge::registry::{resolve_program, ToolchainRegistry};
use crate::observability::judge_log::{JudgeLog, JudgeLogEntry, DEFAULT_JOURNAL_CAPACITY};
use crate::safety::workspace::{WorkspaceHandle, WorkspaceManager};
use crate::verdict::aggregate::VerdictAggregator;
use crate::verdict::normalize::normalize_output;
use chrono::Utc;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of one judging request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeState {
    Created,
    Compiling,
    Executing,
    Aggregating,
    Completed,
}

impl fmt::Display for JudgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JudgeState::Created => "created",
            JudgeState::Compiling => "compiling",
            JudgeState::Executing => "executing",
            JudgeState::Aggregating => "aggregating",
            JudgeState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Entry point: turns a [`JudgingRequest`] into a [`JudgingVerdict`].
///
/// The engine holds no per-request state, so one instance can be shared
/// behind an `Arc` and called from many worker threads at once.
///
/// Error contract of [`JudgeEngine::judge`]:
/// - submission failures (compile, runtime, timeout, wrong answer) are
///   ordinary verdicts
/// - host failures become an `internal_error` verdict
/// - caller bugs (invalid request, unknown language) are returned as `Err`
///   before anything is allocated
/// - cancellation is returned as `Err(JudgeError::Cancelled)`, never a verdict
pub struct JudgeEngine {
    config: EngineConfig,
    registry: ToolchainRegistry,
    workspaces: WorkspaceManager,
    runner: ProcessRunner,
    journal: JudgeLog,
}

impl JudgeEngine {
    /// Build the engine from configuration, merging configured languages
    /// over the built-in ones.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = ToolchainRegistry::with_overrides(config.languages.clone())?;
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: EngineConfig, registry: ToolchainRegistry) -> Result<Self> {
        config.validate()?;
        let workspaces = WorkspaceManager::new(&config.workspace_root)?;

        match workspaces.sweep_stale(config.stale_workspace_age()) {
            Ok(0) => {}
            Ok(n) => log::info!("Removed {} stale workspace(s) at startup", n),
            Err(e) => log::warn!("Stale workspace sweep failed: {}", e),
        }

        for status in registry.check_toolchains() {
            if !status.is_ready() {
                log::warn!(
                    "Language '{}' unavailable: missing {}",
                    status.language_id,
                    status.missing_programs.join(", ")
                );
            }
        }

        let runner = ProcessRunner::new(
            config.output_limit_bytes,
            config.poll_interval(),
            config.output_drain_grace(),
        );
        let journal = JudgeLog::open(config.journal_path.as_deref(), DEFAULT_JOURNAL_CAPACITY)?;

        Ok(Self {
            config,
            registry,
            workspaces,
            runner,
            journal,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    /// Journal entries dropped because the writer fell behind.
    pub fn journal_dropped(&self) -> u64 {
        self.journal.dropped()
    }

    pub fn judge(&self, request: &JudgingRequest) -> Result<JudgingVerdict> {
        self.judge_with_cancel(request, &CancelToken::new())
    }

    /// Like [`judge`](Self::judge), aborting when `cancel` fires.
    pub fn judge_with_cancel(
        &self,
        request: &JudgingRequest,
        cancel: &CancelToken,
    ) -> Result<JudgingVerdict> {
        request.validate()?;
        check_output_capacity(request, self.config.output_limit_bytes)?;
        let profile = self.registry.resolve(&request.language_id)?;

        let request_id = Uuid::new_v4().simple().to_string();
        transition(&request_id, JudgeState::Created);

        let (outcome, workspace_path) = match self.workspaces.acquire() {
            Ok(mut workspace) => {
                let outcome = self.run_phases(&request_id, request, profile, &mut workspace, cancel);
                let path = workspace.path().display().to_string();
                if let Err(e) = workspace.release() {
                    log::warn!("[{}] workspace cleanup failed: {}", request_id, e);
                }
                (outcome, path)
            }
            Err(e) => (Err(e), String::new()),
        };

        let verdict = match outcome {
            Ok(verdict) => verdict,
            Err(JudgeError::Cancelled) => {
                log::info!("[{}] judging cancelled", request_id);
                return Err(JudgeError::Cancelled);
            }
            Err(e) => {
                log::error!(
                    "[{}] internal error judging {} submission: {}",
                    request_id,
                    profile.id,
                    e
                );
                JudgingVerdict::internal_error(e.to_string())
            }
        };
        transition(&request_id, JudgeState::Completed);

        self.journal.record(JudgeLogEntry {
            timestamp: Utc::now(),
            request_id,
            language_id: profile.id.clone(),
            status: verdict.status,
            total_time_ms: verdict.total_execution_time_ms,
            test_count: verdict.test_results.len(),
            workspace_path,
        });

        Ok(verdict)
    }

    fn run_phases(
        &self,
        request_id: &str,
        request: &JudgingRequest,
        profile: &LanguageProfile,
        workspace: &mut WorkspaceHandle,
        cancel: &CancelToken,
    ) -> Result<JudgingVerdict> {
        ensure_toolchain(profile)?;
        workspace.register_artifact_extensions(profile.compiled_artifact_extensions.iter().cloned());
        workspace.write_source(&profile.source_file_name(), &request.source_code)?;
        let ctx = TemplateContext::for_workspace(workspace.path(), profile);
        let diagnostic_limit = self.config.diagnostic_limit_bytes;

        if profile.is_compiled() {
            transition(request_id, JudgeState::Compiling);
        }
        let compiled = compile(
            &self.runner,
            profile,
            &ctx,
            self.config.compile_time_limit(),
            cancel,
        )?;
        if compiled.is_failure() {
            return Ok(VerdictAggregator::aggregate(Vec::new(), &compiled, diagnostic_limit));
        }

        transition(request_id, JudgeState::Executing);
        let plan = ExecutionPlan {
            time_limit: Duration::from_millis(request.time_limit_ms),
            memory_limit_bytes: self
                .config
                .enforce_memory_limit
                .then(|| request.memory_limit_mb.saturating_mul(1024 * 1024)),
            fail_fast: request.fail_fast,
        };
        let results = TestCaseExecutor::new(&self.runner, self.config.stored_output_limit_bytes)
            .execute_all(&profile.run_command, &ctx, &request.test_cases, &plan, cancel)?;

        transition(request_id, JudgeState::Aggregating);
        Ok(VerdictAggregator::aggregate(results, &compiled, diagnostic_limit))
    }
}

fn transition(request_id: &str, state: JudgeState) {
    log::debug!("[{}] -> {}", request_id, state);
}

/// Every expected output must fit in the capture buffer with room for a
/// trailing newline, otherwise a correct program could never be accepted.
fn check_output_capacity(request: &JudgingRequest, output_limit: usize) -> Result<()> {
    for (position, case) in request.test_cases.iter().enumerate() {
        if normalize_output(&case.expected_output).len() >= output_limit {
            return Err(JudgeError::InvalidRequest(format!(
                "test case {} expected output does not fit the {} byte output limit",
                position + 1,
                output_limit
            )));
        }
    }
    Ok(())
}

fn ensure_toolchain(profile: &LanguageProfile) -> Result<()> {
    for program in profile.toolchain_programs() {
        if resolve_program(program).is_none() {
            return Err(JudgeError::ToolchainMissing {
                language: profile.id.clone(),
                program: program.to_string(),
            });
        }
    }
    Ok(())
}
