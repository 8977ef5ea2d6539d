use crate::config::types::{FailureKind, Result, TestCase, TestCaseResult};
use crate::core::cancel::CancelToken;
use crate::core::runner::ProcessRunner;
use crate::core::types::{ProcessOutcome, ProcessSpec, TemplateContext};
use crate::judge::profile::CommandTemplate;
use crate::utils::output::truncate_utf8;
use crate::verdict::normalize::outputs_match;
use std::time::Duration;

/// Per-request execution settings.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub time_limit: Duration,
    pub memory_limit_bytes: Option<u64>,
    pub fail_fast: bool,
}

/// Runs the program once per test case, strictly in order.
pub struct TestCaseExecutor<'a> {
    runner: &'a ProcessRunner,
    stored_output_limit: usize,
}

impl<'a> TestCaseExecutor<'a> {
    pub fn new(runner: &'a ProcessRunner, stored_output_limit: usize) -> Self {
        Self {
            runner,
            stored_output_limit,
        }
    }

    /// Execute every test case, or stop at the first failure in fail-fast
    /// mode. Results are in request order with 1-based indices.
    pub fn execute_all(
        &self,
        run_command: &CommandTemplate,
        ctx: &TemplateContext,
        test_cases: &[TestCase],
        plan: &ExecutionPlan,
        cancel: &CancelToken,
    ) -> Result<Vec<TestCaseResult>> {
        let base = ProcessSpec::from_template(run_command, ctx)?
            .with_timeout(plan.time_limit)
            .with_memory_limit_bytes(plan.memory_limit_bytes);

        let mut results = Vec::with_capacity(test_cases.len());
        for (position, case) in test_cases.iter().enumerate() {
            let index = position + 1;
            let spec = base.clone().with_stdin(case.input.as_bytes().to_vec());
            let outcome = self.runner.run(&spec, cancel)?;
            let result = classify(index, &outcome, &case.expected_output, self.stored_output_limit);

            log::debug!(
                "Test case {} -> {} in {}ms",
                index,
                result.failure_kind,
                result.execution_time_ms
            );

            let stop = plan.fail_fast && !result.passed;
            results.push(result);
            if stop {
                log::debug!(
                    "Fail-fast: skipping {} remaining test case(s)",
                    test_cases.len() - index
                );
                break;
            }
        }
        Ok(results)
    }
}

/// Classify one process outcome against its expected output.
///
/// Timeout wins over everything, then abnormal exit, then comparison.
/// Output cut at the capture limit never passes: the bytes that would have
/// decided the comparison were never seen.
pub fn classify(
    index: usize,
    outcome: &ProcessOutcome,
    expected: &str,
    stored_output_limit: usize,
) -> TestCaseResult {
    let actual = outcome.stdout_lossy();

    let failure_kind = if outcome.timed_out {
        FailureKind::Timeout
    } else if outcome.exit_code != Some(0) {
        FailureKind::RuntimeError
    } else if outcome.stdout_truncated {
        FailureKind::WrongAnswer
    } else if outputs_match(&actual, expected) {
        FailureKind::None
    } else {
        FailureKind::WrongAnswer
    };

    let (actual_output, cut) = truncate_utf8(&actual, stored_output_limit);
    let error_output = (failure_kind == FailureKind::RuntimeError)
        .then(|| truncate_utf8(&outcome.stderr_lossy(), stored_output_limit).0);

    TestCaseResult {
        index,
        passed: failure_kind == FailureKind::None,
        actual_output,
        execution_time_ms: outcome.wall_time_ms,
        failure_kind,
        exit_code: outcome.exit_code,
        output_truncated: cut || outcome.stdout_truncated,
        error_output,
    }
}
