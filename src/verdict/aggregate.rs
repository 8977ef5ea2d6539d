use crate::config::types::{FailureKind, JudgingVerdict, TestCaseResult, VerdictStatus};
use crate::exec::compile::CompileOutcome;
use crate::utils::output::truncate_utf8;

/// Folds per-test results into one verdict.
///
/// Pure function over its inputs. Precedence, highest first:
/// compile failure, timeout, runtime error, wrong answer, accepted. It is
/// evaluated over every recorded result, not just the first failure.
pub struct VerdictAggregator;

impl VerdictAggregator {
    pub fn aggregate(
        results: Vec<TestCaseResult>,
        compile: &CompileOutcome,
        diagnostic_limit: usize,
    ) -> JudgingVerdict {
        if let CompileOutcome::Failed {
            stderr,
            timed_out,
            status,
        } = compile
        {
            let message = if *timed_out {
                format!("compilation exceeded the time limit\n{}", stderr)
            } else if stderr.trim().is_empty() {
                "compiler exited with an error and produced no output".to_string()
            } else {
                stderr.clone()
            };
            return JudgingVerdict {
                status: *status,
                test_results: Vec::new(),
                total_execution_time_ms: 0,
                diagnostic_message: Some(truncate_utf8(message.trim_end(), diagnostic_limit).0),
            };
        }

        if results.is_empty() {
            return JudgingVerdict::internal_error("execution produced no test results");
        }

        let total_execution_time_ms = results
            .iter()
            .map(|r| r.execution_time_ms)
            .max()
            .unwrap_or(0);

        let first = |kind: FailureKind| results.iter().find(|r| r.failure_kind == kind);

        let (status, diagnostic) = if let Some(r) = first(FailureKind::Timeout) {
            (
                VerdictStatus::TimeLimitExceeded,
                Some(format!("time limit exceeded on test case {}", r.index)),
            )
        } else if let Some(r) = first(FailureKind::RuntimeError) {
            (VerdictStatus::RuntimeError, Some(runtime_diagnostic(r)))
        } else if let Some(r) = first(FailureKind::WrongAnswer) {
            (
                VerdictStatus::WrongAnswer,
                Some(format!("wrong answer on test case {}", r.index)),
            )
        } else {
            (VerdictStatus::Accepted, None)
        };

        JudgingVerdict {
            status,
            test_results: results,
            total_execution_time_ms,
            diagnostic_message: diagnostic.map(|d| truncate_utf8(&d, diagnostic_limit).0),
        }
    }
}

fn runtime_diagnostic(result: &TestCaseResult) -> String {
    let stderr = result
        .error_output
        .as_deref()
        .map(str::trim_end)
        .filter(|s| !s.is_empty());
    match (stderr, result.exit_code) {
        (Some(stderr), _) => format!("runtime error on test case {}:\n{}", result.index, stderr),
        (None, Some(code)) => format!(
            "runtime error on test case {}: exited with code {}",
            result.index, code
        ),
        (None, None) => format!(
            "runtime error on test case {}: terminated by a signal",
            result.index
        ),
    }
}
