//! End-to-end tests for the judging engine.
//!
//! Each test gets its own temporary workspace root and checks that nothing
//! is left behind once a verdict (or cancellation) comes back.

mod common;

use anyhow::Result;
use common::*;
use judgebox::{
    CancelToken, EngineConfig, FailureKind, JudgeEngine, JudgeError, JudgingRequest, TestCase,
    VerdictStatus, PUBLIC_INTERNAL_ERROR_MESSAGE,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_accepted_submission() -> Result<()> {
    let root = test_root("accepted");
    let engine = engine(root.path());

    let request = JudgingRequest::new(
        "sh",
        "read a b\necho $((a + b))\n",
        vec![TestCase::new("2 3\n", "5"), TestCase::new("40 2\n", "42\n")],
    );
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::Accepted, "{verdict:?}");
    assert_eq!(verdict.test_results.len(), 2);
    assert!(verdict.test_results.iter().all(|r| r.passed));
    assert_eq!(verdict.test_results[1].index, 2);
    let max = verdict.test_results.iter().map(|r| r.execution_time_ms).max();
    assert_eq!(Some(verdict.total_execution_time_ms), max);
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_alias_resolves_to_profile() -> Result<()> {
    let root = test_root("alias");
    let engine = engine(root.path());
    let request = JudgingRequest::new("posix-sh", "echo hi", vec![TestCase::new("", "hi")]);
    assert!(engine.judge(&request)?.is_accepted());
    Ok(())
}

#[test]
fn test_wrong_answer() -> Result<()> {
    let root = test_root("wa");
    let engine = engine(root.path());

    let request = JudgingRequest::new("sh", "printf '5\\n6'", vec![TestCase::new("", "56")]);
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
    assert_eq!(verdict.test_results[0].failure_kind, FailureKind::WrongAnswer);
    assert_eq!(verdict.test_results[0].actual_output, "5\n6");
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_trailing_whitespace_is_normalized() -> Result<()> {
    let root = test_root("normalize");
    let engine = engine(root.path());

    let request = JudgingRequest::new(
        "sh",
        "printf '5 \\n6\\t\\n\\n\\n'",
        vec![TestCase::new("", "5\n6")],
    );
    assert!(engine.judge(&request)?.is_accepted());
    Ok(())
}

#[test]
fn test_infinite_loop_is_time_limit_exceeded() -> Result<()> {
    let root = test_root("tle");
    let engine = engine(root.path());

    let request = JudgingRequest::new("sh", "while :; do :; done", vec![TestCase::new("", "1")])
        .with_time_limit_ms(300);
    let started = Instant::now();
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::TimeLimitExceeded);
    assert_eq!(verdict.test_results[0].failure_kind, FailureKind::Timeout);
    assert!(verdict.total_execution_time_ms >= 300);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_nonzero_exit_is_runtime_error() -> Result<()> {
    let root = test_root("re");
    let engine = engine(root.path());

    let request = JudgingRequest::new(
        "sh",
        "echo 'index out of range' >&2\nexit 3",
        vec![TestCase::new("", "1")],
    );
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert_eq!(verdict.test_results[0].exit_code, Some(3));
    let diagnostic = verdict.diagnostic_message.unwrap_or_default();
    assert!(diagnostic.contains("index out of range"), "{diagnostic}");
    Ok(())
}

#[test]
fn test_timeout_dominates_earlier_wrong_answer() -> Result<()> {
    let root = test_root("precedence");
    let engine = engine(root.path());

    // Input "loop" spins forever, anything else echoes a wrong answer.
    let source = "read x\nif [ \"$x\" = loop ]; then while :; do :; done; fi\necho wrong\n";
    let request = JudgingRequest::new(
        "sh",
        source,
        vec![
            TestCase::new("a\n", "right"),
            TestCase::new("b\n", "wrong"),
            TestCase::new("loop\n", "right"),
        ],
    )
    .with_time_limit_ms(300)
    .with_fail_fast(false);
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::TimeLimitExceeded);
    let kinds: Vec<_> = verdict.test_results.iter().map(|r| r.failure_kind).collect();
    assert_eq!(
        kinds,
        vec![FailureKind::WrongAnswer, FailureKind::None, FailureKind::Timeout]
    );
    Ok(())
}

#[test]
fn test_fail_fast_stops_at_first_failure() -> Result<()> {
    let root = test_root("failfast");
    let engine = engine(root.path());

    let cases = vec![
        TestCase::new("", "x"),
        TestCase::new("", "ok"),
        TestCase::new("", "ok"),
    ];
    let request = JudgingRequest::new("sh", "echo ok", cases);

    let verdict = engine.judge(&request)?;
    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
    assert_eq!(verdict.test_results.len(), 1);

    let verdict = engine.judge(&request.clone().with_fail_fast(false))?;
    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
    assert_eq!(verdict.test_results.len(), 3);
    Ok(())
}

#[test]
fn test_compile_failure_skips_execution() -> Result<()> {
    let root = test_root("ce");
    let engine = engine(root.path());

    let request = JudgingRequest::new(
        "sh-checked",
        "if then fi (\n",
        vec![TestCase::new("", "1")],
    );
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::CompileError);
    assert!(verdict.test_results.is_empty());
    assert!(verdict.diagnostic_message.is_some());
    assert_eq!(leftover_workspaces(root.path()), 0);

    let ok = JudgingRequest::new("sh-checked", "echo 7", vec![TestCase::new("", "7")]);
    assert!(engine.judge(&ok)?.is_accepted());
    Ok(())
}

#[test]
fn test_contract_violations_allocate_nothing() -> Result<()> {
    let root = test_root("contract");
    let engine = engine(root.path());

    let unknown = JudgingRequest::new("brainfudge", "+", vec![TestCase::new("", "1")]);
    assert!(matches!(
        engine.judge(&unknown),
        Err(JudgeError::UnsupportedLanguage(_))
    ));

    let blank_expected = JudgingRequest::new("sh", "echo", vec![TestCase::new("", "  \n")]);
    assert!(matches!(
        engine.judge(&blank_expected),
        Err(JudgeError::InvalidRequest(_))
    ));

    let zero_time = JudgingRequest::new("sh", "echo 1", vec![TestCase::new("", "1")])
        .with_time_limit_ms(0);
    assert!(matches!(
        engine.judge(&zero_time),
        Err(JudgeError::InvalidRequest(_))
    ));

    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_missing_toolchain_is_internal_error() -> Result<()> {
    let root = test_root("ie");
    let mut ghost = sh_profile();
    ghost.id = "ghost".to_string();
    ghost.aliases.clear();
    ghost.run_command = judgebox::CommandTemplate::new(["judgebox-missing-runtime", "{source}"]);
    let config = EngineConfig {
        languages: vec![ghost],
        ..common::config(root.path())
    };
    let engine = JudgeEngine::new(config)?;

    let request = JudgingRequest::new("ghost", "x", vec![TestCase::new("", "1")]);
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::InternalError);
    assert!(verdict.status.is_alert_worthy());
    assert!(verdict.test_results.is_empty());
    assert_eq!(
        verdict.public_view().diagnostic_message.as_deref(),
        Some(PUBLIC_INTERNAL_ERROR_MESSAGE)
    );
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_background_descendants_are_killed() -> Result<()> {
    let root = test_root("descendants");
    let engine = engine(root.path());

    let started = Instant::now();
    let request = JudgingRequest::new(
        "sh",
        "(sleep 30 &)\nsleep 30 &\necho done\n",
        vec![TestCase::new("", "done")],
    );
    let verdict = engine.judge(&request)?;
    assert!(verdict.is_accepted(), "{verdict:?}");

    let waiting = JudgingRequest::new("sh", "sleep 30 &\nwait\n", vec![TestCase::new("", "1")])
        .with_time_limit_ms(300);
    let verdict = engine.judge(&waiting)?;
    assert_eq!(verdict.status, VerdictStatus::TimeLimitExceeded);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_output_flood_is_bounded() -> Result<()> {
    let root = test_root("flood");
    let config = EngineConfig {
        output_limit_bytes: 64 * 1024,
        stored_output_limit_bytes: 1024,
        ..common::config(root.path())
    };
    let engine = JudgeEngine::new(config)?;

    let request = JudgingRequest::new(
        "sh",
        "yes 'aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa' | head -c 20000000",
        vec![TestCase::new("", "a")],
    );
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
    let result = &verdict.test_results[0];
    assert!(result.output_truncated);
    assert!(result.actual_output.len() <= 1024);
    Ok(())
}

#[test]
fn test_output_cut_at_capture_limit_is_not_accepted() -> Result<()> {
    let root = test_root("cut");
    let config = EngineConfig {
        output_limit_bytes: 16,
        ..common::config(root.path())
    };
    let engine = JudgeEngine::new(config)?;

    // The first 16 bytes normalize to the expected answer; the rest is junk.
    let request = JudgingRequest::new(
        "sh",
        "printf 'aaaaaaaaaaaaaaa\\nGARBAGE_EXTRA_OUTPUT'",
        vec![TestCase::new("", "aaaaaaaaaaaaaaa")],
    );
    let verdict = engine.judge(&request)?;
    assert_eq!(verdict.status, VerdictStatus::WrongAnswer, "{verdict:?}");
    assert!(verdict.test_results[0].output_truncated);

    let exact = JudgingRequest::new(
        "sh",
        "printf 'aaaaaaaaaaaaaaa\\n'",
        vec![TestCase::new("", "aaaaaaaaaaaaaaa")],
    );
    assert!(engine.judge(&exact)?.is_accepted());

    let oversized = JudgingRequest::new("sh", "echo", vec![TestCase::new("", "a".repeat(16))]);
    assert!(matches!(
        engine.judge(&oversized),
        Err(JudgeError::InvalidRequest(_))
    ));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_memory_limit_is_enforced_on_run_step() -> Result<()> {
    let root = test_root("memory");
    let config = EngineConfig {
        enforce_memory_limit: true,
        ..common::config(root.path())
    };
    let engine = JudgeEngine::new(config)?;

    // Builds a 100 MB string inside the shell itself.
    let hog = JudgingRequest::new(
        "sh",
        "x=$(head -c 100000000 /dev/zero | tr '\\0' a)\necho ${#x}\n",
        vec![TestCase::new("", "100000000")],
    )
    .with_memory_limit_mb(64)
    .with_time_limit_ms(10_000);
    let verdict = engine.judge(&hog)?;
    assert_eq!(verdict.status, VerdictStatus::RuntimeError, "{verdict:?}");
    assert_eq!(verdict.test_results[0].failure_kind, FailureKind::RuntimeError);

    // Small programs still run, and the compile step is not limited.
    let small = JudgingRequest::new("sh-checked", "echo ok", vec![TestCase::new("", "ok")])
        .with_memory_limit_mb(64);
    assert!(engine.judge(&small)?.is_accepted());
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_detached_session_does_not_outlive_verdict() -> Result<()> {
    if !has_program("setsid") {
        eprintln!("setsid not found, skipping");
        return Ok(());
    }
    let root = test_root("setsid");
    let marker = root.path().join("survived");
    let engine = engine(root.path());

    let source = format!(
        "setsid sh -c 'sleep 1; touch {}' &\necho done\n",
        marker.display()
    );
    let started = Instant::now();
    let verdict = engine.judge(&JudgingRequest::new("sh", source, vec![TestCase::new("", "done")]))?;
    assert!(verdict.is_accepted(), "{verdict:?}");
    assert!(!verdict.test_results[0].output_truncated);
    assert!(started.elapsed() < Duration::from_secs(2));

    thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "detached process outlived the verdict");
    Ok(())
}

#[test]
fn test_concurrent_requests_are_independent() -> Result<()> {
    let root = test_root("concurrent");
    let journal = root.path().join("journal.jsonl");
    let config = EngineConfig {
        journal_path: Some(journal.clone()),
        ..common::config(root.path())
    };
    let engine = Arc::new(JudgeEngine::new(config)?);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let request = JudgingRequest::new(
                    "sh",
                    format!("read x\necho $((x + {}))\n", i),
                    vec![TestCase::new("100\n", (100 + i).to_string())],
                );
                engine.judge(&request)
            })
        })
        .collect();

    for handle in handles {
        let verdict = handle.join().expect("worker panicked")?;
        assert!(verdict.is_accepted(), "{verdict:?}");
    }
    assert_eq!(leftover_workspaces(root.path()), 0);
    // Last reference: flushes the journal.
    drop(engine);

    let contents = std::fs::read_to_string(&journal)?;
    let paths: HashSet<String> = contents
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<std::result::Result<Vec<_>, _>>()?
        .iter()
        .filter_map(|line| line["workspace_path"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(paths.len(), 8, "workspaces were shared: {paths:?}");
    Ok(())
}

#[test]
fn test_cancellation_returns_no_verdict() -> Result<()> {
    let root = test_root("cancel");
    let engine = Arc::new(engine(root.path()));
    let token = CancelToken::new();

    let worker = {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        thread::spawn(move || {
            let request = JudgingRequest::new("sh", "sleep 30", vec![TestCase::new("", "1")])
                .with_time_limit_ms(60_000);
            engine.judge_with_cancel(&request, &token)
        })
    };

    thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    token.cancel();
    let result = worker.join().expect("worker panicked");

    assert!(matches!(result, Err(JudgeError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_journal_records_each_verdict() -> Result<()> {
    let root = test_root("journal");
    let journal = root.path().join("journal.jsonl");
    let config = EngineConfig {
        journal_path: Some(journal.clone()),
        ..common::config(root.path())
    };

    {
        let engine = JudgeEngine::new(config)?;
        engine.judge(&JudgingRequest::new("sh", "echo 1", vec![TestCase::new("", "1")]))?;
        engine.judge(&JudgingRequest::new("sh", "echo 2", vec![TestCase::new("", "1")]))?;
        assert_eq!(engine.journal_dropped(), 0);
    }

    let contents = std::fs::read_to_string(&journal)?;
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["status"], "accepted");
    assert_eq!(lines[1]["status"], "wrong_answer");
    assert_eq!(lines[1]["language_id"], "sh");
    assert!(lines[1]["workspace_path"]
        .as_str()
        .unwrap_or_default()
        .starts_with(root.path().to_str().unwrap_or_default()));

    Ok(())
}

#[test]
fn test_python_reverse_string() -> Result<()> {
    if !has_program("python3") {
        eprintln!("python3 not found, skipping");
        return Ok(());
    }
    let root = test_root("python");
    let engine = engine(root.path());

    let request = JudgingRequest::new(
        "python",
        "s = input()\nprint(s[::-1])\n",
        vec![TestCase::new("hello\n", "olleh"), TestCase::new("ab\n", "ba")],
    );
    let verdict = engine.judge(&request)?;
    assert!(verdict.is_accepted(), "{verdict:?}");
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[test]
fn test_python_syntax_error_is_runtime_error() -> Result<()> {
    if !has_program("python3") {
        eprintln!("python3 not found, skipping");
        return Ok(());
    }
    let root = test_root("python_syntax");
    let engine = engine(root.path());

    let request = JudgingRequest::new("py", "def broken(:\n    pass\n", vec![TestCase::new("", "1")]);
    let verdict = engine.judge(&request)?;

    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert!(verdict.test_results.is_empty());
    let diagnostic = verdict.diagnostic_message.unwrap_or_default();
    assert!(diagnostic.contains("SyntaxError"), "{diagnostic}");

    let crash = JudgingRequest::new("python", "print(1 // 0)\n", vec![TestCase::new("", "1")]);
    let verdict = engine.judge(&crash)?;
    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert_eq!(verdict.test_results.len(), 1);
    assert!(verdict
        .diagnostic_message
        .unwrap_or_default()
        .contains("ZeroDivisionError"));
    Ok(())
}
