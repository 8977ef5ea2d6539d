use crate::config::types::{JudgeError, Result};
use crate::core::cancel::CancelToken;
use crate::core::reaper;
use crate::core::types::{ProcessOutcome, ProcessSpec};
use crate::utils::output::{spawn_capture, CapturedStream, DEFAULT_OUTPUT_LIMIT_BYTES};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use nix::errno::Errno;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
use nix::unistd::{setsid, Pid};
use std::io::{self, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Launches one child in its own session and supervises it until it exits,
/// hits its deadline or is cancelled.
///
/// The whole group is killed before the leader is reaped, so the group id
/// cannot be recycled underneath us. Descendants that left the group or the
/// session are swept afterwards by [`reaper::sweep_session`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    output_limit: usize,
    poll_interval: Duration,
    drain_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            output_limit: DEFAULT_OUTPUT_LIMIT_BYTES,
            poll_interval: Duration::from_millis(10),
            drain_grace: Duration::from_millis(500),
        }
    }
}

impl ProcessRunner {
    pub fn new(output_limit: usize, poll_interval: Duration, drain_grace: Duration) -> Self {
        Self {
            output_limit,
            poll_interval,
            drain_grace,
        }
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    pub fn run(&self, spec: &ProcessSpec, cancel: &CancelToken) -> Result<ProcessOutcome> {
        if cancel.is_cancelled() {
            return Err(JudgeError::Cancelled);
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let memory_limit = spec.memory_limit_bytes;
        // SAFETY: the hook only issues setsid(2) and setrlimit(2), both
        // async-signal-safe.
        unsafe {
            cmd.pre_exec(move || apply_child_limits(memory_limit));
        }

        reaper::ensure_subreaper();
        let (mut child, _leader) =
            reaper::spawn_leader(&mut cmd).map_err(|source| JudgeError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        let pid = Pid::from_raw(child.id() as i32);
        let started = Instant::now();

        log::debug!(
            "Spawned '{}' pid={} timeout={}ms",
            spec.program,
            pid,
            spec.timeout.as_millis()
        );

        feed_stdin(&mut child, spec.stdin.clone());
        let stdout_rx = match child.stdout.take() {
            Some(stream) => spawn_capture(stream, self.output_limit),
            None => return Err(self.abort(&mut child, pid, "stdout pipe missing")),
        };
        let stderr_rx = match child.stderr.take() {
            Some(stream) => spawn_capture(stream, self.output_limit),
            None => return Err(self.abort(&mut child, pid, "stderr pipe missing")),
        };

        let mut timed_out = false;
        loop {
            match waitid(
                Id::Pid(pid),
                WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT,
            ) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(self.abort(&mut child, pid, &format!("waitid: {}", e))),
            }

            if cancel.is_cancelled() {
                kill_group(pid);
                let _ = child.wait();
                self.sweep(pid);
                log::debug!("Run of '{}' cancelled pid={}", spec.program, pid);
                return Err(JudgeError::Cancelled);
            }

            if started.elapsed() >= spec.timeout {
                timed_out = true;
                break;
            }

            thread::sleep(self.poll_interval);
        }

        let wall_time_ms = started.elapsed().as_millis() as u64;

        // Leader is exited-but-unreaped here, so the group id is still ours.
        kill_group(pid);
        let status = child
            .wait()
            .map_err(|e| JudgeError::Process(format!("wait: {}", e)))?;
        self.sweep(pid);

        let drain_deadline = Instant::now() + self.drain_grace;
        let stdout = self.drain(&stdout_rx, drain_deadline, "stdout");
        let stderr = self.drain(&stderr_rx, drain_deadline, "stderr");

        Ok(ProcessOutcome {
            stdout: stdout.bytes,
            stderr: stderr.bytes,
            exit_code: status.code(),
            signal: status.signal(),
            timed_out,
            wall_time_ms,
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
        })
    }

    /// Kill what is left of the run's session once the leader is reaped.
    fn sweep(&self, leader: Pid) {
        let swept = reaper::sweep_session(leader, self.drain_grace, self.poll_interval);
        if swept > 0 {
            log::debug!("Killed {} leftover descendant(s) of pid={}", swept, leader);
        }
    }

    fn abort(&self, child: &mut Child, pid: Pid, reason: &str) -> JudgeError {
        kill_group(pid);
        let _ = child.wait();
        self.sweep(pid);
        JudgeError::Process(reason.to_string())
    }

    fn drain(
        &self,
        rx: &Receiver<CapturedStream>,
        deadline: Instant,
        name: &str,
    ) -> CapturedStream {
        let wait = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(captured) => captured,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "{} still open {}ms after exit; an escaped descendant holds the pipe",
                    name,
                    self.drain_grace.as_millis()
                );
                CapturedStream {
                    bytes: Vec::new(),
                    truncated: true,
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("{} reader thread exited without a result", name);
                CapturedStream::default()
            }
        }
    }
}

/// Runs in the forked child between fork and exec. The new session also
/// makes the child its own group leader, so `killpg(pid)` reaches the group.
fn apply_child_limits(memory_limit: Option<u64>) -> io::Result<()> {
    setsid().map_err(io::Error::from)?;
    setrlimit(Resource::RLIMIT_CORE, 0, 0).map_err(io::Error::from)?;
    if let Some(bytes) = memory_limit {
        setrlimit(Resource::RLIMIT_AS, bytes, bytes).map_err(io::Error::from)?;
    }
    Ok(())
}

/// Stdin is written on a detached thread so a program that never reads
/// cannot stall the supervisor. EPIPE is expected and ignored.
fn feed_stdin(child: &mut Child, data: Vec<u8>) {
    let Some(mut stdin) = child.stdin.take() else {
        return;
    };
    if data.is_empty() {
        return;
    }
    thread::spawn(move || {
        let _ = stdin.write_all(&data);
    });
}

fn kill_group(pid: Pid) {
    match killpg(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("killpg({}) failed: {}", pid, e),
    }
}
