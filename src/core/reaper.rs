//! Descendant containment beyond the process group.
//!
//! Every run leader starts its own session. After the leader is reaped,
//! [`sweep_session`] kills whatever is left of that session (processes that
//! only moved to another group) and, with the host registered as a child
//! subreaper, whatever was re-parented to us after leaving the session
//! entirely via `setsid`.

use nix::errno::Errno;
use nix::sys::prctl;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{getpid, getsid, Pid};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::process::{Child, Command};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Pids of run leaders that have been spawned and not yet reaped.
static LEADERS: Mutex<BTreeSet<i32>> = Mutex::new(BTreeSet::new());

static SUBREAPER: OnceLock<bool> = OnceLock::new();

fn leaders() -> MutexGuard<'static, BTreeSet<i32>> {
    LEADERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register the host as a child subreaper once per process.
///
/// Orphans of a run are then re-parented to us instead of init, which is
/// what lets [`sweep_session`] find processes that called `setsid`.
pub fn ensure_subreaper() -> bool {
    *SUBREAPER.get_or_init(|| match prctl::set_child_subreaper(true) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "PR_SET_CHILD_SUBREAPER failed ({}); descendants that call setsid cannot be contained",
                e
            );
            false
        }
    })
}

/// Removes its leader from the registry on drop. Drop only after reaping.
#[derive(Debug)]
pub struct LeaderGuard {
    pid: i32,
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        leaders().remove(&self.pid);
    }
}

/// Spawn a run leader. The registry lock is held across spawn so a
/// concurrent sweep never mistakes a fresh leader for an orphan.
pub fn spawn_leader(cmd: &mut Command) -> io::Result<(Child, LeaderGuard)> {
    let mut registry = leaders();
    let child = cmd.spawn()?;
    let pid = child.id() as i32;
    registry.insert(pid);
    Ok((child, LeaderGuard { pid }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcStat {
    pid: i32,
    ppid: i32,
    sid: i32,
}

/// Parse `/proc/<pid>/stat`. `comm` may contain spaces and parentheses, so
/// fields are read after the last `)`.
fn parse_stat(pid: i32, content: &str) -> Option<ProcStat> {
    let rest = &content[content.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    let ppid = fields.next()?.parse().ok()?;
    let _pgrp = fields.next()?;
    let sid = fields.next()?.parse().ok()?;
    Some(ProcStat { pid, ppid, sid })
}

fn process_table() -> Vec<ProcStat> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter_map(|pid| {
            let content = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
            parse_stat(pid, &content)
        })
        .collect()
}

fn reap(pid: Pid) {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            _ => break,
        }
    }
}

/// Kill every process left over from the run whose leader started session
/// `session`. Returns how many processes were signalled.
///
/// Loops until a scan finds nothing, bounded by `settle`, because children
/// are re-parented only once their parent has actually exited.
pub fn sweep_session(session: Pid, settle: Duration, poll: Duration) -> usize {
    let adopting = ensure_subreaper();
    let own_pid = getpid().as_raw();
    let own_sid = getsid(None).map(Pid::as_raw).ok();
    let session = session.as_raw();
    let deadline = Instant::now() + settle;
    let mut signalled = 0;

    loop {
        let victims: Vec<ProcStat> = {
            let registry = leaders();
            process_table()
                .into_iter()
                .filter(|p| p.pid != own_pid)
                .filter(|p| {
                    let in_session = p.sid == session;
                    let adopted = adopting
                        && p.ppid == own_pid
                        && !registry.contains(&p.pid)
                        && Some(p.sid) != own_sid
                        && !registry.contains(&p.sid);
                    in_session || adopted
                })
                .collect()
        };

        if victims.is_empty() {
            break;
        }
        for victim in &victims {
            match kill(Pid::from_raw(victim.pid), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => log::warn!("kill({}) failed: {}", victim.pid, e),
            }
        }
        for victim in victims.iter().filter(|v| v.ppid == own_pid) {
            reap(Pid::from_raw(victim.pid));
        }
        signalled += victims.len();

        if Instant::now() >= deadline {
            log::warn!("Session {} still had processes after {}ms", session, settle.as_millis());
            break;
        }
        thread::sleep(poll);
    }

    if signalled > 0 {
        log::debug!("Swept {} leftover process(es) of session {}", signalled, session);
    }
    signalled
}
