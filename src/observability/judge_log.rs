/// Structured per-request judge journal
///
/// One entry per judged request, written off the judging path: `record`
/// only does a `try_send` into a bounded channel, and a dedicated writer
/// thread emits the entry through `log` and, when configured, appends it as
/// a JSON line to a journal file. A full channel drops the entry and bumps
/// a counter instead of blocking.
use crate::config::types::{JudgeError, Result, VerdictStatus};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Pending entries the writer may lag behind by.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JudgeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub language_id: String,
    pub status: VerdictStatus,
    pub total_time_ms: u64,
    pub test_count: usize,
    pub workspace_path: String,
}

pub struct JudgeLog {
    sender: Option<Sender<JudgeLogEntry>>,
    writer: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
    #[cfg(test)]
    _parked: Option<Receiver<JudgeLogEntry>>,
}

impl JudgeLog {
    /// Start the writer thread, appending to `journal_path` when given.
    pub fn open(journal_path: Option<&Path>, capacity: usize) -> Result<Self> {
        let file = match journal_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        JudgeError::Config(format!("Failed to create journal directory: {}", e))
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        JudgeError::Config(format!(
                            "Failed to open judge journal {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Some(file)
            }
            None => None,
        };

        let (sender, receiver) = bounded(capacity.max(1));
        let writer = thread::Builder::new()
            .name("judgebox-journal".to_string())
            .spawn(move || write_entries(receiver, file))?;

        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            dropped: Arc::new(AtomicU64::new(0)),
            #[cfg(test)]
            _parked: None,
        })
    }

    /// Never blocks.
    pub fn record(&self, entry: JudgeLogEntry) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "Judge journal full; dropped entry for request {} ({} dropped so far)",
                    entry.request_id,
                    total
                );
            }
            Err(TrySendError::Disconnected(entry)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Judge journal writer gone; dropped entry for request {}",
                    entry.request_id
                );
            }
        }
    }

    /// Entries discarded because the writer fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Channel with no writer, so it fills after `capacity` entries.
    #[cfg(test)]
    fn stalled(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender: Some(sender),
            writer: None,
            dropped: Arc::new(AtomicU64::new(0)),
            _parked: Some(receiver),
        }
    }
}

impl Drop for JudgeLog {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit.
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::error!("Judge journal writer panicked");
            }
        }
    }
}

fn write_entries(receiver: Receiver<JudgeLogEntry>, mut file: Option<File>) {
    for entry in receiver {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to serialize judge journal entry: {}", e);
                continue;
            }
        };
        log::info!(target: "judgebox::journal", "{}", line);
        if let Some(file) = file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                log::error!("Failed to write judge journal: {}", e);
            }
        }
    }
}
