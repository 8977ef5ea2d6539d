//! Bounded output capture for child process streams.
//!
//! Each stream gets its own reader thread. Bytes past the limit are still
//! read and discarded so a chatty program never blocks on a full pipe.

use crossbeam_channel::{bounded, Receiver};
use std::io::{ErrorKind, Read};
use std::thread;

/// Per-stream capture limit used when nothing else is configured.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

const READ_CHUNK: usize = 8192;

/// Bytes collected from one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    /// Stream produced more than the limit
    pub truncated: bool,
}

impl CapturedStream {
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Read `stream` to EOF on a background thread, keeping at most `limit` bytes.
///
/// The receiver yields exactly one value once the stream closes. If the
/// thread dies the channel disconnects instead.
pub fn spawn_capture<R>(stream: R, limit: usize) -> Receiver<CapturedStream>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let captured = collect_stream(stream, limit);
        let _ = tx.send(captured);
    });
    rx
}

/// Synchronous core of [`spawn_capture`].
pub fn collect_stream<R: Read>(mut stream: R, limit: usize) -> CapturedStream {
    let mut captured = CapturedStream::default();
    let mut buffer = [0u8; READ_CHUNK];

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                let keep = n.min(room);
                captured.bytes.extend_from_slice(&buffer[..keep]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Output stream read failed: {}", e);
                break;
            }
        }
    }

    captured
}

/// Cut `text` to at most `limit` bytes on a char boundary.
pub fn truncate_utf8(text: &str, limit: usize) -> (String, bool) {
    if text.len() <= limit {
        return (text.to_string(), false);
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    (text[..end].to_string(), true)
}
