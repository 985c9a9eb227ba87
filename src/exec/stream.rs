// src/exec/stream.rs

//! Draining a child's output pipe into an [`OutputSink`].
//!
//! A pipe that nobody reads eventually fills up and blocks the child, so
//! every captured stream gets a task that reads until EOF no matter how the
//! lines are rendered.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::output::OutputSink;
use crate::types::RenderMode;

/// Longest line forwarded in one piece. Longer runs without a newline are
/// split into chunks of this size.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Spawn a task that forwards every line of `reader` to `sink`.
pub fn spawn_drain<R>(
    reader: R,
    unit: String,
    mode: RenderMode,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        drain(reader, &unit, mode, sink.as_ref()).await;
    })
}

/// Read `reader` to EOF, splitting on `\n`.
///
/// Invalid UTF-8 is replaced rather than dropped, and a trailing `\r` is
/// stripped so CRLF output renders cleanly. Lines longer than
/// [`MAX_LINE_BYTES`] are forwarded in chunks. `sink.closed` is called
/// exactly once when the stream ends, including after a read error.
pub async fn drain<R>(reader: R, unit: &str, mode: RenderMode, sink: &dyn OutputSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await
        {
            Ok(0) => break,
            Ok(_) => {
                let line = trim_line_ending(&buf);
                sink.line(unit, mode, &String::from_utf8_lossy(line));
            }
            Err(e) => {
                warn!(unit = %unit, ?mode, error = %e, "error reading process output");
                break;
            }
        }
    }

    debug!(unit = %unit, ?mode, "output stream closed");
    sink.closed(unit, mode);
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SupervisorEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines {
        lines: Mutex<Vec<String>>,
        closed: Mutex<usize>,
    }

    impl OutputSink for Lines {
        fn line(&self, _unit: &str, _mode: RenderMode, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn closed(&self, _unit: &str, _mode: RenderMode) {
            *self.closed.lock().unwrap() += 1;
        }

        fn event(&self, _event: &SupervisorEvent) {}
    }

    #[tokio::test]
    async fn splits_lines_and_handles_crlf_and_missing_newline() {
        let sink = Lines::default();
        let input: &[u8] = b"first\r\nsecond\n\nlast";

        drain(input, "u", RenderMode::Plain, &sink).await;

        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec!["first", "second", "", "last"]
        );
        assert_eq!(*sink.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn overlong_lines_are_split_into_bounded_chunks() {
        let sink = Lines::default();
        let mut input = vec![b'x'; 3 * MAX_LINE_BYTES + 10];
        input.extend_from_slice(b"\nshort\n");

        drain(input.as_slice(), "u", RenderMode::Plain, &sink).await;

        let lines = sink.lines.lock().unwrap();
        let lengths: Vec<usize> = lines.iter().map(String::len).collect();
        assert_eq!(
            lengths,
            vec![MAX_LINE_BYTES, MAX_LINE_BYTES, MAX_LINE_BYTES, 10, 5]
        );
        assert_eq!(lines.last().map(String::as_str), Some("short"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let sink = Lines::default();
        let input: &[u8] = b"ok \xff\n";

        drain(input, "u", RenderMode::Progress, &sink).await;

        assert_eq!(*sink.lines.lock().unwrap(), vec!["ok \u{fffd}"]);
    }
}
