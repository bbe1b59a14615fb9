//! Background line readers for child output streams.

use std::io::{self, BufRead, BufReader, Read};
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};

use crate::PROCESS_TARGET;

/// Drains one output stream on its own thread.
///
/// Lines are appended to a buffer guarded by a mutex local to this stream,
/// so the two readers of a child never contend with each other.
pub(crate) struct StreamCapture {
    stream: &'static str,
    lines: Arc<Mutex<Vec<String>>>,
    done: Receiver<io::Result<()>>,
    handle: JoinHandle<()>,
}

impl StreamCapture {
    /// Starts draining `source` immediately.
    pub(crate) fn spawn<R>(stream: &'static str, source: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let (tx, done) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("stagehand-{stream}"))
            .spawn(move || {
                let outcome = drain(source, &sink);
                // The receiver is gone when the caller stopped waiting.
                drop(tx.send(outcome));
            })?;
        Ok(Self {
            stream,
            lines,
            done,
            handle,
        })
    }

    /// Waits until the stream reaches EOF or `deadline` passes, then returns
    /// every line captured so far.
    pub(crate) fn finish(self, deadline: Instant) -> Vec<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.done.recv_timeout(remaining) {
            Ok(Ok(())) => {
                drop(self.handle.join());
            }
            Ok(Err(error)) => {
                warn!(
                    target: PROCESS_TARGET,
                    stream = self.stream,
                    error = %error,
                    "reading child output failed; transcript may be incomplete"
                );
                drop(self.handle.join());
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: PROCESS_TARGET,
                    stream = self.stream,
                    "child output still open after exit; transcript may be incomplete"
                );
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!(
                    target: PROCESS_TARGET,
                    stream = self.stream,
                    "output reader ended without reporting"
                );
            }
        }
        let mut guard = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *guard)
    }
}

fn drain<R: Read>(source: R, sink: &Mutex<Vec<String>>) -> io::Result<()> {
    let mut reader = BufReader::new(source);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        let line = String::from_utf8_lossy(&buffer).into_owned();
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}
