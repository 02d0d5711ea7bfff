//! Asynchronous order log.
//!
//! The receiver loop hands formatted lines to [`LogWriter::enqueue`], which
//! only touches an in-memory queue. A dedicated worker thread pops lines and
//! appends them to the durable log, flushing after each one. Shutdown wakes the
//! worker, which keeps popping until the queue is empty before it exits, so no
//! accepted line is lost.
//!
//! ```text
//!   Idle ──enqueue──▶ Draining ──queue empty──▶ Idle
//!     │                   │
//!     └──── shutdown ─────┴──▶ Draining-on-shutdown ──queue empty──▶ done
//! ```

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};
use parking_lot::{Condvar, Mutex};

use crate::{Error, Result};

/// What the worker managed to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub written: u64,
    pub failed: u64,
}

struct LogState {
    queue: VecDeque<String>,
    shutdown: bool,
}

struct LogShared {
    state: Mutex<LogState>,
    ready: Condvar,
}

pub struct LogWriter {
    shared: Arc<LogShared>,
    worker: Option<JoinHandle<LogStats>>,
    stats: LogStats,
}

impl LogWriter {
    /// Append to the file at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::spawn(open_log_file(path)?)
    }

    /// Start the worker over any sink.
    pub fn spawn<W>(sink: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let shared = Arc::new(LogShared {
            state: Mutex::new(LogState {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            ready: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("order-log-writer".into())
            .spawn(move || worker_run(&worker_shared, sink))?;

        Ok(Self {
            shared,
            worker: Some(worker),
            stats: LogStats::default(),
        })
    }

    /// Queue one line. Never waits on I/O.
    ///
    /// Fails with [`Error::LogWriterClosed`] once shutdown has been requested.
    pub fn enqueue(&self, line: impl Into<String>) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(Error::LogWriterClosed);
        }
        state.queue.push_back(line.into());
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Lines queued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Stop accepting lines, let the worker drain the queue, and join it.
    ///
    /// Idempotent; later calls return the same stats.
    pub fn shutdown(&mut self) -> Result<LogStats> {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.ready.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            self.stats = worker
                .join()
                .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::Other, "log writer panicked")))?;
            debug!(
                "log writer stopped: {} written, {} failed",
                self.stats.written, self.stats.failed
            );
        }
        Ok(self.stats)
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::resource("open order log", &path.display().to_string(), e))
}

fn worker_run<W: Write>(shared: &LogShared, mut sink: W) -> LogStats {
    let mut stats = LogStats::default();
    loop {
        let batch = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.shutdown {
                shared.ready.wait(&mut state);
            }
            if state.queue.is_empty() {
                // shutdown requested and nothing left
                break;
            }
            std::mem::take(&mut state.queue)
        };

        // The lock is released while we touch the disk.
        for line in batch {
            match write_line(&mut sink, &line) {
                Ok(()) => stats.written += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!("order log write failed: {e} (line: {line})");
                }
            }
        }
    }
    stats
}

fn write_line<W: Write>(sink: &mut W, line: &str) -> io::Result<()> {
    sink.write_all(line.as_bytes())?;
    sink.write_all(b"\n")?;
    sink.flush()
}
