mod common;

use common::SharedSink;
use order_ipc::{Error, LogWriter};
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Sink whose first write waits until the test lets it through.
struct GatedSink {
    inner: SharedSink,
    gate: Option<mpsc::Receiver<()>>,
}

impl Write for GatedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv();
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Fails every line that starts with "bad".
struct PickySink {
    inner: SharedSink,
}

impl Write for PickySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.starts_with(b"bad") {
            return Err(io::Error::new(io::ErrorKind::Other, "rejected"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn lines_are_written_in_order() {
    let sink = SharedSink::default();
    let mut log = LogWriter::spawn(sink.clone()).unwrap();
    for i in 0..100 {
        log.enqueue(format!("line {i}")).unwrap();
    }
    let stats = log.shutdown().unwrap();

    assert_eq!(stats.written, 100);
    assert_eq!(stats.failed, 0);
    let expected: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
    assert_eq!(sink.lines(), expected);
}

#[test]
fn shutdown_drains_everything_queued() {
    let sink = SharedSink::default();
    let (release, gate) = mpsc::channel();
    let mut log = LogWriter::spawn(GatedSink {
        inner: sink.clone(),
        gate: Some(gate),
    })
    .unwrap();

    log.enqueue("first").unwrap();
    // The worker is now stuck on the first write.
    thread::sleep(Duration::from_millis(50));
    for i in 0..5 {
        log.enqueue(format!("queued {i}")).unwrap();
    }

    let stopper = thread::spawn(move || {
        let stats = log.shutdown().unwrap();
        (log, stats)
    });
    thread::sleep(Duration::from_millis(50));
    release.send(()).unwrap();
    let (log, stats) = stopper.join().unwrap();

    assert_eq!(stats.written, 6);
    assert_eq!(
        sink.lines(),
        vec!["first", "queued 0", "queued 1", "queued 2", "queued 3", "queued 4"]
    );
    assert_eq!(log.pending(), 0);
}

#[test]
fn write_failures_are_counted_and_skipped() {
    let sink = SharedSink::default();
    let mut log = LogWriter::spawn(PickySink {
        inner: sink.clone(),
    })
    .unwrap();
    log.enqueue("good 1").unwrap();
    log.enqueue("bad line").unwrap();
    log.enqueue("good 2").unwrap();
    let stats = log.shutdown().unwrap();

    assert_eq!(stats.written, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(sink.lines(), vec!["good 1", "good 2"]);
}

#[test]
fn enqueue_after_shutdown_is_rejected() {
    let mut log = LogWriter::spawn(io::sink()).unwrap();
    log.enqueue("kept").unwrap();
    let first = log.shutdown().unwrap();
    assert!(matches!(log.enqueue("late"), Err(Error::LogWriterClosed)));
    assert_eq!(log.shutdown().unwrap(), first);
}

#[test]
fn appends_to_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.log");
    std::fs::write(&path, "earlier\n").unwrap();

    let mut log = LogWriter::open(&path).unwrap();
    log.enqueue("later").unwrap();
    log.shutdown().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
}

#[test]
fn unopenable_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("orders.log");
    assert!(matches!(LogWriter::open(&path), Err(Error::Resource { .. })));
}
