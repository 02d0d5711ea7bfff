//! The order receiver ("kitchen").
//!
//! Owns every named resource. Startup creates the shared counter, the
//! transport and the admission gate in that order, then starts the log
//! writer. [`Receiver::run`] loops on the transport until shutdown is
//! requested or the transport fails, drains the log, and releases the gate,
//! the transport and the counter (reverse of creation).

use std::io::Write;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::log_writer::{open_log_file, LogStats, LogWriter};
use crate::shutdown::ShutdownToken;
use crate::Core::{Admission, AdmissionGate, SharedCounter};
use crate::Transport::{Consumer, OrderRecord, TransportBuilder};
use crate::{Error, Result};

/// Summary returned once the receiver has shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    /// Records taken off the transport.
    pub received: u64,
    /// Of those, records that did not parse as `<table>:<text>`.
    pub malformed: u64,
    /// Counter value just before it was destroyed.
    pub final_count: u64,
    pub log: LogStats,
}

pub struct Receiver {
    counter: SharedCounter,
    consumer: Consumer,
    admission: Admission,
    log: LogWriter,
    shutdown: ShutdownToken,
}

impl Receiver {
    /// Create all resources and start logging to `config.log_path`.
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;
        let file = open_log_file(&config.log_path)?;
        Self::start_with_sink(config, file)
    }

    /// Same as [`start`](Self::start) with an arbitrary log sink.
    ///
    /// If any step fails, whatever was already created is removed again
    /// before the error is returned.
    pub fn start_with_sink<W>(config: Config, sink: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        config.validate()?;

        let counter =
            SharedCounter::create_and_zero_with_mode(&config.counter_name, config.resource_mode)?;
        let consumer = TransportBuilder::from_config(&config).build_consumer()?;
        let admission = Admission::from_attempt(
            AdmissionGate::create_with_mode(
                &config.gate_name,
                config.admission_capacity,
                config.resource_mode,
            ),
            config.strict_admission,
            &config.gate_name,
        )?;
        let log = LogWriter::spawn(sink)?;

        let shutdown = ShutdownToken::new();
        shutdown.register_waker(consumer.waker());

        Ok(Self {
            counter,
            consumer,
            admission,
            log,
            shutdown,
        })
    }

    /// Token that stops [`run`](Self::run). Hand a clone to the signal handler.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn counter_value(&self) -> u64 {
        self.counter.load()
    }

    pub fn is_degraded(&self) -> bool {
        self.admission.is_degraded()
    }

    /// Serve orders until shutdown, then tear everything down.
    ///
    /// A transport failure other than an interrupted wait ends the loop; the
    /// shutdown sequence still runs and the failure is returned afterwards.
    pub fn run(self) -> Result<ReceiverReport> {
        let Receiver {
            counter,
            consumer,
            admission,
            mut log,
            shutdown,
        } = self;

        info!(
            "[KITCHEN] ready, waiting for orders on {} (Ctrl+C to stop)",
            consumer.name()
        );

        let mut report = ReceiverReport::default();
        let mut fatal = None;
        loop {
            match consumer.receive_with_meta(&shutdown) {
                Ok(Some((meta, payload))) => {
                    debug!(
                        "record of {} bytes from pid {}, queued {:?}",
                        meta.payload_len,
                        meta.sender_pid,
                        queued_for(meta.timestamp_ns)
                    );
                    if let Err(e) = handle_record(&counter, &log, &payload, &mut report) {
                        error!("processing order failed: {e}");
                        fatal = Some(e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("receive on transport {} failed: {e}", consumer.name());
                    fatal = Some(e);
                    break;
                }
            }
        }

        info!("[KITCHEN] shutting down, waiting for the order log to drain");
        let mut first_err = None;
        match log.shutdown() {
            Ok(stats) => report.log = stats,
            Err(e) => {
                error!("order log shutdown failed: {e}");
                first_err.get_or_insert(e);
            }
        }

        report.final_count = counter.load();
        let teardown = [
            ("admission gate", admission.destroy()),
            ("transport", consumer.destroy()),
            ("shared counter", counter.destroy()),
        ];
        for (what, result) in teardown {
            if let Err(e) = result {
                warn!("releasing {what} failed: {e}");
                first_err.get_or_insert(e);
            }
        }

        info!(
            "[KITCHEN] finished: {} orders received, {} lines logged",
            report.received, report.log.written
        );

        match fatal.or(first_err) {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// Time between the send stamp and now; zero if the clocks disagree.
fn queued_for(sent_ns: u64) -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .saturating_sub(Duration::from_nanos(sent_ns))
}

/// Count one record and queue its log line.
fn handle_record(
    counter: &SharedCounter,
    log: &LogWriter,
    payload: &[u8],
    report: &mut ReceiverReport,
) -> Result<()> {
    let total = counter.increment()?;
    report.received += 1;

    let line = match OrderRecord::decode(payload) {
        Ok(record) => format_order_line(&record, total),
        Err(Error::MalformedRecord(raw)) => {
            report.malformed += 1;
            warn!("malformed order record {raw:?}");
            format!("[KITCHEN] order received: table ? -> {raw} | total_orders={total}")
        }
        Err(e) => return Err(e),
    };

    info!("{line}");
    if let Err(e) = log.enqueue(line) {
        warn!("order log rejected line: {e}");
    }
    Ok(())
}

/// The durable log line for one order and the counter value after it.
pub fn format_order_line(record: &OrderRecord, total: u64) -> String {
    format!(
        "[KITCHEN] order received: table {} -> {} | total_orders={}",
        record.table_id, record.text, total
    )
}
