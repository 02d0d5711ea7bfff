use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use order_ipc::config::{
    DEFAULT_ADMISSION_CAPACITY, DEFAULT_COUNTER_NAME, DEFAULT_GATE_NAME, DEFAULT_LOG_PATH,
    DEFAULT_MESSAGE_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_TRANSPORT_NAME,
};
use order_ipc::{Config, Receiver};

#[derive(Parser, Debug)]
#[command(author, version, about = "Kitchen: receives orders and appends them to the order log", long_about = None)]
struct Args {
    /// Name of the order transport to create
    #[arg(long, default_value = DEFAULT_TRANSPORT_NAME)]
    transport: String,

    /// Name of the shared order counter to create
    #[arg(long, default_value = DEFAULT_COUNTER_NAME)]
    counter: String,

    /// Name of the admission gate to create
    #[arg(long, default_value = DEFAULT_GATE_NAME)]
    gate: String,

    /// How many tables may be sending at the same time
    #[arg(long, default_value_t = DEFAULT_ADMISSION_CAPACITY)]
    admission_capacity: u32,

    /// How many undelivered orders the transport buffers
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Maximum bytes per order record, "<table>:" included
    #[arg(long, default_value_t = DEFAULT_MESSAGE_SIZE)]
    message_size: usize,

    /// Order log file (appended to)
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    log: PathBuf,

    /// Octal permission bits for the transport, counter and gate
    /// (e.g. 666 to let other users submit)
    #[arg(long, value_parser = parse_mode, default_value = "600")]
    mode: u32,

    /// Refuse to start if the admission gate cannot be created
    #[arg(long)]
    strict_admission: bool,
}

fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::new()
        .with_transport_name(args.transport)
        .with_counter_name(args.counter)
        .with_gate_name(args.gate)
        .with_admission_capacity(args.admission_capacity)
        .with_queue_depth(args.queue_depth)
        .with_message_size(args.message_size)
        .with_log_path(args.log)
        .with_resource_mode(args.mode)
        .with_strict_admission(args.strict_admission);

    let receiver = Receiver::start(config).context("receiver setup failed")?;

    let shutdown = receiver.shutdown_token();
    ctrlc::set_handler(move || shutdown.request())
        .context("Error setting Ctrl+C handler")?;

    let report = receiver.run().context("receiver stopped on a transport failure")?;
    info!(
        "[KITCHEN] done: received={} malformed={} logged={} log_failures={} total_orders={}",
        report.received, report.malformed, report.log.written, report.log.failed, report.final_count
    );
    Ok(())
}
