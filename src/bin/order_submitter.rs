use anyhow::{Context, Result};
use clap::Parser;

use order_ipc::config::{DEFAULT_COUNTER_NAME, DEFAULT_GATE_NAME, DEFAULT_TRANSPORT_NAME};
use order_ipc::{Config, OrderRecord, Submitter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Table: sends one order to the kitchen", long_about = None)]
struct Args {
    /// Table number
    #[arg(short, long)]
    table: i64,

    /// Order text (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    order: Vec<String>,

    /// Name of the order transport
    #[arg(long, default_value = DEFAULT_TRANSPORT_NAME)]
    transport: String,

    /// Name of the shared order counter
    #[arg(long, default_value = DEFAULT_COUNTER_NAME)]
    counter: String,

    /// Name of the admission gate
    #[arg(long, default_value = DEFAULT_GATE_NAME)]
    gate: String,

    /// Do not read the shared order counter before sending
    #[arg(long)]
    no_peek: bool,

    /// Fail instead of sending without admission control when the gate is missing
    #[arg(long)]
    strict_admission: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let record = OrderRecord::new(args.table, args.order.join(" ")).context("invalid order")?;
    let config = Config::new()
        .with_transport_name(args.transport)
        .with_counter_name(args.counter)
        .with_gate_name(args.gate)
        .with_peek_counter(!args.no_peek)
        .with_strict_admission(args.strict_admission);

    let submitter = Submitter::connect(config).context("admission gate setup failed")?;
    submitter
        .submit(&record)
        .with_context(|| format!("sending order for table {} failed", record.table_id))?;
    Ok(())
}
