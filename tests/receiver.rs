// Receiver loop against in-process submitters
mod common;

use common::{unique_tag, wait_until, SharedSink};
use memoffset::offset_of;
use order_ipc::Core::{attach_shared_memory, Access, SharedCounter, SharedMemoryBackend};
use order_ipc::Transport::Buffer::layout::TransportHeader;
use order_ipc::Transport::Buffer::SlotHeader;
use order_ipc::Transport::{MessageMeta, TransportBuilder};
use order_ipc::{Config, Error, OrderRecord, Receiver, Submitter};
use std::collections::HashMap;
use std::mem::size_of;
use std::thread;
use std::time::{Duration, Instant};

fn config(test: &str) -> Config {
    Config::default().scoped(&unique_tag(test))
}

fn assert_resources_gone(config: &Config) {
    assert!(matches!(
        TransportBuilder::from_config(config).build_producer(),
        Err(Error::TransportMissing(_))
    ));
    assert!(SharedCounter::attach_read_only(&config.counter_name).is_err());
    assert!(order_ipc::Core::AdmissionGate::open(&config.gate_name).is_err());
}

fn wait_for_count(config: &Config, n: u64) {
    let counter = SharedCounter::attach_read_only(&config.counter_name).unwrap();
    assert!(
        wait_until(Duration::from_secs(10), || counter.load() >= n),
        "counter stuck at {}",
        counter.load()
    );
}

#[test]
fn single_order_is_counted_and_logged() {
    let config = config("single");
    let sink = SharedSink::default();
    let receiver = Receiver::start_with_sink(config.clone(), sink.clone()).unwrap();
    assert!(!receiver.is_degraded());
    assert_eq!(receiver.counter_value(), 0);
    let shutdown = receiver.shutdown_token();
    let running = thread::spawn(move || receiver.run());

    let submitter = Submitter::connect(config.clone()).unwrap();
    let report = submitter
        .submit(&OrderRecord::new(5, "Lasagna").unwrap())
        .unwrap();
    assert_eq!(report.total_before, Some(0));
    assert!(report.gated);

    wait_for_count(&config, 1);
    shutdown.request();
    let report = running.join().unwrap().unwrap();

    assert_eq!(report.received, 1);
    assert_eq!(report.malformed, 0);
    assert_eq!(report.final_count, 1);
    assert_eq!(report.log.written, 1);
    assert_eq!(
        sink.lines(),
        vec!["[KITCHEN] order received: table 5 -> Lasagna | total_orders=1"]
    );
    assert_resources_gone(&config);
}

#[test]
fn concurrent_submitters_keep_their_own_order() {
    let config = config("concurrent").with_admission_capacity(3);
    let sink = SharedSink::default();
    let receiver = Receiver::start_with_sink(config.clone(), sink.clone()).unwrap();
    let shutdown = receiver.shutdown_token();
    let running = thread::spawn(move || receiver.run());

    let tables = 5i64;
    let per_table = 30;
    let handles: Vec<_> = (1..=tables)
        .map(|table| {
            let config = config.clone();
            thread::spawn(move || {
                let submitter = Submitter::connect(config).unwrap();
                for i in 0..per_table {
                    let record = OrderRecord::new(table, format!("dish {i}")).unwrap();
                    submitter.submit(&record).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total = (tables * per_table) as u64;
    wait_for_count(&config, total);
    shutdown.request();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.received, total);
    assert_eq!(report.final_count, total);
    assert_eq!(report.log.written, total);

    let lines = sink.lines();
    assert_eq!(lines.len(), total as usize);
    let mut next: HashMap<i64, i64> = HashMap::new();
    for (n, line) in lines.iter().enumerate() {
        assert!(line.ends_with(&format!("| total_orders={}", n + 1)), "{line}");
        let rest = line
            .strip_prefix("[KITCHEN] order received: table ")
            .unwrap();
        let (table, rest) = rest.split_once(" -> dish ").unwrap();
        let (dish, _) = rest.split_once(' ').unwrap();
        let table: i64 = table.parse().unwrap();
        let dish: i64 = dish.parse().unwrap();
        let expected = next.entry(table).or_insert(0);
        assert_eq!(*expected, dish, "table {table} out of order");
        *expected += 1;
    }
    assert_eq!(next.len(), tables as usize);
}

#[test]
fn malformed_record_is_counted_and_logged() {
    let config = config("malformed");
    let sink = SharedSink::default();
    let receiver = Receiver::start_with_sink(config.clone(), sink.clone()).unwrap();
    let shutdown = receiver.shutdown_token();
    let running = thread::spawn(move || receiver.run());

    let producer = TransportBuilder::from_config(&config).build_producer().unwrap();
    producer.send(b"no table here").unwrap();
    producer.send(b"7:Pie").unwrap();

    wait_for_count(&config, 2);
    shutdown.request();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.received, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(
        sink.lines(),
        vec![
            "[KITCHEN] order received: table ? -> no table here | total_orders=1",
            "[KITCHEN] order received: table 7 -> Pie | total_orders=2",
        ]
    );
}

#[test]
fn idle_receiver_stops_promptly() {
    let config = config("idle");
    let receiver = Receiver::start_with_sink(config.clone(), std::io::sink()).unwrap();
    let shutdown = receiver.shutdown_token();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        shutdown.request();
    });

    let started = Instant::now();
    let report = receiver.run().unwrap();
    stopper.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.received, 0);
    assert_eq!(report.final_count, 0);
    assert_resources_gone(&config);
}

#[test]
fn corrupt_slot_stops_the_receiver() {
    let config = config("corrupt");
    let receiver = Receiver::start_with_sink(config.clone(), std::io::sink()).unwrap();

    let producer = TransportBuilder::from_config(&config).build_producer().unwrap();
    producer.send(b"1:Soup").unwrap();

    // Overwrite the published length of slot 0 with something impossible.
    let shm = attach_shared_memory(&config.transport_name, 64, Access::ReadWrite).unwrap();
    let len_offset = size_of::<TransportHeader>()
        + offset_of!(SlotHeader, meta)
        + offset_of!(MessageMeta, payload_len);
    unsafe {
        *(shm.as_ptr().add(len_offset) as *mut u32) = u32::MAX;
    }

    let err = receiver.run().unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)), "{err}");
    assert_resources_gone(&config);
    assert!(matches!(producer.send(b"2:Tea"), Err(Error::TransportClosed)));
}

#[test]
fn unopenable_log_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config("badlog").with_log_path(dir.path().join("missing").join("orders.log"));
    assert!(matches!(Receiver::start(config.clone()), Err(Error::Resource { .. })));
    assert_resources_gone(&config);
}

#[test]
fn restart_resets_the_counter() {
    let config = config("restart");
    for round in 0..2 {
        let receiver = Receiver::start_with_sink(config.clone(), std::io::sink()).unwrap();
        assert_eq!(receiver.counter_value(), 0, "round {round}");
        let shutdown = receiver.shutdown_token();
        let running = thread::spawn(move || receiver.run());

        Submitter::connect(config.clone())
            .unwrap()
            .submit(&OrderRecord::new(1, "Bread").unwrap())
            .unwrap();
        wait_for_count(&config, 1);
        shutdown.request();
        assert_eq!(running.join().unwrap().unwrap().final_count, 1);
    }
}

#[test]
fn resources_use_configured_mode() {
    use std::os::unix::fs::PermissionsExt;

    let config = config("mode").with_resource_mode(0o666);
    let receiver = Receiver::start_with_sink(config.clone(), std::io::sink()).unwrap();
    for path in [
        format!("/dev/shm/{}", config.transport_name),
        format!("/dev/shm/{}", config.counter_name),
        format!("/dev/shm/sem.{}", config.gate_name),
    ] {
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o666, "{path}");
    }
    receiver.shutdown_token().request();
    receiver.run().unwrap();
}
