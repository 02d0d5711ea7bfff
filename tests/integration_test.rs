// End-to-end run of the two binaries as separate processes
mod common;

use common::{unique_tag, wait_until};
use serial_test::serial;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

const RECEIVER: &str = env!("CARGO_BIN_EXE_order-receiver");
const SUBMITTER: &str = env!("CARGO_BIN_EXE_order-submitter");

#[derive(Clone)]
struct Names {
    transport: String,
    counter: String,
    gate: String,
}

impl Names {
    fn new(test: &str) -> Self {
        let tag = unique_tag(test);
        Self {
            transport: format!("order_ipc_e2e_mq_{tag}"),
            counter: format!("order_ipc_e2e_total_{tag}"),
            gate: format!("order_ipc_e2e_sem_{tag}"),
        }
    }

    fn args(&self) -> [String; 6] {
        [
            "--transport".into(),
            self.transport.clone(),
            "--counter".into(),
            self.counter.clone(),
            "--gate".into(),
            self.gate.clone(),
        ]
    }
}

fn submit(names: &Names, table: i64, order: &str) -> Output {
    Command::new(SUBMITTER)
        .args(names.args())
        .args(["--table", &table.to_string(), order])
        .output()
        .unwrap()
}

fn interrupt(child: &Child) {
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) };
    assert_eq!(rc, 0);
}

fn log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
#[serial]
fn receiver_and_submitters_exchange_orders() {
    let names = Names::new("e2e");
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("orders.log");

    let mut receiver = Command::new(RECEIVER)
        .args(names.args())
        .arg("--log")
        .arg(&log)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let transport_path = format!("/dev/shm/{}", names.transport);
    let gate_path = format!("/dev/shm/sem.{}", names.gate);
    assert!(
        wait_until(Duration::from_secs(10), || {
            Path::new(&transport_path).exists() && Path::new(&gate_path).exists()
        }),
        "receiver did not create its resources"
    );

    let orders = [(1, "Lasagna"), (2, "Tomato soup"), (3, "Tiramisu")];
    let handles: Vec<_> = orders
        .iter()
        .map(|&(table, order)| {
            let names = names.clone();
            std::thread::spawn(move || submit(&names, table, order))
        })
        .collect();
    for h in handles {
        let out = h.join().unwrap();
        assert!(
            out.status.success(),
            "submitter failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }

    assert!(wait_until(Duration::from_secs(10), || log_lines(&log).len() == 3));
    interrupt(&receiver);
    let status = receiver.wait().unwrap();
    assert!(status.success(), "receiver exited with {status}");

    let lines = log_lines(&log);
    for (table, order) in orders {
        assert!(
            lines
                .iter()
                .any(|l| l.contains(&format!("table {table} -> {order} |"))),
            "missing order for table {table}: {lines:?}"
        );
    }
    for n in 1..=3 {
        assert!(lines.iter().any(|l| l.ends_with(&format!("total_orders={n}"))));
    }

    assert!(!Path::new(&transport_path).exists());
    assert!(!Path::new(&gate_path).exists());
    assert!(!Path::new(&format!("/dev/shm/{}", names.counter)).exists());
}

#[test]
#[serial]
fn submitter_without_receiver_fails() {
    let names = Names::new("noreceiver");
    let out = submit(&names, 4, "Pizza");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("does not exist"), "{stderr}");
}
