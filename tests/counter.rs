mod common;

use common::unique_tag;
use order_ipc::Core::SharedCounter;
use order_ipc::Error;
use std::thread;

fn counter_name(test: &str) -> String {
    format!("order_ipc_total_{}", unique_tag(test))
}

#[test]
fn starts_at_zero_and_counts_up() {
    let counter = SharedCounter::create_and_zero(&counter_name("count")).unwrap();
    assert!(counter.is_owner());
    assert_eq!(counter.load(), 0);
    assert_eq!(counter.increment().unwrap(), 1);
    assert_eq!(counter.increment().unwrap(), 2);
    assert_eq!(counter.load(), 2);
}

#[test]
fn readers_see_writer_increments() {
    let name = counter_name("reader");
    let counter = SharedCounter::create_and_zero(&name).unwrap();
    let reader = SharedCounter::attach_read_only(&name).unwrap();
    assert!(!reader.is_owner());

    for _ in 0..5 {
        counter.increment().unwrap();
    }
    assert_eq!(reader.load(), 5);

    let seen = thread::spawn(move || reader.load()).join().unwrap();
    assert_eq!(seen, 5);
}

#[test]
fn reader_cannot_increment() {
    let name = counter_name("readonly");
    let _counter = SharedCounter::create_and_zero(&name).unwrap();
    let reader = SharedCounter::attach_read_only(&name).unwrap();
    assert!(matches!(reader.increment(), Err(Error::ReadOnly)));
}

#[test]
fn recreating_resets_to_zero() {
    let name = counter_name("reset");
    let first = SharedCounter::create_and_zero(&name).unwrap();
    first.increment().unwrap();
    first.increment().unwrap();

    let second = SharedCounter::create_and_zero(&name).unwrap();
    assert_eq!(second.load(), 0);
    assert_eq!(SharedCounter::attach_read_only(&name).unwrap().load(), 0);

    // The first owner must not take the new counter's name with it.
    drop(first);
    second.increment().unwrap();
    assert_eq!(SharedCounter::attach_read_only(&name).unwrap().load(), 1);
    second.destroy().unwrap();
    assert!(SharedCounter::attach_read_only(&name).is_err());
}

#[test]
fn destroy_removes_the_name() {
    let name = counter_name("destroy");
    let counter = SharedCounter::create_and_zero(&name).unwrap();
    let reader = SharedCounter::attach_read_only(&name).unwrap();
    counter.increment().unwrap();
    counter.destroy().unwrap();

    // An existing attachment keeps its mapping.
    assert_eq!(reader.load(), 1);
    assert!(matches!(
        SharedCounter::attach_read_only(&name),
        Err(Error::Resource { .. })
    ));
}

#[test]
fn dropping_a_reader_leaves_the_counter() {
    let name = counter_name("dropreader");
    let counter = SharedCounter::create_and_zero(&name).unwrap();
    drop(SharedCounter::attach_read_only(&name).unwrap());
    assert!(SharedCounter::attach_read_only(&name).is_ok());
    counter.destroy().unwrap();
}
