// Two executors talking to each other over loopback
mod common;

use std::io::Cursor;

use common::*;
use netcat::{OpKind, SharedBuffer, State};

#[test]
fn listen_connect_ping_disconnect() {
    let (a, a_events) = netcat();
    let (b, b_events) = netcat();

    let addr = listening(&a, &a_events);
    b.connect("TCP", "127.0.0.1", &addr.port().to_string());

    assert!(finished(&b_events, OpKind::Connect).is_success());
    assert!(finished(&a_events, OpKind::Listen).is_success());
    assert_eq!(a.state(), State::Connected);
    assert_eq!(b.state(), State::Connected);

    let a_output = SharedBuffer::new();
    a.set_output(a_output.clone_handle());
    a.receive();

    let b_output = SharedBuffer::new();
    b.set_output(b_output.clone_handle());
    b.receive();

    b.set_input(Cursor::new(b"ping\n".to_vec()));
    b.send();
    assert!(finished(&b_events, OpKind::Send).is_success());
    assert_eq!(wait_for_text(&a_output, "ping\n"), "ping\n");

    a.disconnect();
    assert!(finished(&a_events, OpKind::Disconnect).is_success());
    assert_eq!(a.state(), State::Idle);

    // A's relay was unblocked by its own disconnect: a clean end, not a fault
    let a_receive = finished(&a_events, OpKind::Receive);
    assert!(a_receive.is_success(), "{:?}", a_receive.error);

    // B's read hits end-of-stream and B tears its side down
    let b_receive = finished(&b_events, OpKind::Receive);
    assert!(b_receive.is_success(), "{:?}", b_receive.error);
    assert!(b_output.is_empty());
    assert_eq!(b.state(), State::Idle);
}

#[test]
fn sends_interleave_with_running_receive() {
    let (a, a_events) = netcat();
    let (b, b_events) = netcat();

    let addr = listening(&a, &a_events);
    b.connect("TCP", "localhost", &addr.port().to_string());
    assert!(finished(&b_events, OpKind::Connect).is_success());
    assert!(finished(&a_events, OpKind::Listen).is_success());

    let a_output = SharedBuffer::new();
    a.set_output(a_output.clone_handle());
    a.execute_parallel(&["RECEIVE"]).unwrap();

    // Each input is taken when SEND is issued, so they can be queued back to back
    for line in ["one\n", "two\n", "three\n"] {
        b.set_input(Cursor::new(line.as_bytes().to_vec()));
        b.send();
    }
    for _ in 0..3 {
        assert!(finished(&b_events, OpKind::Send).is_success());
    }
    assert_eq!(wait_for_text(&a_output, "one\ntwo\nthree\n"), "one\ntwo\nthree\n");

    b.disconnect();
    assert!(finished(&b_events, OpKind::Disconnect).is_success());
    assert!(finished(&a_events, OpKind::Receive).is_success());
    assert_eq!(a.state(), State::Idle);
    assert_eq!(a_output.trimmed_text(), "one\ntwo\nthree");
}
