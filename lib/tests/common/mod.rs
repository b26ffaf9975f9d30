// Channel-backed listener shared by the integration tests
#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use netcat::{NetCat, NetCatConfig, NetCatListener, OpKind, OpResult, SharedBuffer, State};

pub const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum Event {
    Started(OpKind),
    Progress(OpKind, State),
    Completed(OpResult),
    Failed(OpResult),
}

pub struct ChannelListener(Sender<Event>);

impl NetCatListener for ChannelListener {
    fn started(&self, op: OpKind) {
        let _ = self.0.send(Event::Started(op));
    }

    fn progress(&self, op: OpKind, state: State) {
        let _ = self.0.send(Event::Progress(op, state));
    }

    fn completed(&self, result: OpResult) {
        let _ = self.0.send(Event::Completed(result));
    }

    fn failed(&self, result: OpResult) {
        let _ = self.0.send(Event::Failed(result));
    }
}

pub fn channel_listener() -> (Arc<ChannelListener>, Receiver<Event>) {
    let (tx, rx) = unbounded();
    (Arc::new(ChannelListener(tx)), rx)
}

pub fn netcat() -> (NetCat, Receiver<Event>) {
    let config = NetCatConfig::default().poll_interval(Duration::from_millis(20));
    let netcat = NetCat::with_config(config).unwrap();
    let (listener, events) = channel_listener();
    netcat.set_listener(listener);
    (netcat, events)
}

/// Wait for the terminal notification of `op`, skipping everything else.
pub fn finished(events: &Receiver<Event>, op: OpKind) -> OpResult {
    loop {
        match events.recv_timeout(WAIT).expect("no terminal notification") {
            Event::Completed(r) | Event::Failed(r) if r.op == op => return r,
            _ => {}
        }
    }
}

/// Wait for a progress notification, skipping everything else.
pub fn progressed(events: &Receiver<Event>, op: OpKind, state: State) {
    loop {
        match events.recv_timeout(WAIT).expect("no progress notification") {
            Event::Progress(o, s) if o == op && s == state => return,
            _ => {}
        }
    }
}

/// Start listening on an ephemeral port and return the bound address.
pub fn listening(netcat: &NetCat, events: &Receiver<Event>) -> SocketAddr {
    netcat.listen("TCP", "0");
    progressed(events, OpKind::Listen, State::Listening);
    netcat.local_addr().expect("listening address")
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn wait_for_text(buffer: &SharedBuffer, expected: &str) -> String {
    let deadline = Instant::now() + WAIT;
    loop {
        let text = buffer.text();
        if text == expected || Instant::now() > deadline {
            return text;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Poll `condition` until it holds or `WAIT` runs out.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    true
}
