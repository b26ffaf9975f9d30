// lib: netcat operation executor
// Coordinates one TCP session (connect or listen, relay lines both ways, disconnect)
// as cancellable background operations that report to a swappable listener

// Re-export core types
pub use netcat_core::*;

pub mod buffer;
pub mod config;
mod notifier;
mod session;
mod task;
mod worker;

pub use buffer::SharedBuffer;
pub use config::NetCatConfig;
pub use notifier::NetCatListener;
pub use task::TaskHandle;

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tracing::debug;

use notifier::{Notice, TaskReporter};
use session::SessionHandle;
use task::{Input, Output, Task};

/// Executor for the five netcat operations on a single session.
///
/// Operations run in the background; their progress and outcome reach the
/// registered [`NetCatListener`]. CONNECT, SEND and DISCONNECT are serialized
/// on one worker, LISTEN and RECEIVE each get a thread of their own so a
/// RECEIVE keeps relaying while SEND and DISCONNECT are issued.
///
/// # Example
///
/// ```ignore
/// let netcat = NetCat::new()?;
/// netcat.set_listener(Arc::new(MyListener));
/// netcat.connect("TCP", "localhost", "9000");
/// // ...on completion of CONNECT:
/// netcat.set_output(SharedBuffer::new());
/// netcat.receive();
/// ```
pub struct NetCat {
    session: SessionHandle,
    notices: Sender<Notice>,
    config: NetCatConfig,
    task: Mutex<Option<TaskHandle>>,
    listen: Mutex<Option<TaskHandle>>,
    input: Mutex<Option<Input>>,
    output: Mutex<Option<Output>>,
}

impl NetCat {
    /// Create an executor configured from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(NetCatConfig::from_env())
    }

    pub fn with_config(config: NetCatConfig) -> Result<Self> {
        Ok(NetCat {
            session: SessionHandle::spawn()?,
            notices: notifier::spawn_dispatcher()?,
            config,
            task: Mutex::new(None),
            listen: Mutex::new(None),
            input: Mutex::new(None),
            output: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &NetCatConfig {
        &self.config
    }

    /// Replace the listener. Notifications that arrived while no listener
    /// was registered are delivered to it first, in order.
    pub fn set_listener(&self, listener: Arc<dyn NetCatListener>) {
        let _ = self.notices.send(Notice::Register(Some(listener)));
    }

    pub fn clear_listener(&self) {
        let _ = self.notices.send(Notice::Register(None));
    }

    /// Source for the next SEND; taken when SEND is issued.
    pub fn set_input<R: Read + Send + 'static>(&self, input: R) {
        *self.input.lock() = Some(Box::new(input));
    }

    /// Sink for the next RECEIVE; taken when RECEIVE is issued.
    pub fn set_output<W: Write + Send + 'static>(&self, output: W) {
        *self.output.lock() = Some(Box::new(output));
    }

    pub fn connect(&self, proto: &str, host: &str, port: &str) -> TaskHandle {
        self.issue(Operation::connect(proto, host, port))
    }

    pub fn listen(&self, proto: &str, port: &str) -> TaskHandle {
        self.issue(Operation::listen(proto, port))
    }

    /// Relay lines from the socket into the output sink until the peer
    /// closes or the session disconnects. No-op unless connected.
    pub fn receive(&self) -> TaskHandle {
        self.issue(Operation::Receive)
    }

    /// Relay lines from the input source to the socket. No-op unless connected.
    pub fn send(&self) -> TaskHandle {
        self.issue(Operation::Send)
    }

    /// Close the active socket, or stop listening. No-op when idle.
    ///
    /// A LISTEN still waiting for its peer is cancelled as soon as this is
    /// issued, even if it has not bound its port yet.
    pub fn disconnect(&self) -> TaskHandle {
        self.issue(Operation::Disconnect)
    }

    /// Cancel the most recently issued operation, and the latest LISTEN
    /// even when other operations were issued after it.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().as_ref() {
            debug!("Cancelling {} operation", task.op());
            task.cancel();
        }
        if let Some(listen) = self.listen.lock().as_ref() {
            listen.cancel();
        }
    }

    /// Issue an operation from positional parameters on the serial worker.
    pub fn execute<S: AsRef<str>>(&self, params: &[S]) -> Result<TaskHandle> {
        let op = Operation::from_params(params)?;
        Ok(self.issue_on(op, Dispatch::Serial))
    }

    /// Issue an operation from positional parameters on a thread of its own.
    pub fn execute_parallel<S: AsRef<str>>(&self, params: &[S]) -> Result<TaskHandle> {
        let op = Operation::from_params(params)?;
        Ok(self.issue_on(op, Dispatch::Parallel))
    }

    /// Issue an operation where its kind normally runs.
    pub fn issue(&self, op: Operation) -> TaskHandle {
        let dispatch = op.kind().dispatch();
        self.issue_on(op, dispatch)
    }

    fn issue_on(&self, op: Operation, dispatch: Dispatch) -> TaskHandle {
        let kind = op.kind();
        let handle = TaskHandle::new(kind);
        *self.task.lock() = Some(handle.clone());
        match kind {
            OpKind::Listen => *self.listen.lock() = Some(handle.clone()),
            OpKind::Disconnect => {
                if let Some(listen) = self.listen.lock().take() {
                    listen.cancel();
                }
            }
            _ => {}
        }

        let reporter = TaskReporter::new(kind, self.notices.clone());
        reporter.started();

        let (input, output) = match kind {
            OpKind::Send => (self.input.lock().take(), None),
            OpKind::Receive => (None, self.output.lock().take()),
            _ => (None, None),
        };
        let task = Task {
            op,
            handle: handle.clone(),
            session: self.session.clone(),
            reporter: reporter.clone(),
            config: self.config,
            input,
            output,
        };

        if let Err(e) = worker::submit(dispatch, kind, move || task.run()) {
            reporter.finish(OpResult::failed(kind, e.into()));
        }
        handle
    }

    pub fn state(&self) -> State {
        self.session.state().unwrap_or_default()
    }

    pub fn is_listening(&self) -> bool {
        self.state().is_listening()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Listening address while listening, local socket address while connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.addresses().ok().and_then(|(local, _)| local)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.addresses().ok().and_then(|(_, peer)| peer)
    }
}

impl Drop for NetCat {
    fn drop(&mut self) {
        // A listen loop would otherwise keep polling for a session nobody owns
        self.cancel();
        if let Ok(session::Disconnected::Socket(peer)) = self.session.disconnect() {
            debug!("Dropped executor closed connection to {:?}", peer);
        }
    }
}
