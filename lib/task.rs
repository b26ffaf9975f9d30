// Operation bodies: every fault ends up in the result, and every task
// reports exactly one terminal notification
use std::any::Any;
use std::io::{BufReader, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use netcat_core::{parse_port, NetCatError, OpKind, OpResult, Operation, Proto, Result, State};
use netcat_transport::{relay_lines, TcpTransport};
use tracing::{debug, warn};

use crate::config::NetCatConfig;
use crate::notifier::TaskReporter;
use crate::session::{AcceptPoll, Disconnected, SessionHandle};

pub(crate) type Input = Box<dyn Read + Send>;
pub(crate) type Output = Box<dyn Write + Send>;

/// Cancellation handle of an issued operation.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    op: OpKind,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new(op: OpKind) -> Self {
        TaskHandle {
            op,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    /// Request cooperative cancellation; observed at the next poll or line.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

pub(crate) struct Task {
    pub op: Operation,
    pub handle: TaskHandle,
    pub session: SessionHandle,
    pub reporter: TaskReporter,
    pub config: NetCatConfig,
    pub input: Option<Input>,
    pub output: Option<Output>,
}

impl Task {
    pub fn run(self) {
        let kind = self.op.kind();
        let reporter = self.reporter.clone();

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!("{} operation failed: {}", kind, e);
                OpResult::failed(kind, e)
            }
            Err(payload) => OpResult::failed(kind, NetCatError::Panicked(panic_message(payload))),
        };
        reporter.finish(result);
    }

    fn execute(mut self) -> Result<OpResult> {
        debug!("Executing {} operation", self.op.kind());
        match std::mem::replace(&mut self.op, Operation::Disconnect) {
            Operation::Connect { proto, host, port } => self.connect(&proto, &host, &port),
            Operation::Listen { proto, port } => self.listen(&proto, &port),
            Operation::Receive => self.receive(),
            Operation::Send => self.send(),
            Operation::Disconnect => self.disconnect(),
        }
    }

    fn connect(&self, proto: &str, host: &str, port: &str) -> Result<OpResult> {
        let proto: Proto = proto.parse()?;
        let port = parse_port(port)?;
        let state = self.session.state()?;
        if state != State::Idle {
            return Err(NetCatError::Busy(state));
        }

        debug!("Connecting to {}:{} ({})", host, port, proto);
        let transport = TcpTransport::new(host, port, self.config.connect_timeout);
        let stream = transport.connect().map_err(|source| NetCatError::Connection {
            addr: transport.address().to_string(),
            source,
        })?;
        let lease = self.session.install(stream)?;
        self.reporter.progress(State::Connected);

        let mut result = OpResult::new(OpKind::Connect);
        result.socket = Some(lease.stream);
        Ok(result)
    }

    fn listen(&self, proto: &str, port: &str) -> Result<OpResult> {
        let proto: Proto = proto.parse()?;
        let port = parse_port(port)?;

        // A DISCONNECT issued before the bind already cancelled us
        if self.handle.is_cancelled() {
            return Err(NetCatError::Cancelled);
        }

        let binding = self.session.bind(port)?;
        debug!("Listening on {} ({})", binding.addr.port(), proto);
        self.reporter.progress(State::Listening);

        loop {
            if self.handle.is_cancelled() {
                self.session.stop_listening(binding.generation)?;
                return Err(NetCatError::Cancelled);
            }
            match self.session.try_accept(binding.generation)? {
                AcceptPoll::Accepted(lease) => {
                    self.reporter.progress(State::Connected);
                    let mut result = OpResult::new(OpKind::Listen);
                    result.socket = Some(lease.stream);
                    return Ok(result);
                }
                AcceptPoll::Pending => thread::sleep(self.config.poll_interval),
                AcceptPoll::Closed => return Err(NetCatError::Cancelled),
            }
        }
    }

    fn receive(&mut self) -> Result<OpResult> {
        let result = OpResult::new(OpKind::Receive);
        let Some(lease) = self.session.lease()? else {
            return Ok(result);
        };
        let mut sink = self.output.take().ok_or(NetCatError::MissingBuffer("output"))?;

        debug!("Receiving from {} (TCP)", peer_name(&lease.stream));
        let mut source = BufReader::new(&lease.stream);
        match relay_lines(&mut source, &mut sink, &self.handle.cancelled) {
            Ok(lines) => debug!("Received {} lines", lines),
            // The socket was closed under us by a disconnect: a normal end
            Err(e) if !self.session.holds(lease.generation)? => {
                warn!("Receive relay closed asynchronously: {}", e)
            }
            Err(e) => return Err(NetCatError::Stream(e)),
        }

        // Peer is done sending, so tear down our side as well
        if self.session.release(lease.generation)? {
            debug!("Disconnected after receive from {} (TCP)", peer_name(&lease.stream));
            self.reporter.progress(State::Idle);
        }
        Ok(result)
    }

    fn send(&mut self) -> Result<OpResult> {
        let result = OpResult::new(OpKind::Send);
        let Some(lease) = self.session.lease()? else {
            return Ok(result);
        };
        let input = self.input.take().ok_or(NetCatError::MissingBuffer("input"))?;

        debug!("Sending to {} (TCP)", peer_name(&lease.stream));
        let mut source = BufReader::new(input);
        let mut sink = BufWriter::new(&lease.stream);
        let lines = relay_lines(&mut source, &mut sink, &self.handle.cancelled)
            .map_err(NetCatError::Stream)?;
        debug!("Sent {} lines", lines);
        Ok(result)
    }

    fn disconnect(&self) -> Result<OpResult> {
        match self.session.disconnect()? {
            Disconnected::Socket(peer) => {
                debug!("Disconnected from {:?} (TCP)", peer);
                self.reporter.progress(State::Idle);
            }
            // The listen loop sees its handle closed on the next poll
            Disconnected::Listener(addr) => debug!("Stopped listening on {}", addr.port()),
            Disconnected::Nothing => {}
        }
        Ok(OpResult::new(OpKind::Disconnect))
    }
}

fn peer_name(stream: &std::net::TcpStream) -> String {
    stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown peer>".to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
