// Session owner: one thread holds the socket and the listening handle,
// operations reach them only through commands on a channel
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::thread;

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use netcat_core::{NetCatError, Result, State};
use netcat_transport::{teardown, TcpAcceptor};
use tracing::{debug, warn};

/// A cloned handle of the active socket, tagged with the session generation
/// it was taken from.
pub(crate) struct Lease {
    pub stream: TcpStream,
    pub generation: u64,
}

/// A bound listening handle, tagged with its own generation so a stale
/// listen loop cannot poll a handle bound after it was stopped.
pub(crate) struct Binding {
    pub addr: SocketAddr,
    pub generation: u64,
}

pub(crate) enum AcceptPoll {
    Accepted(Lease),
    Pending,
    /// The polled handle is gone: cancelled, disconnected or replaced meanwhile.
    Closed,
}

pub(crate) enum Disconnected {
    Socket(Option<SocketAddr>),
    Listener(SocketAddr),
    Nothing,
}

enum Command {
    State(Sender<State>),
    Addresses(Sender<(Option<SocketAddr>, Option<SocketAddr>)>),
    Install(TcpStream, Sender<Result<Lease>>),
    Bind(u16, Sender<Result<Binding>>),
    TryAccept(u64, Sender<Result<AcceptPoll>>),
    StopListening(u64, Sender<Option<SocketAddr>>),
    Lease(Sender<Result<Option<Lease>>>),
    Holds(u64, Sender<bool>),
    Release(u64, Sender<bool>),
    Disconnect(Sender<Disconnected>),
}

#[derive(Default)]
struct Session {
    socket: Option<TcpStream>,
    acceptor: Option<TcpAcceptor>,
    generation: u64,
    binding: u64,
}

impl Session {
    fn state(&self) -> State {
        if self.socket.is_some() {
            State::Connected
        } else if self.acceptor.is_some() {
            State::Listening
        } else {
            State::Idle
        }
    }

    fn handle(&mut self, command: Command) {
        // A requester that gave up on its reply is not our concern
        match command {
            Command::State(reply) => {
                let _ = reply.send(self.state());
            }
            Command::Addresses(reply) => {
                let _ = reply.send(self.addresses());
            }
            Command::Install(stream, reply) => {
                let _ = reply.send(self.install(stream));
            }
            Command::Bind(port, reply) => {
                let _ = reply.send(self.bind(port));
            }
            Command::TryAccept(binding, reply) => {
                let _ = reply.send(self.try_accept(binding));
            }
            Command::StopListening(binding, reply) => {
                let stopped = if self.listens_at(binding) {
                    self.stop_listening()
                } else {
                    None
                };
                let _ = reply.send(stopped);
            }
            Command::Lease(reply) => {
                let _ = reply.send(self.lease());
            }
            Command::Holds(generation, reply) => {
                let _ = reply.send(self.holds(generation));
            }
            Command::Release(generation, reply) => {
                let released = self.holds(generation);
                if released {
                    self.close_socket();
                }
                let _ = reply.send(released);
            }
            Command::Disconnect(reply) => {
                let _ = reply.send(self.disconnect());
            }
        }
    }

    fn addresses(&self) -> (Option<SocketAddr>, Option<SocketAddr>) {
        match (&self.socket, &self.acceptor) {
            (Some(s), _) => (s.local_addr().ok(), s.peer_addr().ok()),
            (None, Some(a)) => (Some(a.local_addr()), None),
            (None, None) => (None, None),
        }
    }

    fn install(&mut self, stream: TcpStream) -> Result<Lease> {
        let state = self.state();
        if state != State::Idle {
            let _ = teardown(&stream);
            return Err(NetCatError::Busy(state));
        }
        self.adopt(stream)
    }

    fn adopt(&mut self, stream: TcpStream) -> Result<Lease> {
        let lease = stream.try_clone()?;
        self.generation += 1;
        self.socket = Some(stream);
        Ok(Lease {
            stream: lease,
            generation: self.generation,
        })
    }

    fn bind(&mut self, port: u16) -> Result<Binding> {
        let state = self.state();
        if state != State::Idle {
            return Err(NetCatError::Busy(state));
        }
        let acceptor = TcpAcceptor::bind(port).map_err(|source| NetCatError::Bind { port, source })?;
        let addr = acceptor.local_addr();
        self.binding += 1;
        self.acceptor = Some(acceptor);
        Ok(Binding {
            addr,
            generation: self.binding,
        })
    }

    fn listens_at(&self, binding: u64) -> bool {
        self.acceptor.is_some() && self.binding == binding
    }

    fn try_accept(&mut self, binding: u64) -> Result<AcceptPoll> {
        let Some(acceptor) = self.acceptor.as_ref().filter(|_| self.binding == binding) else {
            return Ok(AcceptPoll::Closed);
        };
        match acceptor.try_accept() {
            Ok(Some(stream)) => {
                // Single connection: stop listening as soon as a peer is in
                self.stop_listening();
                Ok(AcceptPoll::Accepted(self.adopt(stream)?))
            }
            Ok(None) => Ok(AcceptPoll::Pending),
            Err(e) => {
                self.stop_listening();
                Err(e.into())
            }
        }
    }

    fn stop_listening(&mut self) -> Option<SocketAddr> {
        let acceptor = self.acceptor.take()?;
        let addr = acceptor.local_addr();
        debug!("Stop listening on {} (TCP)", addr.port());
        Some(addr)
    }

    fn lease(&self) -> Result<Option<Lease>> {
        match &self.socket {
            Some(stream) => Ok(Some(Lease {
                stream: stream.try_clone()?,
                generation: self.generation,
            })),
            None => Ok(None),
        }
    }

    fn holds(&self, generation: u64) -> bool {
        self.socket.is_some() && self.generation == generation
    }

    fn close_socket(&mut self) -> Option<SocketAddr> {
        let stream = self.socket.take()?;
        let peer = stream.peer_addr().ok();
        if let Err(e) = teardown(&stream) {
            warn!("Socket teardown failed: {}", e);
        }
        peer
    }

    fn disconnect(&mut self) -> Disconnected {
        if self.socket.is_some() {
            return Disconnected::Socket(self.close_socket());
        }
        match self.stop_listening() {
            Some(addr) => Disconnected::Listener(addr),
            None => Disconnected::Nothing,
        }
    }
}

/// Cloneable access to the session owner thread.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    commands: Sender<Command>,
}

impl SessionHandle {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("netcat-session".to_string())
            .spawn(move || Self::owner_thread(rx))?;
        Ok(SessionHandle { commands: tx })
    }

    // Runs until every handle is dropped; sockets close with the session
    fn owner_thread(commands: Receiver<Command>) {
        let mut session = Session::default();
        for command in commands {
            session.handle(command);
        }
        session.disconnect();
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| NetCatError::SessionClosed)?;
        response.recv().map_err(|_| NetCatError::SessionClosed)
    }

    pub fn state(&self) -> Result<State> {
        self.request(Command::State)
    }

    /// Local and peer address of whatever the session currently holds.
    pub fn addresses(&self) -> Result<(Option<SocketAddr>, Option<SocketAddr>)> {
        self.request(Command::Addresses)
    }

    pub fn install(&self, stream: TcpStream) -> Result<Lease> {
        self.request(|reply| Command::Install(stream, reply))?
    }

    pub fn bind(&self, port: u16) -> Result<Binding> {
        self.request(|reply| Command::Bind(port, reply))?
    }

    /// Poll the listening handle bound at `binding` for one peer.
    pub fn try_accept(&self, binding: u64) -> Result<AcceptPoll> {
        self.request(|reply| Command::TryAccept(binding, reply))?
    }

    /// Stop listening only if the handle is still the one bound at `binding`.
    pub fn stop_listening(&self, binding: u64) -> Result<Option<SocketAddr>> {
        self.request(|reply| Command::StopListening(binding, reply))
    }

    pub fn lease(&self) -> Result<Option<Lease>> {
        self.request(Command::Lease)?
    }

    pub fn holds(&self, generation: u64) -> Result<bool> {
        self.request(|reply| Command::Holds(generation, reply))
    }

    /// Close the socket only if it is still the one leased at `generation`.
    pub fn release(&self, generation: u64) -> Result<bool> {
        self.request(|reply| Command::Release(generation, reply))
    }

    pub fn disconnect(&self) -> Result<Disconnected> {
        self.request(Command::Disconnect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let acceptor = TcpAcceptor::bind(0).unwrap();
        let local = TcpStream::connect(("127.0.0.1", acceptor.local_addr().port())).unwrap();
        loop {
            if let Some(remote) = acceptor.try_accept().unwrap() {
                return (local, remote);
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    #[test]
    fn state_follows_fields() {
        let mut session = Session::default();
        assert_eq!(session.state(), State::Idle);

        let binding = session.bind(0).unwrap();
        assert_eq!(session.state(), State::Listening);
        assert!(matches!(session.bind(0), Err(NetCatError::Busy(State::Listening))));

        assert!(matches!(session.disconnect(), Disconnected::Listener(_)));
        assert_eq!(session.state(), State::Idle);
        assert!(matches!(session.try_accept(binding.generation), Ok(AcceptPoll::Closed)));
    }

    #[test]
    fn stale_binding_cannot_reach_a_newer_handle() {
        let mut session = Session::default();
        let first = session.bind(0).unwrap();
        session.disconnect();
        let second = session.bind(0).unwrap();
        assert_ne!(first.generation, second.generation);

        assert!(matches!(session.try_accept(first.generation), Ok(AcceptPoll::Closed)));
        assert!(matches!(session.try_accept(second.generation), Ok(AcceptPoll::Pending)));

        let (reply, stopped) = bounded(1);
        session.handle(Command::StopListening(first.generation, reply));
        assert_eq!(stopped.recv().unwrap(), None);
        assert_eq!(session.state(), State::Listening);
    }

    #[test]
    fn install_refused_unless_idle() {
        let (a, _peer_a) = connected_pair();
        let (b, mut peer_b) = connected_pair();
        let mut session = Session::default();

        session.install(a).unwrap();
        assert_eq!(session.state(), State::Connected);
        assert!(matches!(session.install(b), Err(NetCatError::Busy(State::Connected))));

        // The refused stream was torn down
        let mut buf = [0u8; 4];
        assert_eq!(peer_b.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn release_only_closes_matching_generation() {
        let (a, _pa) = connected_pair();
        let (b, _pb) = connected_pair();
        let mut session = Session::default();

        let first = session.install(a).unwrap();
        session.disconnect();
        let second = session.install(b).unwrap();

        assert!(!session.holds(first.generation));
        assert!(session.holds(second.generation));
        session.handle(Command::Release(first.generation, bounded(1).0));
        assert_eq!(session.state(), State::Connected);
    }

    #[test]
    fn handle_round_trips_through_owner_thread() {
        let handle = SessionHandle::spawn().unwrap();
        assert_eq!(handle.state().unwrap(), State::Idle);
        let binding = handle.bind(0).unwrap();
        assert_eq!(handle.addresses().unwrap(), (Some(binding.addr), None));
        assert_eq!(handle.stop_listening(binding.generation).unwrap(), Some(binding.addr));
        assert!(matches!(handle.disconnect().unwrap(), Disconnected::Nothing));
    }
}
