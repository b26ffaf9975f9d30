// Non-blocking listening socket polled for a single inbound connection
use std::io::{ErrorKind, Result};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};

use tracing::debug;

pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// Bind every interface on `port` and switch the handle to non-blocking.
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        debug!("Bound listening socket on {}", local_addr);
        Ok(TcpAcceptor {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// One accept attempt. `Ok(None)` means no peer is waiting yet.
    pub fn try_accept(&self) -> Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                // Some platforms hand out accepted sockets in the listener's mode
                stream.set_nonblocking(false)?;
                debug!("Accepted connection from {} on {}", peer, self.local_addr);
                Ok(Some(stream))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
