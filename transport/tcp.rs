// TCP transport: outbound connect with a bounded timeout and socket teardown
use std::io::{Error, ErrorKind, Result};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

pub struct TcpTransport {
    address: String,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        TcpTransport {
            address: format!("{}:{}", host, port),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Try each resolved address in turn, each attempt bounded by the timeout.
    pub fn connect(&self) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::new(ErrorKind::AddrNotAvailable, "host resolved to no addresses")
        }))
    }
}

/// Close both halves of a socket, outbound first.
///
/// Shutting down the read half is what wakes a reader blocked on a cloned
/// handle of the same socket. A peer that already went away is not an error.
pub fn teardown(stream: &TcpStream) -> Result<()> {
    for how in [Shutdown::Write, Shutdown::Read] {
        match stream.shutdown(how) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
