// Operations and their results - pure data, no I/O
use std::net::TcpStream;

use crate::error::NetCatError;
use crate::types::OpKind;

/// One unit of requested work with its raw string parameters.
///
/// Parameters stay unparsed until the operation executes, so a malformed
/// port or protocol tag is reported through the result like any other fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Connect { proto: String, host: String, port: String },
    Listen { proto: String, port: String },
    Receive,
    Send,
    Disconnect,
}

impl Operation {
    pub fn connect(proto: &str, host: &str, port: &str) -> Self {
        Operation::Connect {
            proto: proto.to_string(),
            host: host.to_string(),
            port: port.to_string(),
        }
    }

    pub fn listen(proto: &str, port: &str) -> Self {
        Operation::Listen {
            proto: proto.to_string(),
            port: port.to_string(),
        }
    }

    /// Build an operation from positional parameters: the op tag first, then
    /// the op's own parameters (`CONNECT proto host port`, `LISTEN proto port`).
    pub fn from_params<S: AsRef<str>>(params: &[S]) -> Result<Self, NetCatError> {
        let tag = params
            .first()
            .ok_or_else(|| NetCatError::InvalidParameter("missing operation".to_string()))?;
        let kind: OpKind = tag.as_ref().parse()?;
        let arg = |i: usize, name: &str| -> Result<String, NetCatError> {
            params
                .get(i)
                .map(|s| s.as_ref().to_string())
                .ok_or_else(|| NetCatError::InvalidParameter(format!("{} requires {}", kind, name)))
        };

        Ok(match kind {
            OpKind::Connect => Operation::Connect {
                proto: arg(1, "a protocol")?,
                host: arg(2, "a host")?,
                port: arg(3, "a port")?,
            },
            OpKind::Listen => Operation::Listen {
                proto: arg(1, "a protocol")?,
                port: arg(2, "a port")?,
            },
            OpKind::Receive => Operation::Receive,
            OpKind::Send => Operation::Send,
            OpKind::Disconnect => Operation::Disconnect,
        })
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Connect { .. } => OpKind::Connect,
            Operation::Listen { .. } => OpKind::Listen,
            Operation::Receive => OpKind::Receive,
            Operation::Send => OpKind::Send,
            Operation::Disconnect => OpKind::Disconnect,
        }
    }
}

/// Terminal outcome of one operation.
///
/// A result without an error is a success; CONNECT and LISTEN successes carry
/// a handle to the socket the session now owns.
#[derive(Debug)]
pub struct OpResult {
    pub op: OpKind,
    pub socket: Option<TcpStream>,
    pub error: Option<NetCatError>,
}

impl OpResult {
    pub fn new(op: OpKind) -> Self {
        OpResult {
            op,
            socket: None,
            error: None,
        }
    }

    pub fn failed(op: OpKind, error: NetCatError) -> Self {
        OpResult {
            op,
            socket: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn take_socket(&mut self) -> Option<TcpStream> {
        self.socket.take()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}
