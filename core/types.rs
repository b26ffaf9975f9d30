// Core types shared by the executor, the transport and the caller
use std::fmt;
use std::str::FromStr;

use crate::error::NetCatError;

// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// No socket at all.
    #[default]
    Idle,
    /// Bound and polling for a peer.
    Listening,
    /// Active socket, accepted or connected outward.
    Connected,
}

impl State {
    pub fn is_listening(self) -> bool {
        self == State::Listening
    }

    pub fn is_connected(self) -> bool {
        self == State::Connected
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Listening => write!(f, "LISTENING"),
            State::Connected => write!(f, "CONNECTED"),
        }
    }
}

// Protocol tag carried by CONNECT and LISTEN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Tcp,
}

impl FromStr for Proto {
    type Err = NetCatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("TCP") {
            Ok(Proto::Tcp)
        } else {
            Err(NetCatError::InvalidParameter(format!("unknown protocol: {}", s)))
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Proto::Tcp => write!(f, "TCP"),
        }
    }
}

// Operation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Connect,
    Listen,
    Receive,
    Send,
    Disconnect,
}

/// Where an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The single background worker, one operation after another.
    Serial,
    /// A dedicated thread, concurrent with everything else.
    Parallel,
}

impl OpKind {
    /// Long-running or blocking operations must not starve the serial worker.
    pub fn dispatch(self) -> Dispatch {
        match self {
            OpKind::Listen | OpKind::Receive => Dispatch::Parallel,
            OpKind::Connect | OpKind::Send | OpKind::Disconnect => Dispatch::Serial,
        }
    }
}

impl FromStr for OpKind {
    type Err = NetCatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONNECT" => Ok(OpKind::Connect),
            "LISTEN" => Ok(OpKind::Listen),
            "RECEIVE" => Ok(OpKind::Receive),
            "SEND" => Ok(OpKind::Send),
            "DISCONNECT" => Ok(OpKind::Disconnect),
            _ => Err(NetCatError::InvalidParameter(format!("unknown operation: {}", s))),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpKind::Connect => write!(f, "CONNECT"),
            OpKind::Listen => write!(f, "LISTEN"),
            OpKind::Receive => write!(f, "RECEIVE"),
            OpKind::Send => write!(f, "SEND"),
            OpKind::Disconnect => write!(f, "DISCONNECT"),
        }
    }
}

/// Parse a port string: a non-negative integer that fits a TCP port.
pub fn parse_port(s: &str) -> Result<u16, NetCatError> {
    s.trim()
        .parse::<u16>()
        .map_err(|_| NetCatError::InvalidParameter(format!("invalid port: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_tags_parse_case_insensitively() {
        assert_eq!("CONNECT".parse::<OpKind>().unwrap(), OpKind::Connect);
        assert_eq!("receive".parse::<OpKind>().unwrap(), OpKind::Receive);
        assert!("ACCEPT".parse::<OpKind>().is_err());
    }

    #[test]
    fn op_tags_display_round_trip() {
        for kind in [OpKind::Connect, OpKind::Listen, OpKind::Receive, OpKind::Send, OpKind::Disconnect] {
            assert_eq!(kind.to_string().parse::<OpKind>().unwrap(), kind);
        }
    }

    #[test]
    fn blocking_ops_run_in_parallel() {
        assert_eq!(OpKind::Listen.dispatch(), Dispatch::Parallel);
        assert_eq!(OpKind::Receive.dispatch(), Dispatch::Parallel);
        assert_eq!(OpKind::Connect.dispatch(), Dispatch::Serial);
        assert_eq!(OpKind::Send.dispatch(), Dispatch::Serial);
        assert_eq!(OpKind::Disconnect.dispatch(), Dispatch::Serial);
    }

    #[test]
    fn only_tcp_is_known() {
        assert_eq!("TCP".parse::<Proto>().unwrap(), Proto::Tcp);
        assert!(matches!("UDP".parse::<Proto>(), Err(NetCatError::InvalidParameter(_))));
    }

    #[test]
    fn ports_must_be_non_negative_integers() {
        assert_eq!(parse_port("9000").unwrap(), 9000);
        assert_eq!(parse_port("0").unwrap(), 0);
        assert!(parse_port("-1").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn state_queries() {
        assert!(State::Listening.is_listening());
        assert!(!State::Listening.is_connected());
        assert!(State::Connected.is_connected());
        assert_eq!(State::default(), State::Idle);
    }
}
