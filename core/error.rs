// Failure causes carried by an operation result
use std::io;

use thiserror::Error;

use crate::types::State;

pub type Result<T> = std::result::Result<T, NetCatError>;

#[derive(Debug, Error)]
pub enum NetCatError {
    /// Connect attempt refused, unreachable or timed out.
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Listening socket could not be bound.
    #[error("cannot listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("listening task is cancelled")]
    Cancelled,

    /// Unexpected I/O error while relaying lines.
    #[error("stream fault: {0}")]
    Stream(#[source] io::Error),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("session is {0}, disconnect first")]
    Busy(State),

    #[error("no {0} buffer set")]
    MissingBuffer(&'static str),

    #[error("session is closed")]
    SessionClosed,

    #[error("operation panicked: {0}")]
    Panicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl NetCatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetCatError::Cancelled)
    }
}
