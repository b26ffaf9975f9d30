// Transport module: socket plumbing and the line relay
pub mod acceptor;
pub mod relay;
pub mod tcp;

pub use acceptor::*;
pub use relay::*;
pub use tcp::*;
