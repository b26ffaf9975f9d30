// Core module: session states, operations and results (NO I/O dependencies)
pub mod error;
pub mod operation;
pub mod types;

pub use error::*;
pub use operation::*;
pub use types::*;
