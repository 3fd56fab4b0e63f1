// Communication module for talking to the engine over its socket protocol
// Author: Gabriel Demetrios Lafis

mod issues;
mod session;
mod socket;

pub use issues::*;
pub use session::*;
pub use socket::*;

use thiserror::Error;

/// Default port of the engine
pub const DEFAULT_PORT: u16 = 1708;

/// Default port of the monitor that manages projects
pub const DEFAULT_MONITOR_PORT: u16 = 1711;

/// Reply signalling that a command succeeded
pub const SUCCESS: &str = "Success!";

/// Reply signalling that the requested object exists and a payload follows
pub const FOUND: &str = "Found!";

/// Separator between the elements of a string column on the wire
pub const GETML_SEP: &str = "$GETML_SEP";

/// Log target used for progress messages streamed by the engine
pub const PROGRESS_TARGET: &str = "getml::progress";

/// Represents an error in the communication module
#[derive(Debug, Error)]
pub enum CommError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Engine(String),
    #[error("Could not connect to {0}. Is the engine running?")]
    Connection(String),
    #[cfg(feature = "arrow")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl CommError {
    /// Whether the error is a message the engine sent after a completed round trip
    pub fn is_engine(&self) -> bool {
        matches!(self, CommError::Engine(_))
    }
}

/// Turn an unexpected reply into an engine error
pub fn handle_engine_exception<T>(msg: impl Into<String>) -> Result<T, CommError> {
    Err(CommError::Engine(msg.into()))
}
