// Project module: managing projects through the monitor and listing engine contents
// Author: Gabriel Demetrios Lafis

mod engine;
mod monitor;

pub use engine::*;
pub use monitor::*;

use thiserror::Error;

use crate::comm::CommError;
use crate::data::DataError;
use crate::pipeline::PipelineError;

/// Represents an error in the project module
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for ProjectError {
    fn from(err: serde_json::Error) -> Self {
        ProjectError::Comm(CommError::Json(err))
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(err: std::io::Error) -> Self {
        ProjectError::Comm(CommError::Io(err))
    }
}

impl From<DataError> for ProjectError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Comm(err) => ProjectError::Comm(err),
            DataError::Io(err) => ProjectError::Comm(CommError::Io(err)),
            other => ProjectError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<PipelineError> for ProjectError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Comm(err) => ProjectError::Comm(err),
            PipelineError::Data(err) => err.into(),
            other => ProjectError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<String> for ProjectError {
    fn from(msg: String) -> Self {
        ProjectError::InvalidArgument(msg)
    }
}
