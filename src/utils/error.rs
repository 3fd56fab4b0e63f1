// Error handling utilities
// Author: Gabriel Demetrios Lafis

use thiserror::Error;

use crate::comm::CommError;
use crate::data::DataError;
use crate::pipeline::PipelineError;
use crate::project::ProjectError;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Project error: {0}")]
    Project(#[from] ProjectError),
    #[error("Communication error: {0}")]
    Comm(#[from] CommError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error: {0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was reported by the engine after a completed round trip
    pub fn is_engine_error(&self) -> bool {
        match self {
            AppError::Comm(err) => err.is_engine(),
            AppError::Data(DataError::Comm(err)) => err.is_engine(),
            AppError::Pipeline(PipelineError::Comm(err)) => err.is_engine(),
            AppError::Pipeline(PipelineError::Data(DataError::Comm(err))) => err.is_engine(),
            AppError::Project(ProjectError::Comm(err)) => err.is_engine(),
            _ => false,
        }
    }
}

/// Result type alias for AppError
pub type AppResult<T> = Result<T, AppError>;
