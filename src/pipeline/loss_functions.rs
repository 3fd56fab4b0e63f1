// Loss functions of the feature learners
// Author: Gabriel Demetrios Lafis

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PipelineError;

/// Objective the feature learners optimize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossFunction {
    CrossEntropyLoss,
    SquareLoss,
}

impl LossFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossFunction::CrossEntropyLoss => "CrossEntropyLoss",
            LossFunction::SquareLoss => "SquareLoss",
        }
    }

    /// Whether the loss function belongs to a classification problem
    pub fn is_classification(&self) -> bool {
        matches!(self, LossFunction::CrossEntropyLoss)
    }
}

impl Default for LossFunction {
    fn default() -> Self {
        LossFunction::SquareLoss
    }
}

impl fmt::Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LossFunction {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CrossEntropyLoss" => Ok(LossFunction::CrossEntropyLoss),
            "SquareLoss" => Ok(LossFunction::SquareLoss),
            other => Err(PipelineError::InvalidArgument(format!(
                "'loss_function' must be 'CrossEntropyLoss' or 'SquareLoss', got '{}'",
                other
            ))),
        }
    }
}
