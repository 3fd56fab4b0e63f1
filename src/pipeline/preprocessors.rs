// Preprocessors the engine applies before feature learning
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{check_aggregations, engine_cmd, Aggregation, PipelineError, MAPPING_ALL, MAPPING_DEFAULT};

/// A transformation the engine applies to the input tables
pub trait Preprocessor: fmt::Debug {
    fn type_name(&self) -> &str;

    fn validate(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn to_cmd(&self) -> Result<JsonValue, PipelineError>;
}

/// Implement [`Preprocessor`] for a serde struct under its own type name.
macro_rules! impl_preprocessor {
    ($ty:ident) => {
        impl Preprocessor for $ty {
            fn type_name(&self) -> &str {
                stringify!($ty)
            }

            fn validate(&self) -> Result<(), PipelineError> {
                $ty::check(self)
            }

            fn to_cmd(&self) -> Result<JsonValue, PipelineError> {
                self.validate()?;
                engine_cmd(self, self.type_name())
            }
        }
    };
}

/// Replaces rare categories with a placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrimmer {
    pub max_num_categories: usize,
    pub min_freq: usize,
}

impl Default for CategoryTrimmer {
    fn default() -> Self {
        CategoryTrimmer {
            max_num_categories: 999,
            min_freq: 30,
        }
    }
}

impl CategoryTrimmer {
    pub fn new(max_num_categories: usize, min_freq: usize) -> Self {
        CategoryTrimmer {
            max_num_categories,
            min_freq,
        }
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.max_num_categories == 0 {
            return Err(PipelineError::InvalidArgument(
                "'max_num_categories' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extracts the domain from columns holding e-mail addresses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailDomain {}

impl EmailDomain {
    pub fn new() -> Self {
        EmailDomain {}
    }

    fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Replaces missing numerical values by the column mean
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imputation {
    /// Add a dummy column marking the imputed values
    pub add_dummies: bool,
}

impl Imputation {
    pub fn new(add_dummies: bool) -> Self {
        Imputation { add_dummies }
    }

    fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Maps categories and words to aggregated target values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub aggregation: Vec<Aggregation>,
    pub min_freq: usize,
    pub multithreading: bool,
}

impl Default for Mapping {
    fn default() -> Self {
        Mapping {
            aggregation: MAPPING_DEFAULT.to_vec(),
            min_freq: 30,
            multithreading: true,
        }
    }
}

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    pub fn with_aggregation(mut self, aggregation: &[Aggregation]) -> Self {
        self.aggregation = aggregation.to_vec();
        self
    }

    pub fn with_min_freq(mut self, min_freq: usize) -> Self {
        self.min_freq = min_freq;
        self
    }

    fn check(&self) -> Result<(), PipelineError> {
        check_aggregations(&self.aggregation, MAPPING_ALL, "Mapping")
    }
}

/// Extracts hour, minute, weekday, month and year from time stamps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seasonal {
    pub disable_year: bool,
    pub disable_month: bool,
    pub disable_weekday: bool,
    pub disable_hour: bool,
    pub disable_minute: bool,
}

impl Seasonal {
    pub fn new() -> Self {
        Seasonal::default()
    }

    fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Extracts a substring from categorical columns and unused string columns
/// carrying `unit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substring {
    pub begin: usize,
    pub length: usize,
    pub unit: String,
}

impl Substring {
    pub fn new(begin: usize, length: usize, unit: &str) -> Self {
        Substring {
            begin,
            length,
            unit: unit.to_string(),
        }
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.length == 0 {
            return Err(PipelineError::InvalidArgument(
                "'length' of a substring must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Splits text fields into one row per word
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFieldSplitter {}

impl TextFieldSplitter {
    pub fn new() -> Self {
        TextFieldSplitter {}
    }

    fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl_preprocessor!(CategoryTrimmer);
impl_preprocessor!(EmailDomain);
impl_preprocessor!(Imputation);
impl_preprocessor!(Mapping);
impl_preprocessor!(Seasonal);
impl_preprocessor!(Substring);
impl_preprocessor!(TextFieldSplitter);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commands() {
        assert_eq!(
            CategoryTrimmer::default().to_cmd().unwrap(),
            json!({ "type_": "CategoryTrimmer", "max_num_categories_": 999, "min_freq_": 30 })
        );
        assert_eq!(EmailDomain::new().to_cmd().unwrap(), json!({ "type_": "EmailDomain" }));
        assert_eq!(Mapping::new().to_cmd().unwrap()["aggregation_"], json!(["AVG"]));
        assert_eq!(Substring::new(0, 5, "zip").to_cmd().unwrap()["unit_"], "zip");
    }

    #[test]
    fn test_validation() {
        assert!(Substring::new(0, 0, "zip").validate().is_err());
        assert!(Mapping::new().with_aggregation(&[Aggregation::Trend]).validate().is_err());
        assert!(CategoryTrimmer::new(0, 30).validate().is_err());
    }
}
