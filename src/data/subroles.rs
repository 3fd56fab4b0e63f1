// Subroles restricting which algorithms may use a column
// Author: Gabriel Demetrios Lafis

use super::DataError;

pub const EXCLUDE_CATEGORY_TRIMMER: &str = "exclude category trimmer";
pub const EXCLUDE_FASTPROP: &str = "exclude fastprop";
pub const EXCLUDE_FEATURE_LEARNERS: &str = "exclude feature learners";
pub const EXCLUDE_IMPUTATION: &str = "exclude imputation";
pub const EXCLUDE_MAPPING: &str = "exclude mapping";
pub const EXCLUDE_MULTIREL: &str = "exclude multirel";
pub const EXCLUDE_PREDICTORS: &str = "exclude predictors";
pub const EXCLUDE_PREPROCESSORS: &str = "exclude preprocessors";
pub const EXCLUDE_SEASONAL: &str = "exclude seasonal";
pub const EXCLUDE_TEXT_FIELD_SPLITTER: &str = "exclude text field splitter";
pub const INCLUDE_EMAIL: &str = "include email";
pub const INCLUDE_SUBSTRING: &str = "include substring";
pub const ONLY_EMAIL: &str = "only email";
pub const ONLY_SUBSTRING: &str = "only substring";

/// Every subrole the engine understands
pub const ALL_SUBROLES: [&str; 14] = [
    EXCLUDE_CATEGORY_TRIMMER,
    EXCLUDE_FASTPROP,
    EXCLUDE_FEATURE_LEARNERS,
    EXCLUDE_IMPUTATION,
    EXCLUDE_MAPPING,
    EXCLUDE_MULTIREL,
    EXCLUDE_PREDICTORS,
    EXCLUDE_PREPROCESSORS,
    EXCLUDE_SEASONAL,
    EXCLUDE_TEXT_FIELD_SPLITTER,
    INCLUDE_EMAIL,
    INCLUDE_SUBSTRING,
    ONLY_EMAIL,
    ONLY_SUBSTRING,
];

/// Reject subroles outside the known set
pub fn validate_subroles<S: AsRef<str>>(subroles: &[S]) -> Result<(), DataError> {
    let invalid: Vec<&str> = subroles
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !ALL_SUBROLES.contains(s))
        .collect();

    if invalid.is_empty() {
        return Ok(());
    }

    Err(DataError::Value(format!(
        "'subroles' must be one of the following: {:?}, got {:?}",
        ALL_SUBROLES, invalid
    )))
}
