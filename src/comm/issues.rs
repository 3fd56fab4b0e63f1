// Issues reported by the engine
// Author: Gabriel Demetrios Lafis

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CommError;

/// A single warning the engine raised while checking or ingesting data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "message_")]
    pub message: String,
    #[serde(rename = "label_", default)]
    pub label: String,
    #[serde(rename = "warning_type_", default)]
    pub warning_type: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}] {}", self.warning_type, self.label, self.message)
    }
}

#[derive(Deserialize)]
struct IssuesPayload {
    #[serde(rename = "warnings_", default)]
    warnings: Vec<Issue>,
}

/// Collection of issues
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Create a collection from a list of issues
    pub fn new(issues: Vec<Issue>) -> Self {
        Issues(issues)
    }

    /// Parse the engine's `{"warnings_": [...]}` reply
    pub fn from_json(msg: &str) -> Result<Self, CommError> {
        if !msg.starts_with('{') {
            return Err(CommError::Engine(msg.to_string()));
        }

        let payload: IssuesPayload = serde_json::from_str(msg)?;
        Ok(Issues(payload.warnings))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    /// Issues of the given warning type
    pub fn of_type(&self, warning_type: &str) -> Vec<&Issue> {
        self.0
            .iter()
            .filter(|issue| issue.warning_type == warning_type)
            .collect()
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_issues() {
        let msg = r#"{"warnings_":[{"message_":"Column has many null values.","label_":"HIGH SHARE OF NULL VALUES","warning_type_":"COLUMN SHOULD BE UNUSED"}]}"#;

        let issues = Issues::from_json(msg).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues.of_type("COLUMN SHOULD BE UNUSED").len(), 1);
        assert!(issues.to_string().contains("HIGH SHARE OF NULL VALUES"));
    }

    #[test]
    fn test_empty_and_error_replies() {
        assert!(Issues::from_json(r#"{"warnings_":[]}"#).unwrap().is_empty());

        let err = Issues::from_json("Data frame 'x' not found!").unwrap_err();
        assert!(err.is_engine());
        assert_eq!(err.to_string(), "Data frame 'x' not found!");
    }
}
