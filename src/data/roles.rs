// Column roles
// Author: Gabriel Demetrios Lafis

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::DataError;

/// The semantic category of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Categorical,
    JoinKey,
    Numerical,
    Target,
    Text,
    TimeStamp,
    UnusedFloat,
    UnusedString,
}

impl Role {
    /// All roles in bucket order
    pub const ALL: [Role; 8] = [
        Role::Categorical,
        Role::JoinKey,
        Role::Numerical,
        Role::Target,
        Role::Text,
        Role::TimeStamp,
        Role::UnusedFloat,
        Role::UnusedString,
    ];

    /// Roles in the order tables present their columns
    pub const DISPLAY_ORDER: [Role; 8] = [
        Role::TimeStamp,
        Role::JoinKey,
        Role::Target,
        Role::Categorical,
        Role::Numerical,
        Role::Text,
        Role::UnusedFloat,
        Role::UnusedString,
    ];

    /// Get the wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Categorical => "categorical",
            Role::JoinKey => "join_key",
            Role::Numerical => "numerical",
            Role::Target => "target",
            Role::Text => "text",
            Role::TimeStamp => "time_stamp",
            Role::UnusedFloat => "unused_float",
            Role::UnusedString => "unused_string",
        }
    }

    /// Roles whose columns the engine stores as strings
    pub fn is_categorical_family(&self) -> bool {
        matches!(
            self,
            Role::Categorical | Role::JoinKey | Role::Text | Role::UnusedString
        )
    }

    /// Roles whose columns the engine stores as floats
    pub fn is_numerical_family(&self) -> bool {
        !self.is_categorical_family()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                DataError::Value(format!(
                    "'{}' is not a proper role. Valid roles are: {}",
                    s,
                    Role::ALL.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
                ))
            })
    }
}

/// Column names partitioned into the eight role buckets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub join_key: Vec<String>,
    #[serde(default)]
    pub numerical: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub time_stamp: Vec<String>,
    #[serde(default)]
    pub unused_float: Vec<String>,
    #[serde(default)]
    pub unused_string: Vec<String>,
}

impl Roles {
    /// Create an empty container
    pub fn new() -> Self {
        Roles::default()
    }

    /// Add columns to a bucket, builder style
    pub fn with(mut self, role: Role, names: &[&str]) -> Self {
        self.get_mut(role).extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Build from role buckets, validating uniqueness
    pub fn from_mapping<I, S>(mapping: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = (Role, Vec<S>)>,
        S: Into<String>,
    {
        let mut roles = Roles::new();

        for (role, names) in mapping {
            roles
                .get_mut(role)
                .extend(names.into_iter().map(Into::into));
        }

        roles.validate()?;
        Ok(roles)
    }

    /// Build from column/role pairs
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = (S, Role)>,
        S: Into<String>,
    {
        let mut roles = Roles::new();

        for (name, role) in pairs {
            roles.get_mut(role).push(name.into());
        }

        roles.validate()?;
        Ok(roles)
    }

    /// Parse the engine's `{"categorical": [...], ...}` form
    pub fn from_json(value: &JsonValue) -> Result<Self, DataError> {
        let roles: Roles = serde_json::from_value(value.clone())?;
        roles.validate()?;
        Ok(roles)
    }

    /// Serialize to the engine's form
    pub fn to_json(&self) -> JsonValue {
        let map: serde_json::Map<String, JsonValue> = Role::ALL
            .iter()
            .map(|role| (role.as_str().to_string(), JsonValue::from(self.get(*role).to_vec())))
            .collect();

        JsonValue::Object(map)
    }

    /// Check that no column name is assigned more than once
    pub fn validate(&self) -> Result<(), DataError> {
        let mut seen: HashMap<&str, Role> = HashMap::new();
        let mut duplicates = Vec::new();

        for role in Role::ALL {
            for name in self.get(role) {
                if let Some(first) = seen.insert(name.as_str(), role) {
                    duplicates.push(format!("'{}' ({} and {})", name, first, role));
                }
            }
        }

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(DataError::Value(format!(
                "Column names must be unique across all roles. Found duplicate roles set for column(s): {}.",
                duplicates.join(", ")
            )))
        }
    }

    /// Get the names in a bucket
    pub fn get(&self, role: Role) -> &[String] {
        match role {
            Role::Categorical => &self.categorical,
            Role::JoinKey => &self.join_key,
            Role::Numerical => &self.numerical,
            Role::Target => &self.target,
            Role::Text => &self.text,
            Role::TimeStamp => &self.time_stamp,
            Role::UnusedFloat => &self.unused_float,
            Role::UnusedString => &self.unused_string,
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Categorical => &mut self.categorical,
            Role::JoinKey => &mut self.join_key,
            Role::Numerical => &mut self.numerical,
            Role::Target => &mut self.target,
            Role::Text => &mut self.text,
            Role::TimeStamp => &mut self.time_stamp,
            Role::UnusedFloat => &mut self.unused_float,
            Role::UnusedString => &mut self.unused_string,
        }
    }

    /// The role of a column, if it has one
    pub fn column(&self, name: &str) -> Option<Role> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| self.get(*role).iter().any(|n| n == name))
    }

    /// Whether a column is present in any bucket
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// All column names in bucket order
    pub fn columns(&self) -> Vec<String> {
        Role::ALL
            .iter()
            .flat_map(|role| self.get(*role).iter().cloned())
            .collect()
    }

    /// All column names in display order
    pub fn colnames(&self) -> Vec<String> {
        Role::DISPLAY_ORDER
            .iter()
            .flat_map(|role| self.get(*role).iter().cloned())
            .collect()
    }

    /// The role of every column, in bucket order
    pub fn to_list(&self) -> Vec<Role> {
        Role::ALL
            .iter()
            .flat_map(|role| std::iter::repeat(*role).take(self.get(*role).len()))
            .collect()
    }

    /// Map from column name to role
    pub fn to_mapping(&self) -> BTreeMap<String, Role> {
        Role::ALL
            .iter()
            .flat_map(|role| self.get(*role).iter().map(move |n| (n.clone(), *role)))
            .collect()
    }

    /// Merge another container into this one; assignments in `other` win
    pub fn update(&self, other: &Roles) -> Roles {
        let mut updated = Roles::new();
        let overridden = other.to_mapping();

        for role in Role::ALL {
            for name in self.get(role) {
                if !overridden.contains_key(name) {
                    updated.get_mut(role).push(name.clone());
                }
            }
        }

        for role in Role::ALL {
            updated.get_mut(role).extend(other.get(role).iter().cloned());
        }

        updated
    }

    /// Columns in either unused bucket
    pub fn unused(&self) -> Vec<String> {
        self.unused_float
            .iter()
            .chain(self.unused_string.iter())
            .cloned()
            .collect()
    }

    /// Number of columns across all buckets
    pub fn len(&self) -> usize {
        Role::ALL.iter().map(|role| self.get(*role).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy without the given columns
    pub fn without(&self, names: &[String]) -> Roles {
        let mut roles = self.clone();
        for role in Role::ALL {
            roles.get_mut(role).retain(|n| !names.contains(n));
        }
        roles
    }

    /// A copy where `name` is moved into `role`, appended if absent
    pub fn with_column(&self, name: &str, role: Role) -> Roles {
        let mut roles = Roles::new();

        for r in Role::ALL {
            for n in self.get(r) {
                if n == name {
                    if r == role {
                        roles.get_mut(r).push(n.clone());
                    }
                } else {
                    roles.get_mut(r).push(n.clone());
                }
            }
        }

        if !roles.get(role).iter().any(|n| n == name) {
            roles.get_mut(role).push(name.to_string());
        }

        roles
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for role in Role::ALL {
            let names = self.get(role);
            if names.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}:", role)?;
            for name in names {
                write!(f, "\n  - {}", name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!("join_key".parse::<Role>().unwrap(), Role::JoinKey);
        assert!("joinkey".parse::<Role>().is_err());
        assert!(Role::Text.is_categorical_family());
        assert!(Role::TimeStamp.is_numerical_family());
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let err = Roles::from_mapping(vec![
            (Role::Numerical, vec!["amount"]),
            (Role::Target, vec!["amount"]),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("Column names must be unique across all roles"));
        assert!(err.to_string().contains("'amount'"));
    }

    #[test]
    fn test_lookup_and_order() {
        let roles = Roles::new()
            .with(Role::Numerical, &["amount"])
            .with(Role::JoinKey, &["id"])
            .with(Role::TimeStamp, &["date"]);

        assert_eq!(roles.column("id"), Some(Role::JoinKey));
        assert_eq!(roles.column("missing"), None);
        assert_eq!(roles.columns(), vec!["id", "amount", "date"]);
        assert_eq!(roles.colnames(), vec!["date", "id", "amount"]);
        assert_eq!(roles.to_list(), vec![Role::JoinKey, Role::Numerical, Role::TimeStamp]);
    }

    #[test]
    fn test_json_round_trip() {
        let roles = Roles::new()
            .with(Role::Numerical, &["amount"])
            .with(Role::JoinKey, &["id"])
            .with(Role::TimeStamp, &["date"]);

        let decoded = Roles::from_json(&roles.to_json()).unwrap();

        assert_eq!(decoded, roles);
        assert_eq!(decoded.to_mapping(), roles.to_mapping());
    }

    #[test]
    fn test_update_later_assignment_wins() {
        let base = Roles::new().with(Role::UnusedString, &["a", "b"]);
        let update = Roles::new().with(Role::Categorical, &["a"]);

        let merged = base.update(&update);

        assert_eq!(merged.column("a"), Some(Role::Categorical));
        assert_eq!(merged.column("b"), Some(Role::UnusedString));
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_with_column_moves_between_buckets() {
        let roles = Roles::new().with(Role::UnusedFloat, &["x", "y"]);

        let moved = roles.with_column("x", Role::Target);

        assert_eq!(moved.target, vec!["x"]);
        assert_eq!(moved.unused_float, vec!["y"]);
        assert_eq!(moved.without(&["y".to_string()]).len(), 1);
    }
}
