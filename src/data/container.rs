// Container: the tables a pipeline runs on, grouped into named subsets
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::{random, BooleanColumnView, DataError, FloatOps, Table};
use crate::comm::Session;
use crate::utils::validate_name;

const CONTAINER_ID_LENGTH: usize = 6;

/// One subset of a container: its population and the shared peripheral tables
#[derive(Debug, Clone)]
pub struct Subset {
    container_id: String,
    name: String,
    population: Table,
    peripheral: BTreeMap<String, Table>,
}

impl Subset {
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn population(&self) -> &Table {
        &self.population
    }

    /// Peripheral tables keyed by placeholder name
    pub fn peripheral(&self) -> &BTreeMap<String, Table> {
        &self.peripheral
    }
}

/// Population subsets and peripheral tables kept together
///
/// Subsets are either passed explicitly or cut out of a population table
/// with boolean masks. A frozen container rejects further changes.
#[derive(Debug, Clone)]
pub struct Container {
    id: String,
    population: Option<Table>,
    peripheral: BTreeMap<String, Table>,
    subsets: BTreeMap<String, Table>,
    frozen: bool,
}

impl Container {
    /// A container whose subsets are cut out of `population`
    pub fn new(population: Table) -> Self {
        Container {
            population: Some(population),
            ..Container::empty()
        }
    }

    /// A container whose subsets are all passed explicitly
    pub fn empty() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONTAINER_ID_LENGTH)
            .map(char::from)
            .collect();

        Container {
            id,
            population: None,
            peripheral: BTreeMap::new(),
            subsets: BTreeMap::new(),
            frozen: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn population(&self) -> Option<&Table> {
        self.population.as_ref()
    }

    pub fn peripheral(&self) -> &BTreeMap<String, Table> {
        &self.peripheral
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Names of the subsets, sorted
    pub fn subset_names(&self) -> Vec<String> {
        self.subsets.keys().cloned().collect()
    }

    /// Add a peripheral table under the name of its placeholder
    pub fn with_peripheral(mut self, name: &str, table: impl Into<Table>) -> Result<Self, DataError> {
        self.add_peripheral(name, table)?;
        Ok(self)
    }

    /// Add a subset given as a table of its own
    pub fn with_subset(mut self, name: &str, table: impl Into<Table>) -> Result<Self, DataError> {
        self.add_subset(name, table)?;
        Ok(self)
    }

    pub fn add_peripheral(&mut self, name: &str, table: impl Into<Table>) -> Result<(), DataError> {
        self.check_mutable()?;
        validate_name(name, "peripheral name").map_err(DataError::Value)?;
        self.peripheral.insert(name.to_string(), table.into());
        Ok(())
    }

    pub fn add_subset(&mut self, name: &str, table: impl Into<Table>) -> Result<(), DataError> {
        self.check_mutable()?;
        validate_name(name, "subset name").map_err(DataError::Value)?;

        if self.subsets.contains_key(name) {
            return Err(DataError::Value(format!("Subset '{}' already exists.", name)));
        }

        self.subsets.insert(name.to_string(), table.into());
        Ok(())
    }

    /// Cut subsets out of the population, one boolean mask per subset
    ///
    /// Masks are not checked for overlap; rows matched by no mask belong to
    /// no subset.
    pub fn split<'a>(
        &mut self,
        session: &Session,
        masks: impl IntoIterator<Item = (&'a str, BooleanColumnView)>,
    ) -> Result<(), DataError> {
        let population = self.population.clone().ok_or_else(|| {
            DataError::Value("A container without a population table cannot be split.".to_string())
        })?;

        for (name, mask) in masks {
            let subset = population.where_(session, mask)?.named(&format!("{}_{}", population.name(), name));
            self.add_subset(name, subset)?;
        }

        Ok(())
    }

    /// Split the population at random into subsets of the given fractions
    ///
    /// Fractions must be positive and sum up to at most 1.0.
    pub fn random_split(&mut self, session: &Session, fractions: &[(&str, f64)], seed: u32) -> Result<(), DataError> {
        let total: f64 = fractions.iter().map(|(_, f)| f).sum();

        if fractions.iter().any(|(_, f)| *f <= 0.0) || total > 1.0 + f64::EPSILON {
            return Err(DataError::Value(format!(
                "Split fractions must be positive and sum up to at most 1.0, got {:?}.",
                fractions
            )));
        }

        let draw = random(seed);
        let mut lower = 0.0;

        let masks: Vec<(&str, BooleanColumnView)> = fractions
            .iter()
            .map(|(name, fraction)| {
                let upper = lower + fraction;
                let mask = draw.greater_equal(lower).and(&draw.less(upper));
                lower = upper;
                (*name, mask)
            })
            .collect();

        debug!("Splitting container '{}' into {:?}", self.id, fractions);

        self.split(session, masks)
    }

    /// The subset called `name`, with all peripheral tables
    pub fn subset(&self, name: &str) -> Result<Subset, DataError> {
        let population = self.subsets.get(name).cloned().ok_or_else(|| {
            DataError::Key(format!(
                "Container '{}' has no subset '{}'. Subsets: {:?}.",
                self.id,
                name,
                self.subset_names()
            ))
        })?;

        Ok(Subset {
            container_id: self.id.clone(),
            name: name.to_string(),
            population,
            peripheral: self.peripheral.clone(),
        })
    }

    /// Reject any further change
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn check_mutable(&self) -> Result<(), DataError> {
        if self.frozen {
            return Err(DataError::Value(format!(
                "Container '{}' is frozen and cannot be changed.",
                self.id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container {}", self.id)?;

        if let Some(population) = &self.population {
            writeln!(f, "  population: {}", population.name())?;
        }

        for (name, table) in &self.subsets {
            writeln!(f, "  subset {}: {}", name, table.name())?;
        }

        for (name, table) in &self.peripheral {
            writeln!(f, "  peripheral {}: {}", name, table.name())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, DataFrame, Role, Roles};

    fn loans() -> DataFrame {
        let roles = Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::Numerical, &["amount"])
            .with(Role::Target, &["default"]);

        DataFrame::new("loans", roles).unwrap()
    }

    fn trans() -> DataFrame {
        DataFrame::new("trans", Roles::new().with(Role::JoinKey, &["account_id"])).unwrap()
    }

    #[test]
    fn test_explicit_subsets() {
        let container = Container::empty()
            .with_subset("train", loans())
            .unwrap()
            .with_peripheral("trans", trans())
            .unwrap();

        let train = container.subset("train").unwrap();

        assert_eq!(train.population().name(), "loans");
        assert_eq!(train.peripheral()["trans"].name(), "trans");
        assert_eq!(train.container_id(), container.id());
        assert_eq!(container.id().len(), CONTAINER_ID_LENGTH);
        assert!(matches!(container.subset("test"), Err(DataError::Key(_))));
    }

    #[test]
    fn test_split_with_masks() {
        let session = Session::new("127.0.0.1", 1);
        let df = loans();

        let amount = match df.get_column("amount").unwrap() {
            Column::Float(col) => col,
            other => panic!("expected a float column, got {}", other),
        };

        // Step 1: two masks over the population
        let mut container = Container::new(Table::from(df));
        container
            .split(&session, vec![("large", amount.greater(1000.0)), ("small", amount.less_equal(1000.0))])
            .unwrap();

        // Step 2: every subset is a view on the population
        assert_eq!(container.subset_names(), vec!["large", "small"]);

        let large = container.subset("large").unwrap();
        let cmd = large.population().to_cmd();
        assert_eq!(cmd["type_"], "View");
        assert_eq!(cmd["name_"], "loans_large");
        assert_eq!(cmd["subselection_"]["operator_"], "greater");
    }

    #[test]
    fn test_random_split() {
        let session = Session::new("127.0.0.1", 1);

        let mut container = Container::new(Table::from(loans()));
        container.random_split(&session, &[("train", 0.8), ("test", 0.2)], 5849).unwrap();

        let test = container.subset("test").unwrap().population().to_cmd();
        assert_eq!(test["subselection_"]["operator_"], "and");

        // Fractions beyond 1.0 fail before anything is added
        let mut container = Container::new(Table::from(loans()));
        assert!(container.random_split(&session, &[("train", 0.8), ("test", 0.3)], 1).is_err());
        assert!(container.subset_names().is_empty());
    }

    #[test]
    fn test_frozen_container_rejects_changes() {
        let mut container = Container::empty().with_subset("train", loans()).unwrap();
        container.freeze();

        assert!(container.add_subset("test", loans()).is_err());
        assert!(container.add_peripheral("trans", trans()).is_err());
        assert!(Container::empty().split(&Session::new("127.0.0.1", 1), Vec::new()).is_err());
    }
}
