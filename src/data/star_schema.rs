// Star schemas and time series: a data model and its container built together
// Author: Gabriel Demetrios Lafis

use std::fmt;

use log::debug;

use super::{
    BooleanColumnView, Container, DataError, DataModel, JoinOptions, PlaceholderId, Subset, Table,
};
use crate::comm::Session;

/// A population table with peripheral tables joined directly to it
///
/// Every join adds the table to the container and its placeholder to the
/// data model under the same name, so the container's peripheral tables
/// always match the placeholders a pipeline asks for.
#[derive(Debug, Clone)]
pub struct StarSchema {
    data_model: DataModel,
    container: Container,
}

impl StarSchema {
    /// A star schema around a population table that will be split into subsets
    pub fn new(population: impl Into<Table>, alias: Option<&str>) -> Self {
        let population = population.into();
        let data_model = DataModel::new(population.to_placeholder(alias));

        StarSchema {
            data_model,
            container: Container::new(population),
        }
    }

    /// A star schema over a container whose subsets were passed explicitly
    ///
    /// The population placeholder takes its roles from the container's
    /// population, or from its first subset if there is none.
    pub fn from_container(container: Container, alias: Option<&str>) -> Result<Self, DataError> {
        let population = match container.population() {
            Some(population) => population.clone(),
            None => {
                let first = container
                    .subset_names()
                    .into_iter()
                    .next()
                    .ok_or_else(|| DataError::Value("The container holds no tables.".to_string()))?;
                container.subset(&first)?.population().clone()
            }
        };

        let mut data_model = DataModel::new(population.to_placeholder(alias));

        for (name, table) in container.peripheral() {
            data_model.add(table.to_placeholder(Some(name)));
        }

        Ok(StarSchema { data_model, container })
    }

    pub fn data_model(&self) -> &DataModel {
        &self.data_model
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn population(&self) -> PlaceholderId {
        self.data_model.population()
    }

    /// Join `table` to the population
    ///
    /// Placeholder and peripheral table are named `alias`, or after the
    /// table. A failed join leaves the star schema unchanged.
    pub fn join(
        &mut self,
        table: impl Into<Table>,
        alias: Option<&str>,
        options: JoinOptions,
    ) -> Result<PlaceholderId, DataError> {
        let table = table.into();
        let name = alias.unwrap_or_else(|| table.name()).to_string();

        if let Some(existing) = self.container.peripheral().get(&name) {
            if existing.name() != table.name() {
                return Err(DataError::Value(format!(
                    "The name '{}' is already used by '{}'.",
                    name,
                    existing.name()
                )));
            }
        }

        let mut data_model = self.data_model.clone();
        let placeholder = data_model.add(table.to_placeholder(Some(&name)));
        data_model.join(data_model.population(), placeholder, options)?;

        self.container.add_peripheral(&name, table)?;
        self.data_model = data_model;

        debug!("Joined '{}' to the star schema", name);

        Ok(placeholder)
    }

    /// Cut subsets out of the population; see [`Container::split`]
    pub fn split<'a>(
        &mut self,
        session: &Session,
        masks: impl IntoIterator<Item = (&'a str, BooleanColumnView)>,
    ) -> Result<(), DataError> {
        self.container.split(session, masks)
    }

    /// See [`Container::random_split`]
    pub fn random_split(&mut self, session: &Session, fractions: &[(&str, f64)], seed: u32) -> Result<(), DataError> {
        self.container.random_split(session, fractions, seed)
    }

    pub fn subset(&self, name: &str) -> Result<Subset, DataError> {
        self.container.subset(name)
    }
}

impl fmt::Display for StarSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.data_model, self.container)
    }
}

/// A population table joined to itself along its time stamps
///
/// The population placeholder is called `"population"`; its copy on the
/// peripheral side is named `alias`, or after the table.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    star_schema: StarSchema,
    self_join: PlaceholderId,
}

impl TimeSeries {
    /// `options` must name the time stamps; memory, horizon, lagged targets
    /// and join keys are taken from it as well
    pub fn new(population: impl Into<Table>, alias: Option<&str>, options: JoinOptions) -> Result<Self, DataError> {
        if options.time_stamps.is_none() {
            return Err(DataError::Value("A time series needs time stamps to join on.".to_string()));
        }

        let population = population.into();
        let mut star_schema = StarSchema::new(population.clone(), Some("population"));
        let self_join = star_schema.join(population, alias, options)?;

        Ok(TimeSeries { star_schema, self_join })
    }

    /// The placeholder standing for the population's own past
    pub fn self_join(&self) -> PlaceholderId {
        self.self_join
    }

    /// Join another peripheral table to the population
    pub fn join(
        &mut self,
        table: impl Into<Table>,
        alias: Option<&str>,
        options: JoinOptions,
    ) -> Result<PlaceholderId, DataError> {
        self.star_schema.join(table, alias, options)
    }

    pub fn data_model(&self) -> &DataModel {
        self.star_schema.data_model()
    }

    pub fn container(&self) -> &Container {
        self.star_schema.container()
    }

    pub fn container_mut(&mut self) -> &mut Container {
        self.star_schema.container_mut()
    }

    pub fn subset(&self, name: &str) -> Result<Subset, DataError> {
        self.star_schema.subset(name)
    }

    pub fn into_star_schema(self) -> StarSchema {
        self.star_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataFrame, Role, Roles};
    use serde_json::json;

    fn loans() -> DataFrame {
        let roles = Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::TimeStamp, &["date"])
            .with(Role::Target, &["default"]);

        DataFrame::new("loans", roles).unwrap()
    }

    fn trans() -> DataFrame {
        let roles = Roles::new()
            .with(Role::JoinKey, &["account_id"])
            .with(Role::TimeStamp, &["date"])
            .with(Role::Numerical, &["amount"]);

        DataFrame::new("trans", roles).unwrap()
    }

    #[test]
    fn test_join_keeps_model_and_container_in_step() {
        let mut star_schema = StarSchema::new(loans(), Some("population"));

        // Step 1: the same table twice under different names
        star_schema
            .join(trans(), None, JoinOptions::new().on("account_id").time_stamps("date"))
            .unwrap();
        star_schema
            .join(trans(), Some("recent_trans"), JoinOptions::new().on("account_id").time_stamps("date").memory(86400.0))
            .unwrap();

        // Step 2: placeholders and peripheral tables line up
        assert_eq!(star_schema.data_model().peripheral_names(), vec!["recent_trans", "trans"]);
        let peripheral: Vec<&String> = star_schema.container().peripheral().keys().collect();
        assert_eq!(peripheral, vec!["recent_trans", "trans"]);

        let cmd = star_schema.data_model().to_cmd().unwrap();
        assert_eq!(cmd["name_"], "population");
        assert_eq!(cmd["memory_"], json!([0.0, 86400.0]));
    }

    #[test]
    fn test_failed_join_changes_nothing() {
        let mut star_schema = StarSchema::new(loans(), None);

        assert!(star_schema
            .join(trans(), None, JoinOptions::new().on("customer_id"))
            .is_err());

        assert!(star_schema.data_model().peripheral_names().is_empty());
        assert!(star_schema.container().peripheral().is_empty());

        // A name can only stand for one table
        star_schema.join(trans(), Some("other"), JoinOptions::new().on("account_id")).unwrap();
        assert!(star_schema.join(loans(), Some("other"), JoinOptions::new().on("account_id")).is_err());
    }

    #[test]
    fn test_from_container_with_explicit_subsets() {
        let container = Container::empty()
            .with_subset("train", loans())
            .unwrap()
            .with_peripheral("trans", trans())
            .unwrap();

        let star_schema = StarSchema::from_container(container, None).unwrap();

        assert_eq!(star_schema.data_model().peripheral_names(), vec!["trans"]);
        assert_eq!(star_schema.subset("train").unwrap().population().name(), "loans");
        assert!(StarSchema::from_container(Container::empty(), None).is_err());
    }

    #[test]
    fn test_time_series_joins_population_to_itself() {
        let ts = TimeSeries::new(
            loans(),
            None,
            JoinOptions::new().on("account_id").time_stamps("date").horizon(86400.0).lagged_targets(true),
        )
        .unwrap();

        let cmd = ts.data_model().to_cmd().unwrap();
        assert_eq!(cmd["name_"], "population");
        assert_eq!(cmd["joined_tables_"][0]["name_"], "loans");
        assert_eq!(cmd["allow_lagged_targets_"], json!([true]));
        assert_eq!(ts.container().peripheral()["loans"].name(), "loans");

        assert!(TimeSeries::new(loans(), None, JoinOptions::new().on("account_id")).is_err());
    }
}
