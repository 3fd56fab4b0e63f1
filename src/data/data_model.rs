// Data model: a population placeholder and its peripheral tables
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as JsonValue};

use super::{DataError, JoinOptions, Placeholder, PlaceholderGraph, PlaceholderId, Roles};

/// Describes how the population table relates to peripheral tables
///
/// Peripheral placeholders are grouped by name; adding two placeholders
/// with the same name keeps both under that name.
#[derive(Debug, Clone, PartialEq)]
pub struct DataModel {
    graph: PlaceholderGraph,
    population: PlaceholderId,
    peripheral: BTreeMap<String, Vec<PlaceholderId>>,
}

impl DataModel {
    /// Create a new data model around its population placeholder
    pub fn new(population: Placeholder) -> Self {
        let mut graph = PlaceholderGraph::new();
        let population = graph.add(population);

        DataModel {
            graph,
            population,
            peripheral: BTreeMap::new(),
        }
    }

    /// A data model whose population has no columns yet
    pub fn from_name(name: &str) -> Self {
        DataModel::new(Placeholder::new(name, Roles::new()))
    }

    /// Add a peripheral placeholder
    pub fn add(&mut self, placeholder: Placeholder) -> PlaceholderId {
        let name = placeholder.name().to_string();
        let id = self.graph.add(placeholder);
        self.peripheral.entry(name).or_default().push(id);
        id
    }

    /// Add several peripheral placeholders
    pub fn add_all(&mut self, placeholders: impl IntoIterator<Item = Placeholder>) -> Vec<PlaceholderId> {
        placeholders.into_iter().map(|ph| self.add(ph)).collect()
    }

    pub fn population(&self) -> PlaceholderId {
        self.population
    }

    pub fn graph(&self) -> &PlaceholderGraph {
        &self.graph
    }

    pub fn placeholder(&self, id: PlaceholderId) -> Result<&Placeholder, DataError> {
        self.graph.placeholder(id)
    }

    /// Placeholders by name; `"population"` always refers to the population
    pub fn get(&self, key: &str) -> Result<Vec<PlaceholderId>, DataError> {
        if key == "population" || key == self.graph.placeholder(self.population)?.name() {
            return Ok(vec![self.population]);
        }

        self.peripheral
            .get(key)
            .cloned()
            .ok_or_else(|| DataError::Key(format!("No placeholder called '{}' in the data model.", key)))
    }

    /// The single placeholder with this name
    pub fn get_one(&self, key: &str) -> Result<PlaceholderId, DataError> {
        match self.get(key)?.as_slice() {
            [id] => Ok(*id),
            ids => Err(DataError::Key(format!(
                "There are {} placeholders called '{}'. Use get() to pick one.",
                ids.len(),
                key
            ))),
        }
    }

    /// Join `right` to `left`; see [`PlaceholderGraph::join`]
    pub fn join(&mut self, left: PlaceholderId, right: PlaceholderId, options: JoinOptions) -> Result<(), DataError> {
        self.graph.join(left, right, options)
    }

    /// The root of the join tree `id` belongs to
    pub fn population_of(&self, id: PlaceholderId) -> Result<PlaceholderId, DataError> {
        self.graph.population(id)
    }

    /// Names of the population (twice, under its own name and as
    /// `"population"`) followed by the peripheral names
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.peripheral.len() + 2);

        if let Ok(population) = self.graph.placeholder(self.population) {
            names.push(population.name().to_string());
        }

        names.push("population".to_string());
        names.extend(self.peripheral.keys().cloned());
        names
    }

    pub fn peripheral_names(&self) -> Vec<String> {
        self.peripheral.keys().cloned().collect()
    }

    /// The population command plus `peripheral_`
    pub fn to_cmd(&self) -> Result<JsonValue, DataError> {
        let mut cmd = self.graph.to_cmd(self.population)?;

        let mut peripheral = Map::new();

        for (name, ids) in &self.peripheral {
            let entry = match ids.as_slice() {
                [id] => self.graph.to_cmd(*id)?,
                ids => JsonValue::Array(
                    ids.iter()
                        .map(|id| self.graph.to_cmd(*id))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            peripheral.insert(name.clone(), entry);
        }

        cmd["peripheral_"] = JsonValue::Object(peripheral);

        Ok(cmd)
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ids = self.graph.to_list(self.population).map_err(|_| fmt::Error)?;

        let parts = ids
            .into_iter()
            .map(|id| self.graph.describe(id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| fmt::Error)?;

        write!(f, "{}", parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;
    use serde_json::json;

    fn model() -> DataModel {
        let roles = Roles::new()
            .with(Role::JoinKey, &["id"])
            .with(Role::TimeStamp, &["date"]);

        DataModel::new(Placeholder::new("loans", roles))
    }

    #[test]
    fn test_duplicate_names_are_grouped() {
        let mut dm = model();

        let first = dm.add(Placeholder::new("trans", Roles::new()));
        let second = dm.add(Placeholder::new("trans", Roles::new()));

        assert_eq!(dm.get("trans").unwrap(), vec![first, second]);
        assert!(dm.get_one("trans").is_err());
        assert_eq!(dm.get("population").unwrap(), vec![dm.population()]);
        assert_eq!(dm.get("loans").unwrap(), vec![dm.population()]);
        assert_eq!(dm.names(), vec!["loans", "population", "trans"]);

        let cmd = dm.to_cmd().unwrap();
        assert_eq!(cmd["peripheral_"]["trans"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_cmd_carries_joins() {
        let mut dm = model();
        let meta = dm.add(Placeholder::new("meta", Roles::new().with(Role::JoinKey, &["id"])));

        dm.join(dm.population(), meta, JoinOptions::new().on("id")).unwrap();

        let cmd = dm.to_cmd().unwrap();

        assert_eq!(cmd["name_"], "loans");
        assert_eq!(cmd["join_keys_used_"], json!(["id"]));
        assert_eq!(cmd["joined_tables_"][0]["name_"], "meta");
        assert_eq!(cmd["peripheral_"]["meta"]["name_"], "meta");
        assert_eq!(dm.population_of(meta).unwrap(), dm.population());
        assert!(dm.to_string().contains("right: 'meta'"));
    }
}
