// Placeholders and the join graph between them
// Author: Gabriel Demetrios Lafis

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value as JsonValue};

use super::{DataError, Roles};
use crate::utils::validate_non_negative;

/// Join key used when everything is joined to everything
pub const NO_JOIN_KEY: &str = "$GETML_NO_JOIN_KEY";

/// Opens a list of join keys encoded into a single string
pub const MULTIPLE_JOIN_KEYS_BEGIN: &str = "$GETML_MULTIPLE_JOIN_KEYS_BEGIN";

/// Separates the keys of a multi-key join
pub const JOIN_KEY_SEP: &str = "$GETML_JOIN_KEY_SEP";

/// Closes a list of join keys encoded into a single string
pub const MULTIPLE_JOIN_KEYS_END: &str = "$GETML_MULTIPLE_JOIN_KEYS_END";

/// How rows of the joined table relate to rows of the parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Relationship {
    #[default]
    ManyToMany,
    ManyToOne,
    OneToMany,
    OneToOne,
    /// Always handled by a propositionalization algorithm
    Propositionalization,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::ManyToMany => "many-to-many",
            Relationship::ManyToOne => "many-to-one",
            Relationship::OneToMany => "one-to-many",
            Relationship::OneToOne => "one-to-one",
            Relationship::Propositionalization => "propositionalization",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "many-to-many" => Ok(Relationship::ManyToMany),
            "many-to-one" => Ok(Relationship::ManyToOne),
            "one-to-many" => Ok(Relationship::OneToMany),
            "one-to-one" => Ok(Relationship::OneToOne),
            "propositionalization" => Ok(Relationship::Propositionalization),
            _ => Err(DataError::Value(format!("Unknown relationship '{}'.", s))),
        }
    }
}

/// A schema-only stand-in for a table
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    name: String,
    roles: Roles,
}

impl Placeholder {
    /// Create a new placeholder
    pub fn new(name: &str, roles: Roles) -> Self {
        Placeholder {
            name: name.to_string(),
            roles,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: Roles) {
        self.roles = roles;
    }

    /// Column names in bucket order
    pub fn columns(&self) -> Vec<String> {
        self.roles.columns()
    }

    /// The name of a column, if the placeholder has it
    pub fn get<'a>(&self, key: &'a str) -> Result<&'a str, DataError> {
        if self.roles.contains(key) {
            Ok(key)
        } else {
            Err(DataError::Key(format!(
                "No column with name '{}' on the Placeholder's signature.",
                key
            )))
        }
    }
}

/// Handle to a placeholder inside a [`PlaceholderGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId(usize);

impl PlaceholderId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Parameters of a join
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOptions {
    /// Pairs of (parent key, joined key); empty joins everything
    pub on: Vec<(String, String)>,
    /// (parent time stamp, joined time stamp)
    pub time_stamps: Option<(String, String)>,
    pub upper_time_stamp: Option<String>,
    pub relationship: Relationship,
    /// Look-back window in seconds
    pub memory: Option<f64>,
    /// Prediction horizon in seconds
    pub horizon: Option<f64>,
    pub lagged_targets: bool,
}

impl JoinOptions {
    pub fn new() -> Self {
        JoinOptions::default()
    }

    /// Join on a key that has the same name on both sides
    pub fn on(self, key: &str) -> Self {
        self.on_pair(key, key)
    }

    pub fn on_pair(mut self, left: &str, right: &str) -> Self {
        self.on.push((left.to_string(), right.to_string()));
        self
    }

    /// Limit the join with a time stamp that has the same name on both sides
    pub fn time_stamps(self, time_stamp: &str) -> Self {
        self.time_stamp_pair(time_stamp, time_stamp)
    }

    pub fn time_stamp_pair(mut self, left: &str, right: &str) -> Self {
        self.time_stamps = Some((left.to_string(), right.to_string()));
        self
    }

    pub fn upper_time_stamp(mut self, upper_time_stamp: &str) -> Self {
        self.upper_time_stamp = Some(upper_time_stamp.to_string());
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationship = relationship;
        self
    }

    pub fn memory(mut self, memory: f64) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn lagged_targets(mut self, lagged_targets: bool) -> Self {
        self.lagged_targets = lagged_targets;
        self
    }

    fn window_is_set(window: Option<f64>) -> bool {
        window.map_or(false, |w| w != 0.0)
    }
}

/// An edge from a parent placeholder to a joined one
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub right: PlaceholderId,
    pub options: JoinOptions,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    placeholder: Placeholder,
    joins: Vec<Join>,
    parent: Option<PlaceholderId>,
}

/// Arena holding placeholders and the joins between them
///
/// The parent of a placeholder is the placeholder it was last joined to. It
/// is kept for reporting only: the graph owns every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderGraph {
    nodes: Vec<Node>,
}

impl PlaceholderGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        PlaceholderGraph::default()
    }

    pub fn add(&mut self, placeholder: Placeholder) -> PlaceholderId {
        self.nodes.push(Node {
            placeholder,
            joins: Vec::new(),
            parent: None,
        });
        PlaceholderId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: PlaceholderId) -> Result<&Node, DataError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| DataError::Key(format!("No placeholder with id {} in this graph.", id.0)))
    }

    fn node_mut(&mut self, id: PlaceholderId) -> Result<&mut Node, DataError> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| DataError::Key(format!("No placeholder with id {} in this graph.", id.0)))
    }

    pub fn placeholder(&self, id: PlaceholderId) -> Result<&Placeholder, DataError> {
        Ok(&self.node(id)?.placeholder)
    }

    pub fn joins(&self, id: PlaceholderId) -> Result<&[Join], DataError> {
        Ok(&self.node(id)?.joins)
    }

    pub fn parent(&self, id: PlaceholderId) -> Result<Option<PlaceholderId>, DataError> {
        Ok(self.node(id)?.parent)
    }

    /// The root of the join tree `id` belongs to
    pub fn population(&self, id: PlaceholderId) -> Result<PlaceholderId, DataError> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// `id` followed by all of its descendants, depth first
    pub fn to_list(&self, id: PlaceholderId) -> Result<Vec<PlaceholderId>, DataError> {
        let mut list = vec![id];
        for join in &self.node(id)?.joins {
            list.extend(self.to_list(join.right)?);
        }
        Ok(list)
    }

    /// All descendants of `id`
    pub fn children(&self, id: PlaceholderId) -> Result<Vec<PlaceholderId>, DataError> {
        Ok(self.to_list(id)?.into_iter().filter(|c| *c != id).collect())
    }

    /// Join `right` to `left`
    ///
    /// Rejects cycles, keys and time stamps without the matching role, lagged
    /// targets without a horizon, windows without time stamps and joins that
    /// already exist with the same parameters.
    pub fn join(&mut self, left: PlaceholderId, right: PlaceholderId, options: JoinOptions) -> Result<(), DataError> {
        if self.to_list(right)?.contains(&left) {
            return Err(DataError::Value(
                "Circular references to other placeholders are not allowed.".to_string(),
            ));
        }

        if let Some(memory) = options.memory {
            validate_non_negative(memory, "memory").map_err(DataError::Value)?;
        }
        if let Some(horizon) = options.horizon {
            validate_non_negative(horizon, "horizon").map_err(DataError::Value)?;
        }

        let sides = [
            self.placeholder(left)?.roles(),
            self.placeholder(right)?.roles(),
        ];

        for (i, roles) in sides.iter().enumerate() {
            if !roles.join_key.is_empty() && !options.on.is_empty() {
                let not_a_join_key: Vec<&str> = options
                    .on
                    .iter()
                    .map(|pair| if i == 0 { pair.0.as_str() } else { pair.1.as_str() })
                    .filter(|key| !roles.join_key.iter().any(|jk| jk == key))
                    .collect();

                if !not_a_join_key.is_empty() {
                    return Err(DataError::Value(format!("Not a join key: {}.", not_a_join_key.join(", "))));
                }
            }

            if let Some((left_ts, right_ts)) = &options.time_stamps {
                let ts = if i == 0 { left_ts } else { right_ts };
                if !roles.time_stamp.is_empty() && !roles.time_stamp.contains(ts) {
                    return Err(DataError::Value(format!("Not a time stamp: {}.", ts)));
                }
            }
        }

        if options.lagged_targets && !JoinOptions::window_is_set(options.horizon) {
            return Err(DataError::Value(
                "If you allow lagged targets, then you must also set a horizon > 0.0. \
                 This is to avoid 'easter eggs'."
                    .to_string(),
            ));
        }

        if JoinOptions::window_is_set(options.horizon) && options.time_stamps.is_none() {
            return Err(DataError::Value(
                "Setting 'horizon' (i.e. a relative look-back window) requires a 'time_stamp'.".to_string(),
            ));
        }

        if JoinOptions::window_is_set(options.memory) && options.time_stamps.is_none() {
            return Err(DataError::Value(
                "Setting 'memory' (i.e. a relative look-back window) requires a 'time_stamp'.".to_string(),
            ));
        }

        let join = Join { right, options };

        if self.node(left)?.joins.contains(&join) {
            return Err(DataError::Value(format!(
                "A join with the following set of parameters already exists on the placeholder '{}':\n\n{:?}\n\n\
                 Redundant joins are not allowed.",
                self.placeholder(left)?.name(),
                join.options
            )));
        }

        self.node_mut(left)?.joins.push(join);
        self.node_mut(right)?.parent = Some(left);

        Ok(())
    }

    /// The command describing `id` and everything joined to it
    pub fn to_cmd(&self, id: PlaceholderId) -> Result<JsonValue, DataError> {
        let node = self.node(id)?;
        let joins = &node.joins;

        let (join_keys, other_join_keys): (Vec<String>, Vec<String>) =
            joins.iter().map(|j| encode_join_keys(&j.options.on)).unzip();

        let (time_stamps, other_time_stamps): (Vec<String>, Vec<String>) = joins
            .iter()
            .map(|j| j.options.time_stamps.clone().unwrap_or_default())
            .unzip();

        let joined_tables = joins
            .iter()
            .map(|j| self.to_cmd(j.right))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({
            "name_": node.placeholder.name(),
            "roles_": node.placeholder.roles().to_json(),
            "allow_lagged_targets_": joins.iter().map(|j| j.options.lagged_targets).collect::<Vec<_>>(),
            "horizon_": joins.iter().map(|j| j.options.horizon.unwrap_or(0.0)).collect::<Vec<_>>(),
            "join_keys_used_": join_keys,
            "joined_tables_": joined_tables,
            "memory_": joins.iter().map(|j| j.options.memory.unwrap_or(0.0)).collect::<Vec<_>>(),
            "other_join_keys_used_": other_join_keys,
            "other_time_stamps_used_": other_time_stamps,
            "relationship_": joins.iter().map(|j| j.options.relationship.as_str()).collect::<Vec<_>>(),
            "time_stamps_used_": time_stamps,
            "upper_time_stamps_used_": joins
                .iter()
                .map(|j| j.options.upper_time_stamp.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
        }))
    }

    /// Rebuild a join tree from its command; returns the graph and the root
    pub fn from_cmd(cmd: &JsonValue) -> Result<(PlaceholderGraph, PlaceholderId), DataError> {
        let mut graph = PlaceholderGraph::new();
        let root = graph.decode(cmd)?;
        Ok((graph, root))
    }

    fn decode(&mut self, cmd: &JsonValue) -> Result<PlaceholderId, DataError> {
        let name = cmd
            .get("name_")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| DataError::Parse("Placeholder without 'name_'".to_string()))?;

        let roles = match cmd.get("roles_") {
            Some(roles) => Roles::from_json(roles)?,
            None => Roles::new(),
        };

        let id = self.add(Placeholder::new(name, roles));

        let joined = field(cmd, "joined_tables_");

        for (i, child) in joined.iter().enumerate() {
            let right = self.decode(child)?;

            let on = decode_join_keys(
                string_at(cmd, "join_keys_used_", i),
                string_at(cmd, "other_join_keys_used_", i),
            )?;

            let time_stamps = match (
                string_at(cmd, "time_stamps_used_", i),
                string_at(cmd, "other_time_stamps_used_", i),
            ) {
                ("", "") => None,
                (left, right) => Some((left.to_string(), right.to_string())),
            };

            let upper_time_stamp = match string_at(cmd, "upper_time_stamps_used_", i) {
                "" => None,
                upper => Some(upper.to_string()),
            };

            let relationship = match string_at(cmd, "relationship_", i) {
                "" => Relationship::default(),
                other => other.parse()?,
            };

            let window = |key: &str| {
                field(cmd, key)
                    .get(i)
                    .and_then(JsonValue::as_f64)
                    .filter(|w| *w != 0.0)
            };

            let options = JoinOptions {
                on,
                time_stamps,
                upper_time_stamp,
                relationship,
                memory: window("memory_"),
                horizon: window("horizon_"),
                lagged_targets: field(cmd, "allow_lagged_targets_")
                    .get(i)
                    .and_then(JsonValue::as_bool)
                    .unwrap_or(false),
            };

            self.node_mut(id)?.joins.push(Join { right, options });
            self.node_mut(right)?.parent = Some(id);
        }

        Ok(id)
    }

    /// A readable summary of `id` and its joins
    pub fn describe(&self, id: PlaceholderId) -> Result<String, DataError> {
        let node = self.node(id)?;
        let placeholder = &node.placeholder;

        let mut out = format!("{}:\n  columns:\n", placeholder.name());

        let columns = placeholder.columns();
        let roles = placeholder.roles().to_list();

        for (col, role) in columns.iter().zip(roles.iter()).take(5) {
            out.push_str(&format!("  - {}: {}\n", col, role));
        }
        if columns.len() > 5 {
            out.push_str("  - ...\n");
        }

        if !node.joins.is_empty() {
            out.push_str("\n  joins:\n");
        }

        for join in &node.joins {
            let right = self.placeholder(join.right)?.name();
            let options = &join.options;

            out.push_str(&format!("  - right: '{}'\n", right));

            for (l, r) in &options.on {
                out.push_str(&format!("    on: ({}.{}, {}.{})\n", placeholder.name(), l, right, r));
            }
            if let Some((l, r)) = &options.time_stamps {
                out.push_str(&format!("    time_stamps: ({}.{}, {}.{})\n", placeholder.name(), l, right, r));
            }
            if let Some(upper) = &options.upper_time_stamp {
                out.push_str(&format!("    upper_time_stamp: '{}'\n", upper));
            }
            out.push_str(&format!("    relationship: '{}'\n", options.relationship));
            if let Some(memory) = options.memory {
                out.push_str(&format!("    memory: {}\n", memory));
            }
            if let Some(horizon) = options.horizon {
                out.push_str(&format!("    horizon: {}\n", horizon));
            }
            if options.lagged_targets {
                out.push_str("    lagged_targets: true\n");
            }
        }

        Ok(out)
    }
}

fn field<'a>(cmd: &'a JsonValue, key: &str) -> &'a [JsonValue] {
    cmd.get(key)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_at<'a>(cmd: &'a JsonValue, key: &str, i: usize) -> &'a str {
    field(cmd, key).get(i).and_then(JsonValue::as_str).unwrap_or("")
}

/// Encode join key pairs into the engine's (left, right) strings
pub fn encode_join_keys(on: &[(String, String)]) -> (String, String) {
    match on {
        [] => (NO_JOIN_KEY.to_string(), NO_JOIN_KEY.to_string()),
        [(left, right)] => (left.clone(), right.clone()),
        pairs => {
            let encode = |keys: Vec<&str>| {
                format!(
                    "{}{}{}",
                    MULTIPLE_JOIN_KEYS_BEGIN,
                    keys.join(JOIN_KEY_SEP),
                    MULTIPLE_JOIN_KEYS_END
                )
            };

            (
                encode(pairs.iter().map(|p| p.0.as_str()).collect()),
                encode(pairs.iter().map(|p| p.1.as_str()).collect()),
            )
        }
    }
}

fn split_join_keys(encoded: &str) -> Vec<String> {
    if encoded.is_empty() || encoded == NO_JOIN_KEY {
        return Vec::new();
    }

    match encoded
        .strip_prefix(MULTIPLE_JOIN_KEYS_BEGIN)
        .and_then(|s| s.strip_suffix(MULTIPLE_JOIN_KEYS_END))
    {
        Some(inner) => inner.split(JOIN_KEY_SEP).map(str::to_string).collect(),
        None => vec![encoded.to_string()],
    }
}

/// Decode the engine's (left, right) strings into join key pairs
pub fn decode_join_keys(left: &str, right: &str) -> Result<Vec<(String, String)>, DataError> {
    let left = split_join_keys(left);
    let right = split_join_keys(right);

    if left.len() != right.len() {
        return Err(DataError::Parse(format!(
            "Join uses {} keys on the left and {} on the right",
            left.len(),
            right.len()
        )));
    }

    Ok(left.into_iter().zip(right).collect())
}
