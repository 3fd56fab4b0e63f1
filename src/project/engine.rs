// Contents of the project the engine currently serves
// Author: Gabriel Demetrios Lafis

use log::info;
use serde::Deserialize;
use serde_json::json;

use super::ProjectError;
use crate::comm::{Session, SUCCESS};
use crate::data::{DataFrame, Roles};
use crate::pipeline::delete_pipeline;

/// Data frames held in memory and saved to the project folder
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DataFrameListing {
    #[serde(default)]
    pub in_memory: Vec<String>,
    #[serde(default)]
    pub on_disk: Vec<String>,
}

impl DataFrameListing {
    pub fn exists_in_memory(&self, name: &str) -> bool {
        self.in_memory.iter().any(|df| df == name)
    }

    pub fn exists_on_disk(&self, name: &str) -> bool {
        self.on_disk.iter().any(|df| df == name)
    }

    /// Saved data frames that are not loaded
    pub fn not_loaded(&self) -> Vec<String> {
        self.on_disk
            .iter()
            .filter(|df| !self.exists_in_memory(df))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PipelineListing {
    #[serde(default)]
    names: Vec<String>,
}

/// List the data frames of the current project
pub fn list_data_frames(session: &Session) -> Result<DataFrameListing, ProjectError> {
    let mut sock = session.send_and_expect(&json!({ "type_": "list_data_frames", "name_": "" }), SUCCESS)?;
    let listing = sock.recv_string()?;

    Ok(serde_json::from_str(&listing)?)
}

/// List the ids of the pipelines of the current project
pub fn list_pipelines(session: &Session) -> Result<Vec<String>, ProjectError> {
    let mut sock = session.send_and_expect(&json!({ "type_": "list_pipelines", "name_": "" }), SUCCESS)?;
    let listing: PipelineListing = serde_json::from_str(&sock.recv_string()?)?;

    Ok(listing.names)
}

pub fn exists_in_memory(session: &Session, name: &str) -> Result<bool, ProjectError> {
    Ok(list_data_frames(session)?.exists_in_memory(name))
}

/// Delete a data frame; with `mem_only` it stays on disk
pub fn delete_data_frame(session: &Session, name: &str, mem_only: bool) -> Result<(), ProjectError> {
    DataFrame::new(name, Roles::new())?.delete(session, mem_only)?;
    info!("Deleted data frame '{}'", name);
    Ok(())
}

/// Load a saved data frame into memory
pub fn load_data_frame(session: &Session, name: &str) -> Result<DataFrame, ProjectError> {
    let mut df = DataFrame::new(name, Roles::new())?;

    if exists_in_memory(session, name)? {
        df.refresh(session)?;
    } else {
        df.load(session)?;
    }

    Ok(df)
}

/// Delete every pipeline of the current project
pub fn delete_all_pipelines(session: &Session, mem_only: bool) -> Result<(), ProjectError> {
    for id in list_pipelines(session)? {
        delete_pipeline(session, &id, mem_only)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing() {
        let listing: DataFrameListing =
            serde_json::from_str(r#"{"in_memory": ["loans"], "on_disk": ["loans", "trans"]}"#).unwrap();

        assert!(listing.exists_in_memory("loans"));
        assert!(!listing.exists_in_memory("trans"));
        assert!(listing.exists_on_disk("trans"));
        assert_eq!(listing.not_loaded(), vec!["trans"]);
    }
}
