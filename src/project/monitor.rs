// Commands sent to the monitor, which starts and stops the engine of each project
// Author: Gabriel Demetrios Lafis

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde_json::{json, Value as JsonValue};

use super::ProjectError;
use crate::comm::{CommError, EngineSocket, Session, SUCCESS};
use crate::utils::validate_name;

/// How often `shutdown` checks whether the monitor has gone away
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How many times `shutdown` checks before giving up
const SHUTDOWN_POLL_ATTEMPTS: usize = 100;

/// Consume the log loop and require `"Success!"`
fn expect_success_after_log(sock: &mut EngineSocket) -> Result<(), ProjectError> {
    let msg = sock.log_loop()?;

    if msg != SUCCESS {
        return Err(CommError::Engine(msg).into());
    }

    Ok(())
}

fn recv_port(sock: &mut EngineSocket) -> Result<u16, ProjectError> {
    let port = sock.recv_string()?;

    port.trim()
        .parse()
        .map_err(|_| CommError::Protocol(format!("Invalid engine port '{}'", port)).into())
}

fn recv_projects(mut sock: EngineSocket) -> Result<Vec<String>, ProjectError> {
    sock.expect_success()?;
    let obj = sock.recv_json()?;

    Ok(obj
        .get("projects")
        .and_then(JsonValue::as_array)
        .map(|projects| projects.iter().filter_map(JsonValue::as_str).map(str::to_string).collect())
        .unwrap_or_default())
}

/// Version of the engine the monitor manages
pub fn engine_version(session: &Session) -> Result<String, ProjectError> {
    let mut sock = session.send_monitor("getversion", json!(""))?;
    Ok(sock.recv_string()?)
}

/// Switch to a project, creating it if necessary
///
/// Returns a session pointing at the engine that serves the project.
pub fn set_project(session: &Session, name: &str) -> Result<Session, ProjectError> {
    validate_name(name, "project name")?;

    let version = engine_version(session)?;
    debug!("Engine version: {}", version);

    let mut sock = session.send_monitor("setproject", json!(name))?;
    expect_success_after_log(&mut sock)?;

    let port = recv_port(&mut sock)?;
    info!("Connected to project '{}' on port {}", name, port);

    Ok(session.with_port(port))
}

/// Restart the engine of a project, dropping everything held in memory
pub fn restart_project(session: &Session, name: &str) -> Result<Session, ProjectError> {
    validate_name(name, "project name")?;

    let mut sock = session.send_monitor("restartproject", json!(name))?;
    expect_success_after_log(&mut sock)?;

    let port = recv_port(&mut sock)?;
    info!("Restarted project '{}' on port {}", name, port);

    Ok(session.with_port(port))
}

/// All projects known to the monitor
pub fn list_projects(session: &Session) -> Result<Vec<String>, ProjectError> {
    recv_projects(session.send_monitor("listallprojects", json!(""))?)
}

/// Projects whose engine is currently running
pub fn list_running_projects(session: &Session) -> Result<Vec<String>, ProjectError> {
    recv_projects(session.send_monitor("listrunningprojects", json!(""))?)
}

/// Stop the engine of a project; saved data stays on disk
pub fn suspend_project(session: &Session, name: &str) -> Result<(), ProjectError> {
    let mut sock = session.send_monitor("suspendproject", json!(name))?;
    sock.expect_success()?;
    Ok(())
}

/// Delete a project and all of its data
pub fn delete_project(session: &Session, name: &str) -> Result<(), ProjectError> {
    if list_running_projects(session)?.iter().any(|project| project == name) {
        suspend_project(session, name)?;
    }

    let mut sock = session.send_monitor("deleteproject", json!(name))?;
    sock.expect_success()?;

    info!("Deleted project '{}'", name);

    Ok(())
}

/// Options for bundling a project into a single file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveOptions {
    /// Name of the bundle; the project name when unset
    pub file_name: Option<String>,
    /// Directory the bundle is written to; the working directory when unset
    pub target_path: Option<PathBuf>,
    pub replace: bool,
}

impl SaveOptions {
    pub fn new() -> Self {
        SaveOptions {
            replace: true,
            ..SaveOptions::default()
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self
    }

    pub fn with_target_path<P: AsRef<Path>>(mut self, target_path: P) -> Self {
        self.target_path = Some(target_path.as_ref().to_path_buf());
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ProjectError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Bundle a project into a single file and return the bundle's path
pub fn save_project(session: &Session, name: &str, options: &SaveOptions) -> Result<PathBuf, ProjectError> {
    let target_path = match &options.target_path {
        Some(path) => absolute(path)?,
        None => std::env::current_dir()?,
    };

    let body = json!({
        "name_": name,
        "file_name_": options.file_name.as_deref().unwrap_or(name),
        "target_path_": target_path.to_string_lossy(),
        "replace_": options.replace,
    });

    let mut sock = session.send_monitor("saveproject", body)?;
    expect_success_after_log(&mut sock)?;

    let bundle = sock.recv_string()?;
    info!("Saved project '{}' to {}", name, bundle);

    Ok(PathBuf::from(bundle))
}

/// Load a bundled project; an empty `name` keeps the name stored in the bundle
///
/// Returns a session pointing at the engine that serves the loaded project.
pub fn load_project<P: AsRef<Path>>(session: &Session, bundle: P, name: &str) -> Result<Session, ProjectError> {
    let bundle = absolute(bundle.as_ref())?;

    if !bundle.exists() {
        return Err(ProjectError::InvalidArgument(format!(
            "No project bundle at '{}'",
            bundle.display()
        )));
    }

    let body = json!({ "bundle_": bundle.to_string_lossy(), "name_": name });

    let mut sock = session.send_monitor("loadproject", body)?;
    expect_success_after_log(&mut sock)?;

    let port = recv_port(&mut sock)?;
    info!("Loaded project from {} on port {}", bundle.display(), port);

    Ok(session.with_port(port))
}

/// Shut the monitor and every engine down, then wait until the monitor is gone
pub fn shutdown(session: &Session) -> Result<(), ProjectError> {
    session.send_monitor("shutdownlocal", json!(""))?;

    for _ in 0..SHUTDOWN_POLL_ATTEMPTS {
        if !session.is_monitor_alive() {
            info!("The engine has been shut down");
            return Ok(());
        }
        thread::sleep(SHUTDOWN_POLL_INTERVAL);
    }

    Err(CommError::Protocol("The monitor is still running after the shutdown command".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_options() {
        let options = SaveOptions::new();

        assert!(options.replace);
        assert!(options.file_name.is_none());

        let options = options.with_file_name("bundle").with_replace(false);
        assert_eq!(options.file_name.as_deref(), Some("bundle"));
        assert!(!options.replace);
    }

    #[test]
    fn test_load_project_requires_existing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::default();

        let result = load_project(&session, dir.path().join("missing.getml"), "");

        assert!(matches!(result, Err(ProjectError::InvalidArgument(_))));
    }

    #[test]
    fn test_set_project_validates_name() {
        let session = Session::default();

        assert!(matches!(set_project(&session, ""), Err(ProjectError::InvalidArgument(_))));
    }
}
