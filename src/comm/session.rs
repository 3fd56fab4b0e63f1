// Explicit connection context for the engine
// Author: Gabriel Demetrios Lafis

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use serde_json::{json, Value as JsonValue};

use super::{CommError, EngineSocket, DEFAULT_MONITOR_PORT, DEFAULT_PORT, SUCCESS};

/// Where the engine of the current project listens
///
/// Every remote operation takes a `&Session`. Each call opens its own
/// connection, so a session can be cloned and reused freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    host: String,
    port: u16,
    monitor_port: u16,
    timeout: Option<Duration>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new("localhost", DEFAULT_PORT)
    }
}

impl Session {
    /// Create a new session
    pub fn new(host: &str, port: u16) -> Self {
        Session {
            host: host.to_string(),
            port,
            monitor_port: DEFAULT_MONITOR_PORT,
            timeout: None,
        }
    }

    /// Set the port of the monitor
    pub fn with_monitor_port(mut self, monitor_port: u16) -> Self {
        self.monitor_port = monitor_port;
        self
    }

    /// Set the read and write timeout of every connection
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Point the session at another engine port, keeping host and monitor
    pub fn with_port(&self, port: u16) -> Self {
        Session {
            port,
            ..self.clone()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn monitor_port(&self) -> u16 {
        self.monitor_port
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Open a connection to the engine
    pub fn connect(&self) -> Result<EngineSocket, CommError> {
        self.connect_to(self.port)
    }

    /// Open a connection to the monitor
    pub fn connect_monitor(&self) -> Result<EngineSocket, CommError> {
        self.connect_to(self.monitor_port)
    }

    fn connect_to(&self, port: u16) -> Result<EngineSocket, CommError> {
        let address = format!("{}:{}", self.host, port);

        let addrs = address
            .to_socket_addrs()
            .map_err(|_| CommError::Connection(address.clone()))?;

        let mut last_error = None;

        for addr in addrs {
            let attempt = match self.timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => {
                    stream.set_read_timeout(self.timeout)?;
                    stream.set_write_timeout(self.timeout)?;
                    stream.set_nodelay(true)?;
                    return EngineSocket::new(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        if let Some(e) = last_error {
            debug!("Connecting to {} failed: {}", address, e);
        }

        Err(CommError::Connection(address))
    }

    /// Send a command and require `"Success!"`
    pub fn send(&self, cmd: &JsonValue) -> Result<(), CommError> {
        self.send_and_expect(cmd, SUCCESS).map(|_| ())
    }

    /// Send a command and return the open socket for the reply
    pub fn send_and_get_socket(&self, cmd: &JsonValue) -> Result<EngineSocket, CommError> {
        log_cmd(cmd);

        let mut sock = self.connect()?;
        sock.send_json(cmd)?;

        Ok(sock)
    }

    /// Send a command and require the first reply to equal `token`
    pub fn send_and_expect(&self, cmd: &JsonValue, token: &str) -> Result<EngineSocket, CommError> {
        let mut sock = self.send_and_get_socket(cmd)?;
        sock.expect(token)?;
        Ok(sock)
    }

    /// Send a `type_`/`body_` command to the monitor and return the open socket
    pub fn send_monitor(&self, type_: &str, body: JsonValue) -> Result<EngineSocket, CommError> {
        debug!("Sending '{}' to the monitor", type_);

        let mut sock = self.connect_monitor()?;
        sock.send_json(&json!({ "type_": type_, "body_": body }))?;

        Ok(sock)
    }

    /// Whether the engine accepts connections
    pub fn is_alive(&self) -> bool {
        self.connect().is_ok()
    }

    /// Whether the monitor accepts connections
    pub fn is_monitor_alive(&self) -> bool {
        self.connect_monitor().is_ok()
    }

    /// Name of the project the engine is running
    pub fn project_name(&self) -> Result<String, CommError> {
        let mut sock = self.send_and_get_socket(&json!({ "type_": "project_name", "name_": "" }))?;
        sock.recv_string()
    }

    /// URL of the monitor's web frontend, if it is exposed
    pub fn monitor_url(&self) -> Result<Option<String>, CommError> {
        let mut sock = self.send_and_get_socket(&json!({ "type_": "monitor_url", "name_": "" }))?;
        let url = sock.recv_string()?;

        Ok(if url.is_empty() { None } else { Some(url) })
    }
}

fn log_cmd(cmd: &JsonValue) {
    debug!(
        "Sending '{}' for '{}'",
        cmd.get("type_").and_then(JsonValue::as_str).unwrap_or_default(),
        cmd.get("name_").and_then(JsonValue::as_str).unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_port_keeps_host_and_monitor() {
        let session = Session::new("engine.local", 1708)
            .with_monitor_port(2000)
            .with_timeout(Duration::from_secs(5));

        let moved = session.with_port(1709);

        assert_eq!(moved.host(), "engine.local");
        assert_eq!(moved.port(), 1709);
        assert_eq!(moved.monitor_port(), 2000);
        assert_eq!(moved.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_unreachable_engine() {
        // Bind then drop a listener so the port is closed
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let session = Session::new("127.0.0.1", port);

        assert!(!session.is_alive());
        assert!(matches!(session.connect(), Err(CommError::Connection(_))));
    }
}
