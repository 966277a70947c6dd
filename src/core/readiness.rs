//! Waiting for the server and its agent to come up.

use crate::config::ProvisionConfig;
use crate::error::{Error, Result};
use crate::http::GoCdClient;
use crate::media_type::{self, Endpoint};
use crate::poll::{wait_until, Check, WaitSpec};
use crate::version::{GoVersion, ServerVersion};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

const LOGIN_PATH: &str = "auth/login";
const VERSION_PATH: &str = "api/version";
const AGENTS_PATH: &str = "api/agents";

pub fn server_version(client: &GoCdClient) -> Result<ServerVersion> {
    let payload = client.get_json(VERSION_PATH, media_type::V1)?;
    serde_json::from_value(payload)
        .map_err(|e| Error::internal_json(e.to_string(), Some("parse /api/version".to_string())))
}

pub fn current_version(client: &GoCdClient) -> Result<GoVersion> {
    server_version(client)?.go_version()
}

/// The login page answers 200, or 302 to the dashboard once security is on.
pub fn server_running(client: &GoCdClient) -> bool {
    match client.ping(LOGIN_PATH) {
        Ok(status) => status == 302 || (200..300).contains(&status),
        Err(_) => false,
    }
}

pub fn wait_to_start(client: &GoCdClient, spec: &WaitSpec) -> Result<()> {
    log_status!("wait", "Waiting for the server to come up");
    wait_until("server to start", spec, |budget| {
        if server_running(&client.bounded(budget)) {
            Ok(Check::Ready(()))
        } else {
            Ok(Check::observed("login page not reachable"))
        }
    })?;
    log_status!("wait", "Server is up");
    Ok(())
}

/// True when `log` has a line containing `marker`. A missing log is not an error.
pub fn log_contains(log: &Path, marker: &str) -> bool {
    fs::read_to_string(log)
        .map(|content| content.lines().any(|line| line.contains(marker)))
        .unwrap_or(false)
}

pub fn wait_for_log_line(log: &Path, marker: &str, spec: &WaitSpec) -> Result<()> {
    wait_until("server log marker", spec, |_| {
        if log_contains(log, marker) {
            Ok(Check::Ready(()))
        } else {
            Ok(Check::observed(format!("'{}' not yet in {}", marker, log.display())))
        }
    })
}

pub fn wait_for_postgres(config: &ProvisionConfig) -> Result<()> {
    log_status!("wait", "Waiting for the server to connect to PostgreSQL");
    wait_for_log_line(
        &config.layout.server_log,
        &config.postgres.connection_marker(),
        &config.timeouts.postgres(),
    )?;
    log_status!("wait", "Server is up with PostgreSQL");
    Ok(())
}

/// Agent states reported by `/api/agents`.
pub fn agent_states(agents: &Value) -> Vec<String> {
    agents
        .pointer("/_embedded/agents")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| a.get("agent_state").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn wait_for_idle_agent(client: &GoCdClient, version: &GoVersion, spec: &WaitSpec) -> Result<()> {
    let accept = media_type::require_accept(Endpoint::Agents, version)?;
    log_status!("wait", "Waiting for an agent to become idle");

    wait_until("idle agent", spec, |budget| {
        let agents = client.bounded(budget).get_json(AGENTS_PATH, accept)?;
        let states = agent_states(&agents);
        if states.iter().any(|s| s == "Idle") {
            Ok(Check::Ready(()))
        } else if states.is_empty() {
            Ok(Check::observed("no agents registered"))
        } else {
            Ok(Check::observed(format!("agent states: {}", states.join(", "))))
        }
    })?;

    log_status!("wait", "Agent is up");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub server_up: bool,
    pub postgres_checked: bool,
    pub agent_idle: bool,
}

/// Server up, PostgreSQL connected (when enabled), an agent idle.
pub fn service_status(
    client: &GoCdClient,
    config: &ProvisionConfig,
    version: Option<&GoVersion>,
) -> Result<ServiceStatus> {
    wait_to_start(client, &config.timeouts.server_start())?;

    if config.postgres.enabled {
        wait_for_postgres(config)?;
    }

    let version = match version {
        Some(v) => v.clone(),
        None => current_version(client)?,
    };
    wait_for_idle_agent(client, &version, &config.timeouts.agent())?;

    Ok(ServiceStatus {
        server_up: true,
        postgres_checked: config.postgres.enabled,
        agent_idle: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn agent_states_reads_embedded_list() {
        let payload = serde_json::json!({
            "_embedded": { "agents": [
                { "hostname": "a", "agent_state": "Building" },
                { "hostname": "b", "agent_state": "Idle" },
                { "hostname": "c" }
            ]}
        });
        assert_eq!(agent_states(&payload), vec!["Building", "Idle"]);
    }

    #[test]
    fn agent_states_tolerates_unexpected_shapes() {
        assert!(agent_states(&serde_json::json!({})).is_empty());
        assert!(agent_states(&serde_json::json!({"_embedded": {"agents": {}}})).is_empty());
    }

    #[test]
    fn log_marker_found_once_written() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("go-server.log");
        let marker = "Using connection configuration jdbc:postgresql://localhost:5432/cruise";

        assert!(!log_contains(&log, marker));

        let mut file = fs::File::create(&log).unwrap();
        writeln!(file, "INFO starting").unwrap();
        writeln!(file, "INFO {} [User: postgres]", marker).unwrap();

        assert!(log_contains(&log, marker));
        let spec = WaitSpec::new(Duration::from_millis(50), Duration::from_millis(10));
        wait_for_log_line(&log, marker, &spec).unwrap();
    }

    #[test]
    fn missing_log_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let spec = WaitSpec::new(Duration::from_millis(30), Duration::from_millis(10));
        let err = wait_for_log_line(&dir.path().join("absent.log"), "marker", &spec).unwrap_err();
        assert_eq!(err.code.as_str(), "readiness.timeout");
    }
}
