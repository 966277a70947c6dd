//! The smoke-test pipeline: create it, unpause it, run it, watch it pass.

use crate::error::{Error, ErrorCode, Result};
use crate::http::{ApiResponse, GoCdClient};
use crate::media_type::{self, Endpoint};
use crate::poll::{wait_until, Check, WaitSpec};
use crate::version::GoVersion;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

const CREATE_PATH: &str = "api/admin/pipelines";
const DASHBOARD_PATH: &str = "api/dashboard";
const LATEST_INSTANCE_POINTER: &str =
    "/_embedded/pipeline_groups/0/_embedded/pipelines/0/_embedded/instances/0";
const PASSED: &str = "Passed";

fn latest_instance(dashboard: &Value) -> Option<&Value> {
    dashboard.pointer(LATEST_INSTANCE_POINTER)
}

/// Status of the first stage of the latest instance of the first pipeline.
pub fn stage_status(dashboard: &Value) -> Option<&str> {
    latest_instance(dashboard)?
        .pointer("/_embedded/stages/0/status")
        .and_then(Value::as_str)
}

/// Run counter of the latest instance of the first pipeline.
pub fn instance_counter(dashboard: &Value) -> Option<u64> {
    latest_instance(dashboard)?.get("counter").and_then(Value::as_u64)
}

pub fn read_definition(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::validation_invalid_json(e, Some(format!("parse {}", path.display())))
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub pipeline: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
}

pub struct Pipeline<'a> {
    name: String,
    client: &'a GoCdClient,
    version: GoVersion,
}

impl<'a> Pipeline<'a> {
    pub fn new(name: impl Into<String>, client: &'a GoCdClient, version: GoVersion) -> Self {
        Self {
            name: name.into(),
            client,
            version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, endpoint: Endpoint) -> Result<&'static str> {
        media_type::require_accept(endpoint, &self.version)
    }

    pub fn create(&self, definition_path: &Path) -> Result<ApiResponse> {
        let definition = read_definition(definition_path)?;
        let accept = self.accept(Endpoint::PipelineConfig)?;
        log_status!("pipeline", "Creating pipeline '{}'", self.name);
        self.client.post(CREATE_PATH, accept, Some(&definition), false)
    }

    pub fn unpause(&self) -> Result<ApiResponse> {
        let accept = self.accept(Endpoint::Unpause)?;
        log_status!("pipeline", "Unpausing '{}'", self.name);
        self.client
            .post(&format!("api/pipelines/{}/unpause", self.name), accept, None, true)
    }

    pub fn trigger(&self) -> Result<ApiResponse> {
        let accept = self.accept(Endpoint::Schedule)?;
        log_status!("pipeline", "Triggering '{}'", self.name);
        self.client
            .post(&format!("api/pipelines/{}/schedule", self.name), accept, None, true)
    }

    /// Poll the dashboard until the stage reports `Passed`.
    ///
    /// A timeout becomes `pipeline.failed` carrying the last dashboard seen.
    pub fn wait_until_passed(&self, spec: &WaitSpec) -> Result<PipelineRun> {
        self.wait_for_run(spec, None)
    }

    /// Schedule another run and wait for that run to pass as well.
    ///
    /// The instance that was latest before scheduling still reads `Passed`,
    /// so only an instance with a higher counter counts.
    pub fn can_retrigger(&self, spec: &WaitSpec) -> Result<PipelineRun> {
        let accept = self.accept(Endpoint::Dashboard)?;
        let before = instance_counter(&self.client.get_json(DASHBOARD_PATH, accept)?);
        self.trigger()?;
        self.wait_for_run(spec, Some(before.unwrap_or(0)))
    }

    /// Wait for the latest instance to pass. With `after`, the instance
    /// counter must also be above it; an instance without a counter is pending.
    fn wait_for_run(&self, spec: &WaitSpec, after: Option<u64>) -> Result<PipelineRun> {
        let accept = self.accept(Endpoint::Dashboard)?;
        let mut last_dashboard: Option<Value> = None;

        let result = wait_until("pipeline to pass", spec, |budget| {
            let dashboard = self.client.bounded(budget).get_json(DASHBOARD_PATH, accept)?;
            let status = stage_status(&dashboard).map(str::to_string);
            let counter = instance_counter(&dashboard);
            last_dashboard = Some(dashboard);

            if let Some(previous) = after {
                match counter {
                    Some(current) if current > previous => {}
                    _ => return Ok(Check::observed(format!("waiting for a run after #{}", previous))),
                }
            }

            match status.as_deref() {
                Some(PASSED) => Ok(Check::Ready(counter)),
                Some(other) => Ok(Check::observed(format!("stage status {}", other))),
                None => Ok(Check::observed("no stage status yet")),
            }
        });

        match result {
            Ok(counter) => {
                log_status!("pipeline", "'{}' passed", self.name);
                Ok(PipelineRun {
                    pipeline: self.name.clone(),
                    status: PASSED.to_string(),
                    counter,
                })
            }
            Err(err) if err.code == ErrorCode::ReadinessTimeout => Err(Error::pipeline_failed(
                &self.name,
                last_dashboard,
            )),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dashboard(status: &str) -> Value {
        dashboard_run(1, status)
    }

    fn dashboard_run(counter: u64, status: &str) -> Value {
        json!({
            "_embedded": { "pipeline_groups": [ {
                "name": "first",
                "_embedded": { "pipelines": [ {
                    "name": "smoke",
                    "_embedded": { "instances": [ {
                        "counter": counter,
                        "_embedded": { "stages": [ { "name": "up42_stage", "status": status } ] }
                    } ] }
                } ] }
            } ] }
        })
    }

    #[test]
    fn stage_status_reads_nested_path() {
        assert_eq!(stage_status(&dashboard("Passed")), Some("Passed"));
        assert_eq!(stage_status(&dashboard("Building")), Some("Building"));
    }

    #[test]
    fn stage_status_missing_when_no_instances() {
        let empty = json!({
            "_embedded": { "pipeline_groups": [ {
                "_embedded": { "pipelines": [ { "_embedded": { "instances": [] } } ] }
            } ] }
        });
        assert_eq!(stage_status(&empty), None);
        assert_eq!(stage_status(&json!({})), None);
    }

    #[test]
    fn instance_counter_reads_latest_instance() {
        assert_eq!(instance_counter(&dashboard_run(7, "Building")), Some(7));
        assert_eq!(instance_counter(&json!({})), None);

        let no_counter = json!({
            "_embedded": { "pipeline_groups": [ {
                "_embedded": { "pipelines": [ { "_embedded": { "instances": [ {} ] } } ] }
            } ] }
        });
        assert_eq!(instance_counter(&no_counter), None);
    }

    #[test]
    fn read_definition_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ group: ").unwrap();
        let err = read_definition(&path).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_json");

        let err = read_definition(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }
}
