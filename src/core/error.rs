use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidJson,

    VersionInvalid,
    VersionUnsupported,

    AddonNotFound,

    HttpRequestFailed,
    HttpStatus,

    ReadinessTimeout,

    CommandFailed,

    PipelineFailed,
    AuthorizationFailed,
    PluginMissing,

    InternalIoError,
    InternalJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::VersionInvalid => "version.invalid",
            ErrorCode::VersionUnsupported => "version.unsupported",

            ErrorCode::AddonNotFound => "addon.not_found",

            ErrorCode::HttpRequestFailed => "http.request_failed",
            ErrorCode::HttpStatus => "http.status",

            ErrorCode::ReadinessTimeout => "readiness.timeout",

            ErrorCode::CommandFailed => "command.failed",

            ErrorCode::PipelineFailed => "pipeline.failed",
            ErrorCode::AuthorizationFailed => "authorization.failed",
            ErrorCode::PluginMissing => "plugin.missing",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpStatusDetails {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessTimeoutDetails {
    pub what: String,
    pub timeout_secs: u64,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observation: Option<String>,
}

/// Captured result of a failed shell step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    /// True when a readiness poll may swallow this error and try again.
    pub fn is_transient(&self) -> bool {
        self.retryable == Some(true)
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            serde_json::json!({ "key": key.into(), "path": path }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn version_invalid(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::new(
            ErrorCode::VersionInvalid,
            format!("Cannot parse GoCD version '{}'", raw),
            serde_json::json!({ "version": raw }),
        )
        .with_hint("Versions look like 16.10.0, 18.2 or 18.2.0-5678")
    }

    pub fn version_unsupported(what: impl Into<String>, version: impl Into<String>) -> Self {
        let what = what.into();
        let version = version.into();
        Self::new(
            ErrorCode::VersionUnsupported,
            format!("{} is not available on GoCD {}", what, version),
            serde_json::json!({ "what": what, "version": version }),
        )
    }

    pub fn addon_not_found(core: impl Into<String>, manifest: impl Into<String>) -> Self {
        let core = core.into();
        Self::new(
            ErrorCode::AddonNotFound,
            format!("No postgresql addon listed for GoCD {}", core),
            serde_json::json!({ "gocdVersion": core, "manifest": manifest.into() }),
        )
        .with_hint("Check that addon_builds.json has an entry for this version-build")
    }

    /// Transport-level failure. Connection refusals are transient: the server
    /// may simply not be listening yet.
    pub fn http_request_failed(
        method: &str,
        url: impl Into<String>,
        err: &reqwest::Error,
    ) -> Self {
        let transient = err.is_connect() || err.is_timeout();
        let mut error = Self::new(
            ErrorCode::HttpRequestFailed,
            format!("HTTP request failed: {}", err),
            serde_json::json!({
                "method": method,
                "url": url.into(),
                "error": err.to_string(),
                "connect": err.is_connect(),
            }),
        );
        error.retryable = Some(transient);
        error
    }

    pub fn http_status(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        let details = to_details(HttpStatusDetails {
            method: method.into(),
            url: url.into(),
            status,
            body: body.into(),
        });

        let mut error = Self::new(
            ErrorCode::HttpStatus,
            format!("API error: HTTP {}", status),
            details,
        );
        // 502/503 are what GoCD answers while it is still booting.
        error.retryable = Some(matches!(status, 502 | 503));
        error
    }

    pub fn readiness_timeout(
        what: impl Into<String>,
        timeout: Duration,
        attempts: u32,
        last_observation: Option<String>,
    ) -> Self {
        let what = what.into();
        let details = to_details(ReadinessTimeoutDetails {
            what: what.clone(),
            timeout_secs: timeout.as_secs(),
            attempts,
            last_observation,
        });

        Self::new(
            ErrorCode::ReadinessTimeout,
            format!("Timed out after {:?} waiting for {}", timeout, what),
            details,
        )
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = format!("Command exited with status {}", details.exit_code);
        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn pipeline_failed(name: impl Into<String>, dashboard: Option<Value>) -> Self {
        Self::new(
            ErrorCode::PipelineFailed,
            "Pipeline was not built successfully",
            serde_json::json!({ "pipeline": name.into(), "dashboard": dashboard }),
        )
    }

    pub fn authorization_failed(problem: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(
            ErrorCode::AuthorizationFailed,
            problem,
            serde_json::json!({ "status": status }),
        )
    }

    pub fn plugin_missing(plugin: impl Into<String>, path: impl Into<String>) -> Self {
        let plugin = plugin.into();
        Self::new(
            ErrorCode::PluginMissing,
            format!("Plugin '{}' is not installed", plugin),
            serde_json::json!({ "plugin": plugin, "path": path.into() }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
