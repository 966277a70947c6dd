//! JSON envelope printed for every command, and the exit code behind it.

use gocd_provision::error::Hint;
use gocd_provision::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

/// `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl From<Error> for ErrorBody {
    fn from(err: Error) -> Self {
        Self {
            code: err.code.as_str(),
            message: err.message,
            details: err.details,
            hints: err.hints,
            retryable: err.retryable,
        }
    }
}

impl Envelope {
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.into()),
            },
        }
    }
}

/// Serialize a command's output, pairing it with its exit code. Failures
/// take the exit code of their error family.
pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize command output".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

/// 2 bad input, 4 missing artifact, 10 server unreachable or refusing,
/// 20 shell step failed, 30 pipeline did not pass, 1 anything internal.
pub(crate) fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidJson
        | ErrorCode::VersionInvalid
        | ErrorCode::VersionUnsupported => 2,

        ErrorCode::AddonNotFound | ErrorCode::PluginMissing => 4,

        ErrorCode::HttpRequestFailed
        | ErrorCode::HttpStatus
        | ErrorCode::ReadinessTimeout
        | ErrorCode::AuthorizationFailed => 10,

        ErrorCode::CommandFailed => 20,

        ErrorCode::PipelineFailed => 30,

        ErrorCode::InternalIoError | ErrorCode::InternalJsonError => 1,
    }
}

fn write_envelope(out: &mut impl Write, envelope: &Envelope) -> Result<()> {
    let payload = serde_json::to_string_pretty(envelope)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize envelope".to_string())))?;

    match writeln!(out, "{}", payload) {
        Ok(()) => Ok(()),
        // Output piped into `head` and friends.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(Error::internal_io(e.to_string(), Some("write stdout".to_string()))),
    }
}

pub fn print_json_result(result: Result<Value>) -> Result<()> {
    write_envelope(&mut io::stdout().lock(), &Envelope::from_result(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(result: Result<Value>) -> Value {
        let mut out = Vec::new();
        write_envelope(&mut out, &Envelope::from_result(result)).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn exit_codes_follow_error_families() {
        assert_eq!(exit_code_for_error(ErrorCode::ConfigInvalidJson), 2);
        assert_eq!(exit_code_for_error(ErrorCode::AddonNotFound), 4);
        assert_eq!(exit_code_for_error(ErrorCode::ReadinessTimeout), 10);
        assert_eq!(exit_code_for_error(ErrorCode::CommandFailed), 20);
        assert_eq!(exit_code_for_error(ErrorCode::PipelineFailed), 30);
        assert_eq!(exit_code_for_error(ErrorCode::InternalIoError), 1);
    }

    #[test]
    fn error_envelope_omits_data() {
        let (result, code) = map_cmd_result_to_json::<()>(Err(Error::pipeline_failed("smoke", None)));
        assert_eq!(code, 30);

        let json = rendered(result);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "pipeline.failed");
        assert_eq!(json["error"]["details"]["pipeline"], "smoke");
        assert!(json.get("data").is_none());
        assert!(json["error"].get("hints").is_none());
    }

    #[test]
    fn success_envelope_carries_data_and_exit_code() {
        let (result, code) = map_cmd_result_to_json(Ok((serde_json::json!({ "core": "18.2.0-6228" }), 0)));
        assert_eq!(code, 0);

        let json = rendered(result);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["core"], "18.2.0-6228");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn hints_and_retryable_reach_the_envelope() {
        let err = Error::version_invalid("eighteen");
        let json = rendered(Err(err));
        assert_eq!(json["error"]["code"], "version.invalid");
        assert!(json["error"]["hints"][0]["message"].as_str().unwrap().contains("16.10.0"));

        let json = rendered(Err(Error::http_status("GET", "/go/api/agents", 503, "")));
        assert_eq!(json["error"]["retryable"], true);
    }
}
