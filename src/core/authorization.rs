//! Password-file authorization.

use crate::config::ProvisionConfig;
use crate::error::{Error, Result};
use crate::http::GoCdClient;
use crate::media_type::{self, Endpoint, Feature};
use crate::shell::{self, Shell};
use crate::utils::shell::{quote_arg, quote_path, MASK};
use crate::version::GoVersion;
use serde::Serialize;
use serde_json::{json, Value};

const AUTH_CONFIGS_PATH: &str = "api/admin/security/auth_configs";
const PROTECTED_PATH: &str = "api/agents";
const PASSWORD_FILE_PLUGIN: &str = "cd.go.authentication.passwordfile";
const AUTH_CONFIG_ID: &str = "file-auth-config";

pub fn is_supported(version: &GoVersion) -> bool {
    Feature::Authorization.is_supported(version)
}

fn admin_credentials(config: &ProvisionConfig) -> Result<(&str, &str)> {
    let user = config
        .server
        .username
        .as_deref()
        .ok_or_else(|| Error::config_missing_key("server.username", None))?;
    let password = config
        .server
        .password
        .as_deref()
        .ok_or_else(|| Error::config_missing_key("server.password", None))?;
    Ok((user, password))
}

pub fn password_file_command(config: &ProvisionConfig, user: &str, password: &str) -> String {
    format!(
        "htpasswd -b -s -c {} {} {}",
        quote_path(&config.layout.password_file),
        quote_arg(user),
        quote_arg(password)
    )
}

pub fn auth_config_body(config: &ProvisionConfig) -> Value {
    json!({
        "id": AUTH_CONFIG_ID,
        "plugin_id": PASSWORD_FILE_PLUGIN,
        "properties": [
            {
                "key": "PasswordFilePath",
                "value": config.layout.password_file.display().to_string()
            }
        ]
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationSetup {
    pub auth_config_id: String,
    pub password_file: String,
    pub status: u16,
}

/// Write the password file for the admin user and register it with the server.
pub fn setup(
    shell: &dyn Shell,
    client: &GoCdClient,
    config: &ProvisionConfig,
    version: &GoVersion,
) -> Result<AuthorizationSetup> {
    let accept = media_type::require_accept(Endpoint::AuthConfigs, version)?;
    let (user, password) = admin_credentials(config)?;

    log_status!("auth", "Configuring password-file authorization for '{}'", user);
    let command = password_file_command(config, user, password);
    let display = password_file_command(config, user, MASK);
    shell::run(shell, &command, &display)?;

    let response = client.post(AUTH_CONFIGS_PATH, accept, Some(&auth_config_body(config)), false)?;

    Ok(AuthorizationSetup {
        auth_config_id: AUTH_CONFIG_ID.to_string(),
        password_file: config.layout.password_file.display().to_string(),
        status: response.status,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationCheck {
    pub anonymous_status: u16,
    pub authenticated_status: u16,
}

/// Anonymous requests are refused and the admin user gets through.
pub fn validate(client: &GoCdClient, version: &GoVersion) -> Result<AuthorizationCheck> {
    let accept = media_type::require_accept(Endpoint::Agents, version)?;

    let anonymous_status = client.without_credentials().get_status(PROTECTED_PATH, accept)?;
    if !matches!(anonymous_status, 401 | 403) {
        return Err(Error::authorization_failed(
            "Anonymous request was not rejected",
            Some(anonymous_status),
        ));
    }

    if !client.has_credentials() {
        return Err(Error::config_missing_key("server.username", None));
    }
    let authenticated_status = client.get_status(PROTECTED_PATH, accept)?;
    if !(200..300).contains(&authenticated_status) {
        return Err(Error::authorization_failed(
            "Admin credentials were rejected",
            Some(authenticated_status),
        ));
    }

    log_status!("auth", "Authorization is enforced");
    Ok(AuthorizationCheck {
        anonymous_status,
        authenticated_status,
    })
}
