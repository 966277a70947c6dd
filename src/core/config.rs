use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::poll::WaitSpec;

/// Root configuration for a provisioning run.
///
/// Built-in defaults describe the Vagrant box layout; a JSON file and then
/// environment variables override them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub plugins: PluginConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Core version (`<version>-<build>`) used for the addon swap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_server_start_secs")]
    pub server_start_secs: u64,

    #[serde(default = "default_postgres_secs")]
    pub postgres_secs: u64,

    #[serde(default = "default_agent_secs")]
    pub agent_secs: u64,

    #[serde(default = "default_pipeline_secs")]
    pub pipeline_secs: u64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            server_start_secs: default_server_start_secs(),
            postgres_secs: default_postgres_secs(),
            agent_secs: default_agent_secs(),
            pipeline_secs: default_pipeline_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl TimeoutConfig {
    fn spec(&self, secs: u64) -> WaitSpec {
        WaitSpec::new(
            Duration::from_secs(secs),
            Duration::from_secs(self.interval_secs),
        )
    }

    pub fn server_start(&self) -> WaitSpec {
        self.spec(self.server_start_secs)
    }

    pub fn postgres(&self) -> WaitSpec {
        self.spec(self.postgres_secs)
    }

    pub fn agent(&self) -> WaitSpec {
        self.spec(self.agent_secs)
    }

    pub fn pipeline(&self) -> WaitSpec {
        self.spec(self.pipeline_secs)
    }
}

/// Where things live on the provisioned machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_init_dir")]
    pub init_dir: PathBuf,

    #[serde(default = "default_server_defaults_file")]
    pub server_defaults_file: PathBuf,

    #[serde(default = "default_server_log")]
    pub server_log: PathBuf,

    #[serde(default = "default_addons_dir")]
    pub addons_dir: PathBuf,

    #[serde(default = "default_external_plugins_dir")]
    pub external_plugins_dir: PathBuf,

    #[serde(default = "default_addon_source_dir")]
    pub addon_source_dir: PathBuf,

    #[serde(default = "default_addon_builds")]
    pub addon_builds: PathBuf,

    #[serde(default = "default_postgres_properties")]
    pub postgres_properties: PathBuf,

    #[serde(default = "default_password_file")]
    pub password_file: PathBuf,

    #[serde(default = "default_service_user")]
    pub service_user: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            init_dir: default_init_dir(),
            server_defaults_file: default_server_defaults_file(),
            server_log: default_server_log(),
            addons_dir: default_addons_dir(),
            external_plugins_dir: default_external_plugins_dir(),
            addon_source_dir: default_addon_source_dir(),
            addon_builds: default_addon_builds(),
            postgres_properties: default_postgres_properties(),
            password_file: default_password_file(),
            service_user: default_service_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_pg_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_pg_name")]
    pub name: String,

    #[serde(default = "default_pg_user")]
    pub user: String,

    #[serde(default = "default_pg_password", skip_serializing)]
    pub password: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_pg_host(),
            port: default_pg_port(),
            name: default_pg_name(),
            user: default_pg_user(),
            password: default_pg_password(),
        }
    }
}

impl PostgresConfig {
    /// Line the server logs once it has connected to PostgreSQL.
    pub fn connection_marker(&self) -> String {
        format!(
            "Using connection configuration jdbc:postgresql://{}:{}/{} [User: {}] [Password Encrypted: false]",
            self.host, self.port, self.name, self.user
        )
    }
}

/// Download settings for the optional extension plugins.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_agents_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    #[serde(default = "default_pipeline_definition")]
    pub definition_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            definition_path: default_pipeline_definition(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_base_url() -> String {
    "http://localhost:8153/go".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_server_start_secs() -> u64 {
    120
}

fn default_postgres_secs() -> u64 {
    120
}

fn default_agent_secs() -> u64 {
    180
}

fn default_pipeline_secs() -> u64 {
    180
}

fn default_interval_secs() -> u64 {
    5
}

fn default_init_dir() -> PathBuf {
    PathBuf::from("/etc/init.d")
}

fn default_server_defaults_file() -> PathBuf {
    PathBuf::from("/etc/default/go-server")
}

fn default_server_log() -> PathBuf {
    PathBuf::from("/var/log/go-server/go-server.log")
}

fn default_addons_dir() -> PathBuf {
    PathBuf::from("/var/lib/go-server/addons")
}

fn default_external_plugins_dir() -> PathBuf {
    PathBuf::from("/var/lib/go-server/plugins/external")
}

fn default_addon_source_dir() -> PathBuf {
    PathBuf::from("/vagrant/addons")
}

fn default_addon_builds() -> PathBuf {
    PathBuf::from("/vagrant/addons/addon_builds.json")
}

fn default_postgres_properties() -> PathBuf {
    PathBuf::from("/etc/go/postgresqldb.properties")
}

fn default_password_file() -> PathBuf {
    PathBuf::from("/etc/go/password.properties")
}

fn default_service_user() -> String {
    "go".to_string()
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_name() -> String {
    "cruise".to_string()
}

fn default_pg_user() -> String {
    "postgres".to_string()
}

fn default_pg_password() -> String {
    "postgres".to_string()
}

fn default_pipeline_name() -> String {
    "smoke".to_string()
}

fn default_pipeline_definition() -> PathBuf {
    PathBuf::from("/vagrant/provision/filesystem/pipeline.json")
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load configuration: defaults, then `path` (if any), then the process environment.
pub fn load(path: Option<&str>) -> Result<ProvisionConfig> {
    let mut config = match path {
        Some(path) => load_from_file(Path::new(&*shellexpand::tilde(path)))?,
        None => ProvisionConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<ProvisionConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Overlay environment variables. Empty values count as unset.
pub fn apply_env<F>(config: &mut ProvisionConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("GOCD_URL") {
        config.server.base_url = url;
    }
    if let Some(user) = get("GOCD_ADMIN_USER") {
        config.server.username = Some(user);
    }
    if let Some(password) = get("GOCD_ADMIN_PASSWORD") {
        config.server.password = Some(password);
    }
    if let Some(version) = get("GO_VERSION") {
        config.go_version = Some(version);
    }
    if let Some(flag) = get("USE_POSTGRES") {
        config.postgres.enabled = parse_flag("USE_POSTGRES", &flag)?;
    }
    if let Some(user) = get("EXTENSIONS_USER") {
        config.plugins.username = Some(user);
    }
    if let Some(password) = get("EXTENSIONS_PASSWORD") {
        config.plugins.password = Some(password);
    }
    if let Some(url) = get("ANALYTICS_PLUGIN_DOWNLOAD_URL") {
        config.plugins.analytics_url = Some(url);
    }
    if let Some(url) = get("EA_PLUGIN_DOWNLOAD_URL") {
        config.plugins.elastic_agents_url = Some(url);
    }
    if let Some(name) = get("PIPELINE_NAME") {
        config.pipeline.name = name;
    }
    if let Some(path) = get("PIPELINE_DEFINITION") {
        config.pipeline.definition_path = PathBuf::from(path);
    }

    Ok(())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config_invalid_value(
            key,
            Some(value.to_string()),
            "Expected a boolean (true/false/1/0)",
        )),
    }
}
