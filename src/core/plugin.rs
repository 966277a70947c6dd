//! Optional extension plugins installed from private download URLs.

use crate::config::{PluginConfig, ProvisionConfig};
use crate::error::{Error, Result};
use crate::http::GoCdClient;
use crate::media_type::Feature;
use crate::readiness;
use crate::service;
use crate::shell::{self, Shell};
use crate::utils::shell::{quote_arg, quote_path, MASK};
use crate::version::GoVersion;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Plugin {
    Analytics,
    ElasticAgents,
}

impl Plugin {
    pub const ALL: [Plugin; 2] = [Plugin::ElasticAgents, Plugin::Analytics];

    pub fn name(&self) -> &'static str {
        match self {
            Plugin::Analytics => "analytics",
            Plugin::ElasticAgents => "elastic-agents",
        }
    }

    pub fn jar(&self) -> &'static str {
        match self {
            Plugin::Analytics => "analytics-plugin.jar",
            Plugin::ElasticAgents => "ecs-elastic-agents-plugin.jar",
        }
    }

    pub fn feature(&self) -> Feature {
        match self {
            Plugin::Analytics => Feature::Analytics,
            Plugin::ElasticAgents => Feature::ElasticAgents,
        }
    }

    pub fn is_supported(&self, version: &GoVersion) -> bool {
        self.feature().is_supported(version)
    }

    pub fn download_url<'a>(&self, plugins: &'a PluginConfig) -> Option<&'a str> {
        let url = match self {
            Plugin::Analytics => plugins.analytics_url.as_deref(),
            Plugin::ElasticAgents => plugins.elastic_agents_url.as_deref(),
        };
        url.filter(|url| !url.trim().is_empty())
    }

    pub fn install_path(&self, config: &ProvisionConfig) -> PathBuf {
        config.layout.external_plugins_dir.join(self.jar())
    }
}

/// `curl` invocation that fetches `plugin` into the external plugins dir.
pub fn download_command(plugin: Plugin, config: &ProvisionConfig, url: &str) -> String {
    let password = config.plugins.password.as_deref().unwrap_or_default();
    curl(plugin, config, url, password)
}

/// [`download_command`] as logged and reported, with the password masked.
pub fn download_display(plugin: Plugin, config: &ProvisionConfig, url: &str) -> String {
    curl(plugin, config, url, MASK)
}

fn curl(plugin: Plugin, config: &ProvisionConfig, url: &str, password: &str) -> String {
    let mut command = String::from("curl -L --fail -H 'Accept: binary/octet-stream'");

    if let Some(user) = config.plugins.username.as_deref() {
        let credentials = format!("{}:{}", user, password);
        command.push_str(&format!(" --user {}", quote_arg(&credentials)));
    }

    command.push_str(&format!(
        " -o {} {}",
        quote_path(&plugin.install_path(config)),
        quote_arg(url)
    ));
    command
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum InstallOutcome {
    Installed { plugin: Plugin, path: String },
    Skipped { plugin: Plugin, reason: String },
}

/// Download, restart the server and wait for it to settle.
///
/// Unsupported versions and missing URLs are skips, not failures.
pub fn install(
    shell: &dyn Shell,
    client: &GoCdClient,
    config: &ProvisionConfig,
    version: &GoVersion,
    plugin: Plugin,
) -> Result<InstallOutcome> {
    if !plugin.is_supported(version) {
        return Ok(InstallOutcome::Skipped {
            plugin,
            reason: format!(
                "requires GoCD {} or later",
                plugin.feature().minimum_version()
            ),
        });
    }

    let Some(url) = plugin.download_url(&config.plugins) else {
        log_status!("plugin", "No download URL for {}, skipping", plugin.name());
        return Ok(InstallOutcome::Skipped {
            plugin,
            reason: "no download URL configured".to_string(),
        });
    };

    log_status!("plugin", "Installing {} plugin", plugin.name());
    let command = download_command(plugin, config, url);
    shell::run(shell, &command, &download_display(plugin, config, url))?;

    service::restart_server(shell, &config.layout)?;
    readiness::service_status(client, config, Some(version))?;

    Ok(InstallOutcome::Installed {
        plugin,
        path: plugin.install_path(config).display().to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginCheck {
    pub plugin: Plugin,
    pub path: String,
    pub size: u64,
}

/// The jar is on disk and non-empty.
pub fn verify(config: &ProvisionConfig, plugin: Plugin) -> Result<PluginCheck> {
    let path = plugin.install_path(config);
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(PluginCheck {
            plugin,
            path: path.display().to_string(),
            size: meta.len(),
        }),
        _ => Err(Error::plugin_missing(plugin.name(), path.display().to_string())),
    }
}
