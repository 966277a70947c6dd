//! PostgreSQL storage backend.
//!
//! The backend ships as an addon jar matched to the exact server build. The
//! provisioning box carries a manifest mapping `<version>-<build>` to the
//! jar file name.

use crate::config::ProvisionConfig;
use crate::error::{Error, Result};
use crate::service;
use crate::shell::{self, Shell};
use crate::utils::shell::{append_line, as_user, quote_path};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DATABASE_PROVIDER: &str = "com.thoughtworks.go.postgresql.PostgresqlDatabase";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonBuild {
    pub gocd_version: String,
    #[serde(default)]
    pub addons: HashMap<String, String>,
}

pub fn load_addon_builds(manifest: &Path) -> Result<Vec<AddonBuild>> {
    let content = fs::read_to_string(manifest).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", manifest.display())))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::validation_invalid_json(e, Some(format!("parse {}", manifest.display())))
    })
}

/// Jar name for `core`. When the manifest lists the build more than once the
/// last entry wins.
pub fn addon_for(core: &str, manifest: &Path) -> Result<String> {
    load_addon_builds(manifest)?
        .into_iter()
        .filter(|build| build.gocd_version == core)
        .filter_map(|build| build.addons.get("postgresql").cloned())
        .last()
        .ok_or_else(|| Error::addon_not_found(core, manifest.display().to_string()))
}

fn replace_addon_jar_command(config: &ProvisionConfig, addon: &str) -> String {
    let layout = &config.layout;
    let jars = format!("{}/*.jar", quote_path(&layout.addons_dir));
    as_user(
        &layout.service_user,
        &format!(
            "mkdir -p {dir} ; rm -rf {jars} ; cp {src} {dir}/",
            dir = quote_path(&layout.addons_dir),
            jars = jars,
            src = quote_path(&layout.addon_source_dir.join(addon)),
        ),
    )
}

/// Shell steps that switch a stopped server to PostgreSQL.
pub fn setup_commands(config: &ProvisionConfig, addon: &str) -> Vec<String> {
    let layout = &config.layout;
    let pg = &config.postgres;

    let mut commands = vec![
        service::command(layout, service::Service::Server, service::Action::Stop),
        // The variable must reach the file unexpanded.
        format!(
            "echo GO_SERVER_SYSTEM_PROPERTIES=\\\"\\$GO_SERVER_SYSTEM_PROPERTIES -Dgo.database.provider={}\\\" >> {}",
            DATABASE_PROVIDER,
            quote_path(&layout.server_defaults_file)
        ),
        replace_addon_jar_command(config, addon),
    ];

    let properties = [
        ("db.host", pg.host.clone()),
        ("db.port", pg.port.to_string()),
        ("db.name", pg.name.clone()),
        ("db.user", pg.user.clone()),
        ("db.password", pg.password.clone()),
    ];
    for (key, value) in properties {
        commands.push(as_user(
            &layout.service_user,
            &append_line(&format!("{}={}", key, value), &layout.postgres_properties),
        ));
    }

    commands
}

#[derive(Debug, Clone, Serialize)]
pub struct PostgresSetup {
    pub core: String,
    pub addon: String,
    pub commands_run: usize,
}

pub fn setup_postgres_addon(
    shell: &dyn Shell,
    config: &ProvisionConfig,
    core: &str,
) -> Result<PostgresSetup> {
    log_status!("postgres", "Setting up postgres addon for {}", core);
    let addon = addon_for(core, &config.layout.addon_builds)?;
    let commands = setup_commands(config, &addon);

    for command in &commands {
        let display = if command.contains("db.password=") {
            "append db.password to postgres properties".to_string()
        } else {
            command.clone()
        };
        shell::run(shell, command, &display)?;
    }

    Ok(PostgresSetup {
        core: core.to_string(),
        addon,
        commands_run: commands.len(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AddonSwap {
    pub swapped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addon: Option<String>,
}

/// Put the addon for `core` in place and restart. No-op unless PostgreSQL is enabled.
pub fn change_postgres_addons_jar(
    shell: &dyn Shell,
    config: &ProvisionConfig,
    core: &str,
) -> Result<AddonSwap> {
    if !config.postgres.enabled {
        return Ok(AddonSwap {
            swapped: false,
            addon: None,
        });
    }

    let addon = addon_for(core, &config.layout.addon_builds)?;
    log_status!("postgres", "Swapping addon jar to {}", addon);

    let command = replace_addon_jar_command(config, &addon);
    shell::run(shell, &command, &command)?;
    service::restart_server(shell, &config.layout)?;

    Ok(AddonSwap {
        swapped: true,
        addon: Some(addon),
    })
}
