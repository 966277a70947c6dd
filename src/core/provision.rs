//! End-to-end provisioning of a freshly booted box.

use crate::authorization;
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::http::GoCdClient;
use crate::pipeline::Pipeline;
use crate::plugin::{self, InstallOutcome, Plugin};
use crate::postgres;
use crate::readiness;
use crate::shell::Shell;
use crate::version::{GoVersion, ServerVersion};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub output: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub server_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    /// Shell commands recorded by a dry run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

pub struct ServerConfiguration<'a> {
    server: ServerVersion,
    version: GoVersion,
    config: &'a ProvisionConfig,
    client: &'a GoCdClient,
    shell: &'a dyn Shell,
    steps: Vec<StepRecord>,
}

impl<'a> ServerConfiguration<'a> {
    pub fn new(
        server: ServerVersion,
        config: &'a ProvisionConfig,
        client: &'a GoCdClient,
        shell: &'a dyn Shell,
    ) -> Result<Self> {
        let version = server.go_version()?;
        Ok(Self {
            server,
            version,
            config,
            client,
            shell,
            steps: Vec::new(),
        })
    }

    pub fn version(&self) -> &GoVersion {
        &self.version
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    fn done<T: Serialize>(&mut self, id: &str, output: &T) {
        self.steps.push(StepRecord {
            id: id.to_string(),
            status: StepStatus::Done,
            reason: None,
            output: serde_json::to_value(output).unwrap_or(Value::Null),
        });
    }

    fn skipped(&mut self, id: &str, reason: impl Into<String>) {
        log_status!("provision", "Skipping {}", id);
        self.steps.push(StepRecord {
            id: id.to_string(),
            status: StepStatus::Skipped,
            reason: Some(reason.into()),
            output: Value::Null,
        });
    }

    fn pipeline(&self) -> Pipeline<'a> {
        Pipeline::new(&self.config.pipeline.name, self.client, self.version.clone())
    }

    /// Plugins that `setup` installs and `validate` therefore expects.
    fn expected_plugins(&self) -> Vec<Plugin> {
        Plugin::ALL
            .into_iter()
            .filter(|p| p.is_supported(&self.version))
            .filter(|p| p.download_url(&self.config.plugins).is_some())
            .collect()
    }

    pub fn setup(&mut self) -> Result<()> {
        if authorization::is_supported(&self.version) {
            let result = authorization::setup(self.shell, self.client, self.config, &self.version)?;
            self.done("authorization.setup", &result);
        } else {
            self.skipped("authorization.setup", "requires GoCD 17.5.0 or later");
        }

        for plugin in Plugin::ALL {
            let id = format!("plugin.install.{}", plugin.name());
            match plugin::install(self.shell, self.client, self.config, &self.version, plugin)? {
                InstallOutcome::Skipped { reason, .. } => self.skipped(&id, reason),
                outcome => self.done(&id, &outcome),
            }
        }

        self.configure_server()
    }

    fn configure_server(&mut self) -> Result<()> {
        let pipeline = self.pipeline();

        let created = pipeline.create(&self.config.pipeline.definition_path)?;
        self.done("pipeline.create", &created);

        let unpaused = pipeline.unpause()?;
        self.done("pipeline.unpause", &unpaused);

        let triggered = pipeline.trigger()?;
        self.done("pipeline.trigger", &triggered);

        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        let pipeline = self.pipeline();
        let spec = self.config.timeouts.pipeline();

        let passed = pipeline.wait_until_passed(&spec)?;
        self.done("pipeline.passed", &passed);

        let retriggered = pipeline.can_retrigger(&spec)?;
        self.done("pipeline.retrigger", &retriggered);

        for plugin in self.expected_plugins() {
            let check = plugin::verify(self.config, plugin)?;
            self.done(&format!("plugin.verify.{}", plugin.name()), &check);
        }

        if authorization::is_supported(&self.version) {
            let check = authorization::validate(self.client, &self.version)?;
            self.done("authorization.validate", &check);
        }

        Ok(())
    }

    /// Wait for services, swap the PostgreSQL addon if asked, then set up and validate.
    pub fn run(mut self) -> Result<ProvisionReport> {
        let started_at = Utc::now();
        log_status!("provision", "Provisioning GoCD {}", self.server.core());

        let status = readiness::service_status(self.client, self.config, Some(&self.version))?;
        self.done("service.status", &status);

        if self.config.postgres.enabled {
            let core = self
                .config
                .go_version
                .clone()
                .unwrap_or_else(|| self.server.core());
            let swap = postgres::change_postgres_addons_jar(self.shell, self.config, &core)?;
            self.done("postgres.swap", &swap);
            let status = readiness::service_status(self.client, self.config, Some(&self.version))?;
            self.done("service.status", &status);
        } else {
            self.skipped("postgres.swap", "PostgreSQL backend not enabled");
        }

        self.setup()?;
        self.validate()?;

        Ok(ProvisionReport {
            server_version: self.server.core(),
            started_at,
            finished_at: Utc::now(),
            steps: self.steps,
            commands: self.shell.history(),
        })
    }
}
