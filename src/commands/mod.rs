use gocd_provision::config::{self, ProvisionConfig};
use gocd_provision::http::GoCdClient;
use gocd_provision::readiness;
use gocd_provision::shell::{DryRunShell, LocalShell, Shell};
use gocd_provision::version::GoVersion;

pub type CmdResult<T> = gocd_provision::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub config_path: Option<String>,
    pub dry_run: bool,
}

/// Everything a command needs to talk to the box.
pub(crate) struct Context {
    pub config: ProvisionConfig,
    pub client: GoCdClient,
    pub shell: Box<dyn Shell>,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> gocd_provision::Result<Self> {
        let config = config::load(global.config_path.as_deref())?;
        let client = GoCdClient::new(&config.server)?;
        let shell: Box<dyn Shell> = if global.dry_run {
            Box::new(DryRunShell::new())
        } else {
            Box::new(LocalShell)
        };

        Ok(Self {
            config,
            client,
            shell,
        })
    }

    pub fn version(&self) -> gocd_provision::Result<GoVersion> {
        readiness::current_version(&self.client)
    }

    /// Core version for addon lookups: `--version`, then `GO_VERSION`, then the server.
    pub fn core(&self, explicit: Option<String>) -> gocd_provision::Result<String> {
        match explicit.or_else(|| self.config.go_version.clone()) {
            Some(core) => Ok(core),
            None => Ok(readiness::server_version(&self.client)?.core()),
        }
    }

    /// Commands recorded instead of run (dry run only).
    pub fn recorded(&self) -> Vec<String> {
        self.shell.history()
    }
}

pub mod auth;
pub mod media_types;
pub mod pipeline;
pub mod plugin;
pub mod postgres;
pub mod run;
pub mod service;
pub mod version;
pub mod wait;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (gocd_provision::Result<serde_json::Value>, i32) {
    crate::tty::status("gocd-provision is working...");

    match command {
        // Commands without global context
        crate::Commands::MediaTypes(args) => dispatch!(args, media_types),

        // Commands with global context
        crate::Commands::Version => dispatch!((), global, version),
        crate::Commands::Wait => dispatch!((), global, wait),
        crate::Commands::Postgres(args) => dispatch!(args, global, postgres),
        crate::Commands::Plugin(args) => dispatch!(args, global, plugin),
        crate::Commands::Auth(args) => dispatch!(args, global, auth),
        crate::Commands::Pipeline(args) => dispatch!(args, global, pipeline),
        crate::Commands::Service(args) => dispatch!(args, global, service),
        crate::Commands::Run => dispatch!((), global, run),
    }
}
