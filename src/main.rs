use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{auth, media_types, pipeline, plugin, postgres, service};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "gocd-provision")]
#[command(version = VERSION)]
#[command(about = "Provision and validate a GoCD test server")]
struct Cli {
    /// JSON configuration file (overridden by environment variables)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    /// Record shell commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the server version and the media types resolved for it
    Version,
    /// Show media types and feature support for a given version (offline)
    MediaTypes(media_types::MediaTypesArgs),
    /// Wait for the server, PostgreSQL (if enabled) and an idle agent
    Wait,
    /// PostgreSQL backend steps
    Postgres(postgres::PostgresArgs),
    /// Extension plugin steps
    Plugin(plugin::PluginArgs),
    /// Authorization steps
    Auth(auth::AuthArgs),
    /// Smoke-test pipeline steps
    Pipeline(pipeline::PipelineArgs),
    /// Start, stop or restart the server or agent init script
    Service(service::ServiceArgs),
    /// Full provisioning: wait, swap addon, set up, validate
    Run,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        config_path: cli.config,
        dry_run: cli.dry_run,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
