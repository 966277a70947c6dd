use clap::{Args, Subcommand};
use serde::Serialize;

use gocd_provision::postgres::{self, AddonSwap, PostgresSetup};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Args)]
pub struct PostgresArgs {
    #[command(subcommand)]
    command: PostgresCommand,
}

#[derive(Subcommand)]
enum PostgresCommand {
    /// Switch the stopped server to the PostgreSQL backend
    Setup {
        /// Core version (<version>-<build>); defaults to GO_VERSION, then the running server
        #[arg(long)]
        version: Option<String>,
    },
    /// Replace the addon jar for another server build and restart
    Swap {
        /// Core version (<version>-<build>); defaults to GO_VERSION, then the running server
        #[arg(long)]
        version: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PostgresResult {
    Setup(PostgresSetup),
    Swap(AddonSwap),
}

#[derive(Serialize)]
pub struct PostgresOutput {
    command: String,
    #[serde(flatten)]
    result: PostgresResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dry_run_commands: Vec<String>,
}

pub fn run(args: PostgresArgs, global: &GlobalArgs) -> CmdResult<PostgresOutput> {
    let ctx = Context::load(global)?;

    let (command, result) = match args.command {
        PostgresCommand::Setup { version } => {
            let core = ctx.core(version)?;
            let setup = postgres::setup_postgres_addon(ctx.shell.as_ref(), &ctx.config, &core)?;
            ("postgres.setup", PostgresResult::Setup(setup))
        }
        PostgresCommand::Swap { version } => {
            let core = ctx.core(version)?;
            let swap =
                postgres::change_postgres_addons_jar(ctx.shell.as_ref(), &ctx.config, &core)?;
            ("postgres.swap", PostgresResult::Swap(swap))
        }
    };

    Ok((
        PostgresOutput {
            command: command.to_string(),
            result,
            dry_run_commands: ctx.recorded(),
        },
        0,
    ))
}
