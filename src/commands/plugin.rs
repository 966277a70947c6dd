use clap::{Args, Subcommand};
use serde::Serialize;

use gocd_provision::plugin::{self, InstallOutcome, Plugin, PluginCheck};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    command: PluginCommand,
}

#[derive(Subcommand)]
enum PluginCommand {
    /// Download the plugin, restart the server and wait for it
    Install {
        #[arg(value_enum)]
        plugin: Plugin,
    },
    /// Check that the plugin jar is in place
    Verify {
        #[arg(value_enum)]
        plugin: Plugin,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PluginResult {
    Install(InstallOutcome),
    Verify(PluginCheck),
}

#[derive(Serialize)]
pub struct PluginOutput {
    command: String,
    #[serde(flatten)]
    result: PluginResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dry_run_commands: Vec<String>,
}

pub fn run(args: PluginArgs, global: &GlobalArgs) -> CmdResult<PluginOutput> {
    let ctx = Context::load(global)?;

    let (command, result) = match args.command {
        PluginCommand::Install { plugin } => {
            let version = ctx.version()?;
            let outcome = plugin::install(
                ctx.shell.as_ref(),
                &ctx.client,
                &ctx.config,
                &version,
                plugin,
            )?;
            ("plugin.install", PluginResult::Install(outcome))
        }
        PluginCommand::Verify { plugin } => {
            let check = plugin::verify(&ctx.config, plugin)?;
            ("plugin.verify", PluginResult::Verify(check))
        }
    };

    Ok((
        PluginOutput {
            command: command.to_string(),
            result,
            dry_run_commands: ctx.recorded(),
        },
        0,
    ))
}
