use clap::{Args, Subcommand};
use serde::Serialize;

use gocd_provision::authorization::{self, AuthorizationCheck, AuthorizationSetup};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Create the admin password file and register it with the server
    Setup,
    /// Check that anonymous access is refused and the admin gets in
    Validate,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum AuthResult {
    Setup(AuthorizationSetup),
    Validate(AuthorizationCheck),
}

#[derive(Serialize)]
pub struct AuthOutput {
    command: String,
    #[serde(flatten)]
    result: AuthResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dry_run_commands: Vec<String>,
}

pub fn run(args: AuthArgs, global: &GlobalArgs) -> CmdResult<AuthOutput> {
    let ctx = Context::load(global)?;
    let version = ctx.version()?;

    let (command, result) = match args.command {
        AuthCommand::Setup => {
            let setup =
                authorization::setup(ctx.shell.as_ref(), &ctx.client, &ctx.config, &version)?;
            ("auth.setup", AuthResult::Setup(setup))
        }
        AuthCommand::Validate => {
            let check = authorization::validate(&ctx.client, &version)?;
            ("auth.validate", AuthResult::Validate(check))
        }
    };

    Ok((
        AuthOutput {
            command: command.to_string(),
            result,
            dry_run_commands: ctx.recorded(),
        },
        0,
    ))
}
