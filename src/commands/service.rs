use clap::Args;
use serde::Serialize;

use gocd_provision::service::{self, Action, Service};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Args)]
pub struct ServiceArgs {
    /// Which init script to drive
    #[arg(value_enum)]
    service: Service,
    #[arg(value_enum)]
    action: Action,
}

#[derive(Serialize)]
pub struct ServiceOutput {
    command: String,
    service: Service,
    action: Action,
    issued: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dry_run_commands: Vec<String>,
}

pub fn run(args: ServiceArgs, global: &GlobalArgs) -> CmdResult<ServiceOutput> {
    let ctx = Context::load(global)?;
    let issued = service::control(ctx.shell.as_ref(), &ctx.config.layout, args.service, args.action)?;

    Ok((
        ServiceOutput {
            command: "service".to_string(),
            service: args.service,
            action: args.action,
            issued,
            dry_run_commands: ctx.recorded(),
        },
        0,
    ))
}
