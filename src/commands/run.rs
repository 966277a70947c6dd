use serde::Serialize;

use gocd_provision::provision::{ProvisionReport, ServerConfiguration};
use gocd_provision::readiness;

use super::{CmdResult, Context, GlobalArgs};

#[derive(Serialize)]
pub struct RunOutput {
    command: String,
    dry_run: bool,
    #[serde(flatten)]
    report: ProvisionReport,
}

pub fn run(_args: (), global: &GlobalArgs) -> CmdResult<RunOutput> {
    let ctx = Context::load(global)?;

    // The version endpoint only answers once the server is listening.
    readiness::wait_to_start(&ctx.client, &ctx.config.timeouts.server_start())?;
    let server = readiness::server_version(&ctx.client)?;

    let report =
        ServerConfiguration::new(server, &ctx.config, &ctx.client, ctx.shell.as_ref())?.run()?;

    Ok((
        RunOutput {
            command: "run".to_string(),
            dry_run: global.dry_run,
            report,
        },
        0,
    ))
}
