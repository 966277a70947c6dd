use serde::Serialize;

use gocd_provision::readiness::{self, ServiceStatus};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Serialize)]
pub struct WaitOutput {
    command: String,
    #[serde(flatten)]
    status: ServiceStatus,
}

pub fn run(_args: (), global: &GlobalArgs) -> CmdResult<WaitOutput> {
    let ctx = Context::load(global)?;
    let status = readiness::service_status(&ctx.client, &ctx.config, None)?;

    Ok((
        WaitOutput {
            command: "wait".to_string(),
            status,
        },
        0,
    ))
}
