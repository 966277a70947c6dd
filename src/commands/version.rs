use serde::Serialize;

use gocd_provision::media_type::{self, Resolution};
use gocd_provision::readiness;
use gocd_provision::version::ServerVersion;

use super::{CmdResult, Context, GlobalArgs};

#[derive(Serialize)]
pub struct VersionOutput {
    command: String,
    server: ServerVersion,
    resolution: Resolution,
}

pub fn run(_args: (), global: &GlobalArgs) -> CmdResult<VersionOutput> {
    let ctx = Context::load(global)?;
    let server = readiness::server_version(&ctx.client)?;
    let resolution = media_type::resolve_all(&server.go_version()?);

    Ok((
        VersionOutput {
            command: "version".to_string(),
            server,
            resolution,
        },
        0,
    ))
}
