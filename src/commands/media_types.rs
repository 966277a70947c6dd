use clap::Args;
use serde::Serialize;

use gocd_provision::media_type::{self, Resolution};
use gocd_provision::version::GoVersion;

use super::CmdResult;

#[derive(Args)]
pub struct MediaTypesArgs {
    /// GoCD version to resolve for (e.g., 17.12.0 or 18.2.0-6228)
    version: String,
}

#[derive(Serialize)]
pub struct MediaTypesOutput {
    command: String,
    #[serde(flatten)]
    resolution: Resolution,
}

pub fn run_json(args: MediaTypesArgs) -> CmdResult<MediaTypesOutput> {
    let version = GoVersion::parse(&args.version)?;

    Ok((
        MediaTypesOutput {
            command: "media-types".to_string(),
            resolution: media_type::resolve_all(&version),
        },
        0,
    ))
}
