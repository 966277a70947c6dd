use clap::{Args, Subcommand};
use serde::Serialize;

use gocd_provision::http::ApiResponse;
use gocd_provision::pipeline::{Pipeline, PipelineRun};

use super::{CmdResult, Context, GlobalArgs};

#[derive(Args)]
pub struct PipelineArgs {
    /// Pipeline name (defaults to PIPELINE_NAME or the configured name)
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: PipelineCommand,
}

#[derive(Subcommand)]
enum PipelineCommand {
    /// Create the pipeline from its JSON definition
    Create {
        /// Definition file (defaults to PIPELINE_DEFINITION or the configured path)
        #[arg(long)]
        definition: Option<String>,
    },
    /// Unpause the pipeline
    Unpause,
    /// Schedule a run
    Trigger,
    /// Poll the dashboard until the first stage passes
    Wait,
    /// Schedule another run and wait for it to pass
    Retrigger,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PipelineResult {
    Api(ApiResponse),
    Run(PipelineRun),
}

#[derive(Serialize)]
pub struct PipelineOutput {
    command: String,
    pipeline: String,
    #[serde(flatten)]
    result: PipelineResult,
}

pub fn run(args: PipelineArgs, global: &GlobalArgs) -> CmdResult<PipelineOutput> {
    let ctx = Context::load(global)?;
    let version = ctx.version()?;
    let name = args.name.unwrap_or_else(|| ctx.config.pipeline.name.clone());
    let pipeline = Pipeline::new(name, &ctx.client, version);
    let spec = ctx.config.timeouts.pipeline();

    let (command, result) = match args.command {
        PipelineCommand::Create { definition } => {
            let path = definition
                .map(|p| std::path::PathBuf::from(&*shellexpand::tilde(&p)))
                .unwrap_or_else(|| ctx.config.pipeline.definition_path.clone());
            ("pipeline.create", PipelineResult::Api(pipeline.create(&path)?))
        }
        PipelineCommand::Unpause => ("pipeline.unpause", PipelineResult::Api(pipeline.unpause()?)),
        PipelineCommand::Trigger => ("pipeline.trigger", PipelineResult::Api(pipeline.trigger()?)),
        PipelineCommand::Wait => (
            "pipeline.wait",
            PipelineResult::Run(pipeline.wait_until_passed(&spec)?),
        ),
        PipelineCommand::Retrigger => (
            "pipeline.retrigger",
            PipelineResult::Run(pipeline.can_retrigger(&spec)?),
        ),
    };

    Ok((
        PipelineOutput {
            command: command.to_string(),
            pipeline: pipeline.name().to_string(),
            result,
        },
        0,
    ))
}
