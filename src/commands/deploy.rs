use clap::Args;
use serde::Serialize;

use deckhand::config;
use deckhand::exec::SystemRunner;
use deckhand::pipeline::{self, PipelinePlan, PipelineRunResult};

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {
    /// Render the step plan without executing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: &'static str,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PipelinePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PipelineRunResult>,
}

pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let cfg = config::load();

    if args.dry_run {
        let plan = pipeline::plan(&cfg)?;
        return Ok((
            DeployOutput {
                command: "deploy.plan",
                dry_run: true,
                plan: Some(plan),
                result: None,
            },
            0,
        ));
    }

    let result = pipeline::run(&cfg, &SystemRunner)?;

    // A failed step propagates the failing tool's own exit status.
    let exit_code = result.failing_exit_code().unwrap_or(0);

    Ok((
        DeployOutput {
            command: "deploy.run",
            dry_run: false,
            plan: None,
            result: Some(result),
        },
        exit_code,
    ))
}
