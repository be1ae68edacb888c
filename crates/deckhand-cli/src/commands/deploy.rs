use std::time::Duration;

use clap::Args;
use deckhand_cloud::{LaunchOutcome, PollPolicy, StackReconciler, StackRequest, TemplateSource};
use deckhand_core::{PollConfig, StackParameter};

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

const IMAGE_PARAMETER: &str = "ImageID";
const TASK_NAME_PARAMETER: &str = "TaskName";

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Image to deploy [default: latest eligible build in ECR]
    #[arg(long, short = 'c')]
    pub container: Option<String>,

    /// Create the stack instead of updating it
    #[arg(long, short = 'n')]
    pub new_stack: bool,

    /// Seconds between stack status checks [default: poll.interval_secs]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Give up after this many status checks [default: poll.max_attempts, or never]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_polls: Option<u32>,
}

impl DeployArgs {
    fn poll_policy(&self, config: &PollConfig) -> PollPolicy {
        let mut policy = PollPolicy::from(config);
        if let Some(secs) = self.poll_interval {
            policy.interval = Duration::from_secs(secs);
        }
        if self.max_polls.is_some() {
            policy.max_attempts = self.max_polls;
        }
        policy
    }
}

/// Create or update `{env}-{stack}` with the chosen image, then wait for it
/// to settle.
pub async fn deploy(ctx: &Context, args: DeployArgs) -> Result<Completion, Failure> {
    let aws = ctx.aws();
    let stack_name = ctx.stack_name();
    let reconciler = StackReconciler::new(&aws, args.poll_policy(&ctx.config.poll));

    let mode = reconciler
        .plan(&stack_name, args.new_stack)
        .await
        .exit_code(code::STACK_LOOKUP)?;

    let image = match args.container {
        Some(container) => container,
        None => {
            let tag = aws
                .find_latest_build_tag(&ctx.config.name, ctx.config.registry_id(), &ctx.env)
                .await
                .exit_context(
                    code::STACK_LOOKUP,
                    "no container provided and could not find one",
                )?;
            ctx.remote_image(tag).to_string()
        }
    };
    tracing::debug!(image = %image, "deploying image");

    let Some(template) = ctx.config.cf_template.as_deref() else {
        return Err(Failure::new(
            code::COMMAND,
            anyhow::anyhow!("no CloudFormation template set (cf_template)"),
        ));
    };

    let mut parameters = ctx
        .config
        .parameters_for(&ctx.env)
        .exit_code(code::COMMAND)?;
    parameters.extend(injected_parameters(&image, &stack_name));

    let request = StackRequest {
        stack_name: stack_name.clone(),
        template: TemplateSource::resolve(template, &ctx.repo_root).exit_code(code::LAUNCH)?,
        parameters,
    };

    match reconciler
        .launch(mode, &request)
        .await
        .exit_context(code::LAUNCH, "unable to set up stack")?
    {
        LaunchOutcome::NoUpdates => {
            tracing::info!(stack = %stack_name, "Nothing to update");
            return Ok(Completion::NoUpdates);
        }
        LaunchOutcome::Submitted => {}
    }

    let status = reconciler
        .watch(&stack_name)
        .await
        .exit_context(code::WATCH, "stack creation/update was not successful")?;
    tracing::info!(stack = %stack_name, %status, "deploy completed");
    Ok(Completion::Done)
}

/// Parameters every service template receives after its per-env list.
fn injected_parameters(image: &str, task_name: &str) -> [StackParameter; 2] {
    [
        StackParameter::new(IMAGE_PARAMETER, image),
        StackParameter::new(TASK_NAME_PARAMETER, task_name),
    ]
}
