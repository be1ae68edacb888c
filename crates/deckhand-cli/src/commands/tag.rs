use clap::{ArgGroup, Args};
use deckhand_cloud::DockerClient;
use deckhand_core::{Phase, tag};

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("phase").args(["successful", "failure", "deploy"])))]
pub struct TagArgs {
    /// Tag of the source image [default: build tag, or the deployed tag with --find-latest-deploy]
    #[arg(long, short = 'o')]
    pub old_tag: Option<String>,

    /// Tag for the new name [default: derived from env, phase, and time]
    #[arg(long, short = 'n')]
    pub new_tag: Option<String>,

    /// Tag the image as having passed tests
    #[arg(long, short = 's')]
    pub successful: bool,

    /// Tag the image as having failed tests
    #[arg(long, short = 'f')]
    pub failure: bool,

    /// Tag the image as deployed
    #[arg(long, short = 'd')]
    pub deploy: bool,

    /// Timestamp for the new tag (YYMMDDHHmm) [default: now]
    #[arg(long = "time", short = 't', value_name = "TIME")]
    pub time: Option<String>,

    /// Use the image currently deployed to this env's stack as the source
    #[arg(long)]
    pub find_latest_deploy: bool,

    /// Source image is local (`{name}:{tag}`)
    #[arg(long)]
    pub local: bool,

    /// Print the new image name to stdout
    #[arg(long)]
    pub output_new_name: bool,
}

impl TagArgs {
    fn phase(&self) -> Option<Phase> {
        if self.deploy {
            Some(Phase::Deploy)
        } else if self.successful {
            Some(Phase::Pass)
        } else if self.failure {
            Some(Phase::Fail)
        } else {
            None
        }
    }
}

pub async fn tag(ctx: &Context, args: TagArgs) -> Result<Completion, Failure> {
    let aws = ctx.aws();
    let docker = DockerClient::new();
    super::registry_login(ctx, &aws, &docker).await?;

    let old_tag = match &args.old_tag {
        Some(old) => old.clone(),
        None if args.find_latest_deploy => aws
            .find_latest_deploy_tag(&ctx.stack_name())
            .await
            .exit_context(code::COMMAND, "could not look up the deployed image")?,
        None => ctx.build_tag.clone(),
    };
    let old = if args.local {
        ctx.local_image(old_tag)
    } else {
        ctx.remote_image(old_tag)
    };

    let new_tag = match &args.new_tag {
        Some(new) => new.clone(),
        None => tag::derive_tag(&ctx.env, args.time.as_deref(), args.phase()),
    };
    let new = ctx.remote_image(new_tag);
    tracing::debug!(%old, %new, "tagging");

    docker
        .tag(&old.to_string(), &new.to_string())
        .await
        .exit_context(code::IMAGE, "failed tagging image")?;

    if args.output_new_name {
        println!("{new}");
    }
    Ok(Completion::Done)
}
