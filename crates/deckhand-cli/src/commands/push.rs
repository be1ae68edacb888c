use clap::Args;
use deckhand_cloud::DockerClient;

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Tag to push [default: current build tag]
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Full name of the image to push [default: {ecr_repo}/{name}:{tag}]
    #[arg(long, short = 'c')]
    pub container: Option<String>,
}

pub async fn push(ctx: &Context, args: PushArgs) -> Result<Completion, Failure> {
    let aws = ctx.aws();
    let docker = DockerClient::new();
    super::registry_login(ctx, &aws, &docker).await?;

    let image = match args.container {
        Some(container) => container,
        None => {
            let tag = args.tag.unwrap_or_else(|| ctx.build_tag.clone());
            ctx.remote_image(tag).to_string()
        }
    };

    tracing::debug!(image = %image, "pushing");
    docker.push(&image).await.exit_code(code::IMAGE)?;
    Ok(Completion::Done)
}
