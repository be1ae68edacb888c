use clap::Args;
use deckhand_cloud::{Cleaner, CleanupTarget, DockerClient, GitClient};

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// `KEY=VALUE` label to match [default: this commit's label]
    #[arg(long, short = 'l')]
    pub label: Option<String>,

    /// Remove every tag of this image
    #[arg(long)]
    pub container: Option<String>,

    /// Remove the image this CI job built locally
    #[arg(long)]
    pub local: bool,
}

pub async fn cleanup(ctx: &Context, args: CleanupArgs) -> Result<Completion, Failure> {
    let target = CleanupTarget::select(
        args.local,
        args.container.as_deref(),
        args.label.as_deref(),
        &ctx.config.name,
        &ctx.build_tag,
    );
    tracing::debug!(?target, "cleaning up");

    let docker = DockerClient::new();
    let git = GitClient::new();
    let removed = Cleaner::new(&docker, &git)
        .run(&target)
        .await
        .exit_code(code::COMMAND)?;

    tracing::info!(count = removed.len(), "completed successfully");
    Ok(Completion::Done)
}
