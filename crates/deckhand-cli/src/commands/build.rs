use clap::Args;
use deckhand_cloud::{BuildRequest, DockerClient, GitClient};
use deckhand_core::{Label, tag};

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Print docker build output to stderr
    #[arg(long)]
    pub docker_output: bool,

    /// Extra `docker build` arguments as one whitespace-separated string.
    /// Split without a shell; only pass trusted input.
    #[arg(long, allow_hyphen_values = true, value_name = "ARGS")]
    pub docker_args: Option<String>,

    /// Extra `docker build` arguments, passed through verbatim
    #[arg(last = true, value_name = "ARGS")]
    pub extra: Vec<String>,
}

/// Build `{name}:{build tag}` from the repository root, labelled with its
/// commit and build date.
pub async fn build(ctx: &Context, args: BuildArgs) -> Result<Completion, Failure> {
    let dockerfile = ctx.config.dockerfile_path(&ctx.repo_root);
    if !dockerfile.is_file() {
        return Err(Failure::new(
            code::SETUP,
            anyhow::anyhow!("could not find Dockerfile at {}", dockerfile.display()),
        ));
    }

    let sha = GitClient::new()
        .short_sha("HEAD")
        .await
        .exit_code(code::SETUP)?;

    let mut labels = vec![Label::commit(&sha), Label::build_date(&tag::timestamp_now())];
    labels.extend(ctx.config.static_labels().exit_code(code::SETUP)?);

    let request = BuildRequest {
        image: ctx.local_image(&ctx.build_tag),
        dockerfile,
        context: ctx.repo_root.clone(),
        labels,
        extra_args: extra_args(args.docker_args.as_deref(), args.extra),
        show_output: args.docker_output || ctx.debug,
    };
    tracing::debug!(image = %request.image, "building container");

    DockerClient::new()
        .build(&request)
        .await
        .exit_context(code::IMAGE, "unable to build service container")?;

    tracing::info!(image = %request.image, "build completed");
    Ok(Completion::Done)
}

/// Free-form arguments first, then the verbatim ones.
fn extra_args(free_form: Option<&str>, verbatim: Vec<String>) -> Vec<String> {
    free_form
        .unwrap_or_default()
        .split_ascii_whitespace()
        .map(str::to_owned)
        .chain(verbatim)
        .collect()
}
