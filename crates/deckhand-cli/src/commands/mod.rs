mod build;
mod cleanup;
mod deploy;
mod push;
mod tag;
mod test;

use deckhand_cloud::{AwsClient, DockerClient};

use crate::context::Context;
use crate::exit::{ExitContext, Failure, code};

pub use build::{BuildArgs, build};
pub use cleanup::{CleanupArgs, cleanup};
pub use deploy::{DeployArgs, deploy};
pub use push::{PushArgs, push};
pub use tag::{TagArgs, tag};
pub use test::{TestArgs, test};

/// Log the engine in to the service's ECR registry.
async fn registry_login(
    ctx: &Context,
    aws: &AwsClient,
    docker: &DockerClient,
) -> Result<(), Failure> {
    tracing::debug!(registry = ctx.config.registry_host(), "logging in to ECR");
    deckhand_cloud::ecr_login(aws, docker, ctx.config.registry_host())
        .await
        .exit_code(code::SETUP)
}
