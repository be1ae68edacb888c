//! Docker, AWS CLI, and git operations for deckhand.
//!
//! Every client is generic over a [`CommandExecutor`] so that tests can
//! script the external tools with mocks.

pub mod aws;
pub mod cleanup;
pub mod docker;
pub mod executor;
pub mod git;
pub mod stack;
pub mod tool;

pub use aws::{AwsClient, DeployTagError, RegistryError};
pub use cleanup::{Cleaner, CleanupError, CleanupTarget};
pub use docker::{BuildRequest, DockerClient, DockerError, RunRequest};
pub use executor::{CommandExecutor, RealExecutor};
pub use git::{GitClient, GitError};
pub use stack::{
    LaunchMode, LaunchOutcome, PollPolicy, StackError, StackFailure, StackReconciler,
    StackRequest, StackStatus, TemplateSource,
};
pub use tool::{Tool, ToolError};

/// Log the container engine in to the ECR registry at `registry_host`.
pub async fn ecr_login<A: CommandExecutor, D: CommandExecutor>(
    aws: &AwsClient<A>,
    docker: &DockerClient<D>,
    registry_host: &str,
) -> Result<(), LoginError> {
    let password = aws.ecr_login_password().await?;
    docker.login(registry_host, "AWS", &password).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Credentials(#[from] RegistryError),

    #[error("error setting up login credentials with docker")]
    Docker(#[from] DockerError),
}
