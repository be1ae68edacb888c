use std::path::{Path, PathBuf};

use deckhand_cloud::{AwsClient, GitClient};
use deckhand_core::{ImageRef, ServiceConfig, tag};

use crate::exit::{ExitContext, Failure, code};

/// Everything a command needs, resolved once per invocation.
#[derive(Debug)]
pub struct Context {
    pub env: String,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub repo_root: PathBuf,
    pub config: ServiceConfig,
    /// CI build tag, `latest` outside CI.
    pub build_tag: String,
    pub debug: bool,
}

impl Context {
    /// Locate the repository and load its service config.
    pub async fn load(
        env: String,
        region: Option<String>,
        profile: Option<String>,
        config_path: Option<&Path>,
        debug: bool,
    ) -> Result<Self, Failure> {
        let repo_root = GitClient::new().toplevel().await.exit_code(code::SETUP)?;
        tracing::debug!(root = %repo_root.display(), "found repository");

        let config = ServiceConfig::load(&repo_root, config_path)
            .exit_context(code::SETUP, "error loading service config")?;

        Ok(Self {
            env,
            region,
            profile,
            repo_root,
            config,
            build_tag: tag::build_tag_from_env(),
            debug,
        })
    }

    pub fn aws(&self) -> AwsClient {
        AwsClient::new(self.region.clone(), self.profile.clone())
    }

    /// `{ecr_repo}/{name}:{tag}`
    pub fn remote_image(&self, tag: impl Into<String>) -> ImageRef {
        ImageRef::remote(&self.config.ecr_repo, &self.config.name, tag)
    }

    /// `{name}:{tag}`
    pub fn local_image(&self, tag: impl Into<String>) -> ImageRef {
        ImageRef::local(&self.config.name, tag)
    }

    pub fn stack_name(&self) -> String {
        self.config.stack_name(&self.env)
    }
}
