use deckhand_core::ImageRef;

use crate::docker::{DockerClient, DockerError};
use crate::executor::CommandExecutor;
use crate::git::{GitClient, GitError};

/// Which images a cleanup removes. Exactly one strategy applies per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupTarget {
    /// The image this CI job built locally; removed by name.
    Local(ImageRef),
    /// Every tag of a named image.
    Named(String),
    /// Every image matching a `KEY=VALUE` label; `None` means the
    /// current commit's provenance label.
    Label(Option<String>),
}

impl CleanupTarget {
    /// Pick the strategy: `local` wins over `container`, which wins over `label`.
    pub fn select(
        local: bool,
        container: Option<&str>,
        label: Option<&str>,
        service_name: &str,
        build_tag: &str,
    ) -> Self {
        if local {
            CleanupTarget::Local(ImageRef::local(service_name, build_tag))
        } else if let Some(container) = container.filter(|c| !c.is_empty()) {
            CleanupTarget::Named(container.to_owned())
        } else {
            CleanupTarget::Label(label.filter(|l| !l.is_empty()).map(str::to_owned))
        }
    }
}

/// Removes the images a [`CleanupTarget`] selects.
pub struct Cleaner<'a, D: CommandExecutor, G: CommandExecutor> {
    docker: &'a DockerClient<D>,
    git: &'a GitClient<G>,
}

impl<'a, D: CommandExecutor, G: CommandExecutor> Cleaner<'a, D, G> {
    pub fn new(docker: &'a DockerClient<D>, git: &'a GitClient<G>) -> Self {
        Self { docker, git }
    }

    /// Returns what was removed: repository tags for name-based targets,
    /// image ids for label-based ones.
    pub async fn run(&self, target: &CleanupTarget) -> Result<Vec<String>, CleanupError> {
        match target {
            CleanupTarget::Local(image) => self.remove_all_tags(&image.to_string()).await,
            CleanupTarget::Named(name) => self.remove_all_tags(name).await,
            CleanupTarget::Label(label) => {
                let filter = match label {
                    Some(raw) => format!("label={raw}"),
                    None => self.git.commit_label().await?.filter(),
                };
                tracing::info!(%filter, "removing images by label");
                Ok(self.docker.remove_by_filter(&filter).await?)
            }
        }
    }

    /// Remove each repository tag of `name`, one `rmi` per tag.
    async fn remove_all_tags(&self, name: &str) -> Result<Vec<String>, CleanupError> {
        let tags = self.docker.repo_tags(name).await?;
        tracing::debug!(image = name, ?tags, "found tags");

        for tag in &tags {
            self.docker.remove(tag).await?;
        }
        Ok(tags)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("unable to build commit label")]
    CommitLabel(#[from] GitError),

    #[error("failed to clean up images")]
    Docker(#[from] DockerError),
}
