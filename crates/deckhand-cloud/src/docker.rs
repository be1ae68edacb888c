use std::path::PathBuf;

use deckhand_core::{ImageRef, Label};

use crate::executor::{CommandExecutor, RealExecutor, args};
use crate::tool::{Tool, ToolError};

/// A `docker build` invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub image: ImageRef,
    pub dockerfile: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    pub labels: Vec<Label>,
    /// Passed to the engine verbatim, one argv entry each
    pub extra_args: Vec<String>,
    /// Forward engine output instead of capturing it
    pub show_output: bool,
}

impl BuildRequest {
    pub fn to_args(&self) -> Vec<String> {
        let mut cmd = vec!["build".to_owned(), "-t".to_owned(), self.image.to_string()];
        for label in &self.labels {
            cmd.push("--label".to_owned());
            cmd.push(label.to_string());
        }
        cmd.extend(self.extra_args.iter().cloned());
        cmd.push("-f".to_owned());
        cmd.push(self.dockerfile.display().to_string());
        cmd.push(self.context.display().to_string());
        cmd
    }
}

/// A throwaway `docker run --rm` invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image: ImageRef,
    pub env: Vec<(String, String)>,
    pub volumes: Vec<String>,
    pub command: Vec<String>,
}

impl RunRequest {
    pub fn to_args(&self) -> Vec<String> {
        let mut cmd = args(["run", "--rm"]);
        for (key, value) in &self.env {
            cmd.push("-e".to_owned());
            cmd.push(format!("{key}={value}"));
        }
        for volume in &self.volumes {
            cmd.push("-v".to_owned());
            cmd.push(volume.clone());
        }
        cmd.push(self.image.to_string());
        cmd.extend(self.command.iter().cloned());
        cmd
    }
}

/// Container engine operations, parameterized over the executor for testability.
pub struct DockerClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new(Tool::Docker),
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Build / Run ──

    pub async fn build(&self, request: &BuildRequest) -> Result<(), DockerError> {
        let cmd = request.to_args();
        let result = if request.show_output {
            self.executor.exec_streaming(&cmd).await
        } else {
            self.executor.exec(&cmd).await.map(drop)
        };
        result.map_err(|e| DockerError::Build {
            image: request.image.to_string(),
            source: e,
        })
    }

    pub async fn run(&self, request: &RunRequest) -> Result<(), DockerError> {
        self.executor
            .exec_streaming(&request.to_args())
            .await
            .map_err(|e| DockerError::Run {
                image: request.image.to_string(),
                source: e,
            })
    }

    // ── Registry ──

    /// Log in with a password piped over stdin.
    pub async fn login(
        &self,
        registry: &str,
        username: &str,
        password: &str,
    ) -> Result<(), DockerError> {
        self.executor
            .exec_with_stdin(
                &args(["login", "--username", username, "--password-stdin", registry]),
                password.as_bytes(),
            )
            .await
            .map_err(|e| DockerError::Login {
                registry: registry.to_owned(),
                source: e,
            })?;
        Ok(())
    }

    /// Push an image. Assumes the engine is already logged in to its registry.
    pub async fn push(&self, image: &str) -> Result<(), DockerError> {
        self.executor
            .exec_streaming(&args(["push", image]))
            .await
            .map_err(|e| DockerError::Push {
                image: image.to_owned(),
                source: e,
            })
    }

    pub async fn pull(&self, image: &str) -> Result<(), DockerError> {
        tracing::info!(image, "attempting to pull image");
        self.executor
            .exec_streaming(&args(["pull", image]))
            .await
            .map_err(|e| DockerError::Pull {
                image: image.to_owned(),
                source: e,
            })
    }

    /// Tag `old` as `new`, pulling `old` first when it is not cached locally.
    pub async fn tag(&self, old: &str, new: &str) -> Result<(), DockerError> {
        if !self.is_cached(old).await? {
            self.pull(old).await?;
        }

        self.executor
            .exec_streaming(&args(["tag", old, new]))
            .await
            .map_err(|e| DockerError::Tag {
                old: old.to_owned(),
                new: new.to_owned(),
                source: e,
            })
    }

    // ── Local cache ──

    /// Whether `image` (`REPOSITORY:TAG`) is in the local image cache.
    ///
    /// Compares against the full listing; no partial matches.
    pub async fn is_cached(&self, image: &str) -> Result<bool, DockerError> {
        let out = self
            .executor
            .exec(&args(["images", "--format={{.Repository}}:{{.Tag}}"]))
            .await
            .map_err(|e| DockerError::ListImages { source: e })?;

        let wanted = image.trim();
        Ok(out.lines().any(|line| line.trim() == wanted))
    }

    /// Every `REPOSITORY:TAG` the image known as `image` carries.
    pub async fn repo_tags(&self, image: &str) -> Result<Vec<String>, DockerError> {
        let out = self
            .executor
            .exec(&args(["inspect", "--format={{json .RepoTags}}", image]))
            .await
            .map_err(|e| DockerError::Inspect {
                image: image.to_owned(),
                source: e,
            })?;

        serde_json::from_str(out.trim()).map_err(|e| DockerError::ParseRepoTags {
            image: image.to_owned(),
            source: e,
        })
    }

    /// Distinct image IDs matching a `docker images --filter` expression, in listing order.
    pub async fn image_ids(&self, filter: &str) -> Result<Vec<String>, DockerError> {
        let out = self
            .executor
            .exec(&args(["images", "-f", filter, "--format={{.ID}}"]))
            .await
            .map_err(|e| DockerError::FindByFilter {
                filter: filter.to_owned(),
                source: e,
            })?;
        Ok(distinct_ids(&out))
    }

    // ── Removal ──

    pub async fn remove(&self, image: &str) -> Result<(), DockerError> {
        tracing::debug!(image, "removing image");
        self.executor
            .exec(&args(["rmi", image]))
            .await
            .map_err(|e| DockerError::Remove {
                image: image.to_owned(),
                source: e,
            })?;
        Ok(())
    }

    /// Force-remove a batch of image IDs in one call.
    pub async fn remove_ids(&self, ids: &[String]) -> Result<(), DockerError> {
        let mut cmd = args(["rmi", "-f"]);
        cmd.extend(ids.iter().cloned());
        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| DockerError::RemoveIds {
                ids: ids.to_vec(),
                source: e,
            })
    }

    /// Remove every image matching `filter` (e.g. `label=KEY=VALUE`) in one batch.
    ///
    /// Returns the distinct ids removed.
    pub async fn remove_by_filter(&self, filter: &str) -> Result<Vec<String>, DockerError> {
        let ids = self.image_ids(filter).await?;
        if ids.is_empty() {
            return Err(DockerError::NoImagesFound {
                filter: filter.to_owned(),
            });
        }

        self.remove_ids(&ids).await?;
        Ok(ids)
    }
}

/// Non-empty lines of `output`, first occurrence kept.
pub fn distinct_ids(output: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_owned());
        }
    }
    ids
}

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("unable to build image {image}")]
    Build { image: String, source: ToolError },

    #[error("error running container {image}")]
    Run { image: String, source: ToolError },

    #[error("error logging in to registry {registry}")]
    Login { registry: String, source: ToolError },

    #[error("an error occurred pushing {image}")]
    Push { image: String, source: ToolError },

    #[error("an error occurred pulling {image}")]
    Pull { image: String, source: ToolError },

    #[error("error tagging {old} as {new}")]
    Tag {
        old: String,
        new: String,
        source: ToolError,
    },

    #[error("unable to list local images")]
    ListImages { source: ToolError },

    #[error("error getting all tags for {image}")]
    Inspect { image: String, source: ToolError },

    #[error("unexpected tag listing for {image}")]
    ParseRepoTags {
        image: String,
        source: serde_json::Error,
    },

    #[error("unable to find images using filter '{filter}'")]
    FindByFilter { filter: String, source: ToolError },

    #[error("no images found using filter '{filter}'")]
    NoImagesFound { filter: String },

    #[error("error removing image {image}")]
    Remove { image: String, source: ToolError },

    #[error("unable to delete images {ids:?}")]
    RemoveIds { ids: Vec<String>, source: ToolError },
}
