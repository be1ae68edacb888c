use std::path::PathBuf;

use deckhand_core::Label;

use crate::executor::{CommandExecutor, RealExecutor, args};
use crate::tool::{Tool, ToolError};

/// Source-control lookups.
pub struct GitClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl GitClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new(Tool::Git),
        }
    }
}

impl Default for GitClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> GitClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// Top-level directory of the enclosing repository.
    pub async fn toplevel(&self) -> Result<PathBuf, GitError> {
        let out = self
            .executor
            .exec(&args(["rev-parse", "--show-toplevel"]))
            .await
            .map_err(|e| GitError::Toplevel { source: e })?;
        Ok(PathBuf::from(out.trim()))
    }

    /// Abbreviated SHA of `rev`.
    pub async fn short_sha(&self, rev: &str) -> Result<String, GitError> {
        let out = self
            .executor
            .exec(&args(["rev-parse", "--short", rev]))
            .await
            .map_err(|e| GitError::RevParse {
                rev: rev.to_owned(),
                source: e,
            })?;
        Ok(out.trim().to_owned())
    }

    /// Provenance label for the current `HEAD`.
    pub async fn commit_label(&self) -> Result<Label, GitError> {
        let sha = self.short_sha("HEAD").await?;
        Ok(Label::commit(&sha))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("error looking up top level of the repository")]
    Toplevel { source: ToolError },

    #[error("error looking up the git SHA for {rev}")]
    RevParse { rev: String, source: ToolError },
}
