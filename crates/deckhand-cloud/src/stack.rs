//! Stack reconciliation: create-or-update a CloudFormation stack, then poll
//! it to a terminal status.
//!
//! ```text
//! describe ─┬─ "does not exist" ──> Create ─┐
//!           ├─ exists ─────────────> Update ─┼─> submit ─┬─ "No updates" ──> NoUpdates
//!           └─ other error ──> fail          │           └─ accepted ──> poll
//!                                            │
//! poll: CREATE_COMPLETE | UPDATE_COMPLETE  => done
//!       CREATE_FAILED | ROLLBACK_FAILED |
//!       UPDATE_ROLLBACK_FAILED | UPDATE_ROLLBACK_COMPLETE => fail
//!       anything else => sleep, poll again
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use deckhand_core::{PollConfig, StackParameter};

use crate::aws::AwsClient;
use crate::executor::CommandExecutor;
use crate::tool::ToolError;

/// Marker for templates passed by reference instead of inlined.
pub const REMOTE_TEMPLATE_MARKER: &str = "s3://";

const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

/// Stack status as reported by CloudFormation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    CreateComplete,
    UpdateComplete,
    CreateFailed,
    RollbackFailed,
    UpdateRollbackFailed,
    UpdateRollbackComplete,
    /// Any other status; the stack is still moving.
    Pending(String),
}

impl StackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::Pending(other) => other,
        }
    }

    pub fn outcome(&self) -> StatusOutcome {
        match self {
            StackStatus::CreateComplete | StackStatus::UpdateComplete => StatusOutcome::Succeeded,
            StackStatus::CreateFailed => StatusOutcome::Failed(StackFailure::CreateFailed),
            StackStatus::RollbackFailed => StatusOutcome::Failed(StackFailure::RollbackFailed),
            StackStatus::UpdateRollbackFailed => {
                StatusOutcome::Failed(StackFailure::UpdateRollbackFailed)
            }
            StackStatus::UpdateRollbackComplete => {
                StatusOutcome::Failed(StackFailure::UpdateRolledBack)
            }
            StackStatus::Pending(_) => StatusOutcome::InProgress,
        }
    }
}

impl From<&str> for StackStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "CREATE_FAILED" => StackStatus::CreateFailed,
            "ROLLBACK_FAILED" => StackStatus::RollbackFailed,
            "UPDATE_ROLLBACK_FAILED" => StackStatus::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE" => StackStatus::UpdateRollbackComplete,
            other => StackStatus::Pending(other.to_owned()),
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    InProgress,
    Succeeded,
    Failed(StackFailure),
}

/// Terminal failure statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StackFailure {
    #[error("failed to create the stack")]
    CreateFailed,
    #[error("failed to roll back the stack")]
    RollbackFailed,
    #[error("failed to roll back the stack update")]
    UpdateRollbackFailed,
    #[error("stack update failed and rolled back")]
    UpdateRolledBack,
}

/// Where a stack template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Passed by reference (`--template-url`)
    Url(String),
    /// Read from disk and inlined (`--template-body`)
    Body { path: PathBuf, contents: String },
}

impl TemplateSource {
    /// Templates containing `s3://` are passed by URL; anything else is a
    /// path, joined to `repo_root` when relative, and read.
    pub fn resolve(template: &str, repo_root: &Path) -> Result<Self, StackError> {
        if template.contains(REMOTE_TEMPLATE_MARKER) {
            return Ok(TemplateSource::Url(template.to_owned()));
        }

        let path = repo_root.join(template);
        let contents = std::fs::read_to_string(&path).map_err(|e| StackError::TemplateRead {
            path: path.clone(),
            source: e,
        })?;
        Ok(TemplateSource::Body { path, contents })
    }

    pub(crate) fn as_arg(&self) -> (&'static str, &str) {
        match self {
            TemplateSource::Url(url) => ("--template-url", url),
            TemplateSource::Body { contents, .. } => ("--template-body", contents),
        }
    }
}

/// Everything needed to create or update one stack.
#[derive(Debug, Clone)]
pub struct StackRequest {
    pub stack_name: String,
    pub template: TemplateSource,
    pub parameters: Vec<StackParameter>,
}

impl StackRequest {
    /// Parameters in the CLI's JSON form, so values may contain commas.
    pub fn parameters_json(&self) -> String {
        let entries = self
            .parameters
            .iter()
            .map(|p| serde_json::json!({ "ParameterKey": p.key, "ParameterValue": p.value }))
            .collect();
        serde_json::Value::Array(entries).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Create,
    Update,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LaunchMode::Create => "create",
            LaunchMode::Update => "update",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The mutation was accepted; poll for the result.
    Submitted,
    /// CloudFormation found nothing to change.
    NoUpdates,
}

/// How the stack is polled after a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until a terminal status, however long that takes.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Drives one stack through create-or-update and polling.
pub struct StackReconciler<'a, E: CommandExecutor> {
    aws: &'a AwsClient<E>,
    poll: PollPolicy,
}

impl<'a, E: CommandExecutor> StackReconciler<'a, E> {
    pub fn new(aws: &'a AwsClient<E>, poll: PollPolicy) -> Self {
        Self { aws, poll }
    }

    /// Decide between create and update.
    ///
    /// The stack is always described first so that an unexpected describe
    /// error fails before anything is mutated; `force_create` only turns an
    /// update into a create.
    pub async fn plan(&self, stack_name: &str, force_create: bool) -> Result<LaunchMode, StackError> {
        let status = self.aws.describe_stack_status(stack_name).await?;
        let mode = match status {
            None => LaunchMode::Create,
            Some(_) if force_create => LaunchMode::Create,
            Some(status) => {
                tracing::debug!(stack = stack_name, %status, "stack exists");
                LaunchMode::Update
            }
        };
        tracing::info!(stack = stack_name, %mode, "planned stack launch");
        Ok(mode)
    }

    pub async fn launch(
        &self,
        mode: LaunchMode,
        request: &StackRequest,
    ) -> Result<LaunchOutcome, StackError> {
        let result = match mode {
            LaunchMode::Create => self.aws.create_stack(request).await,
            LaunchMode::Update => self.aws.update_stack(request).await,
        };

        match result {
            Ok(()) => Ok(LaunchOutcome::Submitted),
            Err(e) if e.stderr().is_some_and(|s| s.contains(NO_UPDATES_MESSAGE)) => {
                tracing::info!(stack = %request.stack_name, "nothing to update");
                Ok(LaunchOutcome::NoUpdates)
            }
            Err(e) => Err(StackError::Launch {
                mode,
                stack: request.stack_name.clone(),
                source: e,
            }),
        }
    }

    /// Poll until the stack reaches a terminal status.
    pub async fn watch(&self, stack_name: &str) -> Result<StackStatus, StackError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let status = self
                .aws
                .describe_stack_status(stack_name)
                .await?
                .ok_or_else(|| StackError::Vanished {
                    stack: stack_name.to_owned(),
                })?;
            tracing::debug!(stack = stack_name, %status, attempts, "polled stack");

            match status.outcome() {
                StatusOutcome::Succeeded => return Ok(status),
                StatusOutcome::Failed(failure) => {
                    return Err(StackError::Terminal {
                        stack: stack_name.to_owned(),
                        failure,
                    });
                }
                StatusOutcome::InProgress => {}
            }

            if self.poll.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(StackError::PollLimit {
                    stack: stack_name.to_owned(),
                    attempts,
                    last: status,
                });
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("error checking the status of stack {stack}")]
    Describe { stack: String, source: ToolError },

    #[error("unexpected response from CloudFormation")]
    Parse { source: serde_json::Error },

    #[error("stack {stack} disappeared while polling")]
    Vanished { stack: String },

    #[error("unable to read stack template {}", path.display())]
    TemplateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to {mode} stack {stack}")]
    Launch {
        mode: LaunchMode,
        stack: String,
        source: ToolError,
    },

    #[error("stack {stack}: {failure}")]
    Terminal { stack: String, failure: StackFailure },

    #[error("stack {stack} still {last} after {attempts} status checks")]
    PollLimit {
        stack: String,
        attempts: u32,
        last: StackStatus,
    },
}
