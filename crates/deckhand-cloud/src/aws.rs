use deckhand_core::{ImageRef, TagMatcher, tag};
use serde::Deserialize;

use crate::executor::{CommandExecutor, RealExecutor};
use crate::stack::{StackError, StackRequest, StackStatus};
use crate::tool::{Tool, ToolError};

/// Logical id of the task definition resource in service stacks.
pub const TASK_DEFINITION_RESOURCE: &str = "taskdefinition";

/// AWS CLI operations, parameterized over the executor for testability.
///
/// Every command carries `--output json` plus the configured region/profile.
pub struct AwsClient<E: CommandExecutor = RealExecutor> {
    executor: E,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsClient<RealExecutor> {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self::with_executor(RealExecutor::new(Tool::Aws), region, profile)
    }
}

impl<E: CommandExecutor> AwsClient<E> {
    pub fn with_executor(executor: E, region: Option<String>, profile: Option<String>) -> Self {
        Self {
            executor,
            region: region.filter(|r| !r.is_empty()),
            profile: profile.filter(|p| !p.is_empty()),
        }
    }

    fn command<'a>(&self, base: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut cmd = self.command_raw(base);
        cmd.push("--output".to_owned());
        cmd.push("json".to_owned());
        cmd
    }

    /// `base` plus region/profile, without an output format.
    fn command_raw<'a>(&self, base: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut cmd: Vec<String> = base.into_iter().map(str::to_owned).collect();
        if let Some(region) = &self.region {
            cmd.push("--region".to_owned());
            cmd.push(region.clone());
        }
        if let Some(profile) = &self.profile {
            cmd.push("--profile".to_owned());
            cmd.push(profile.clone());
        }
        cmd
    }

    // ── ECR ──

    /// Short-lived registry password for `docker login --password-stdin`.
    pub async fn ecr_login_password(&self) -> Result<String, RegistryError> {
        let cmd = self.command_raw(["ecr", "get-login-password"]);

        let out = self
            .executor
            .exec(&cmd)
            .await
            .map_err(|e| RegistryError::Login { source: e })?;
        Ok(out.trim().to_owned())
    }

    /// All tags in an ECR repository, following pagination. Untagged images are skipped.
    pub async fn list_image_tags(
        &self,
        repository: &str,
        registry_id: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let mut tags = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut cmd = self.command([
                "ecr",
                "list-images",
                "--repository-name",
                repository,
                "--registry-id",
                registry_id,
            ]);
            if let Some(token) = &next_token {
                cmd.push("--starting-token".to_owned());
                cmd.push(token.clone());
            }

            let out = self
                .executor
                .exec(&cmd)
                .await
                .map_err(|e| RegistryError::List {
                    repository: repository.to_owned(),
                    source: e,
                })?;
            let page: ListImagesPage =
                serde_json::from_str(&out).map_err(|e| RegistryError::Parse { source: e })?;

            tags.extend(
                page.image_ids
                    .into_iter()
                    .filter_map(|id| id.image_tag)
                    .filter(|t| !t.is_empty()),
            );

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(tags)
    }

    /// Newest build tag eligible for `env` (see [`TagMatcher::latest_build`]).
    ///
    /// "Newest" is the lexicographic maximum, which is only chronological
    /// because tag timestamps are fixed-width.
    pub async fn find_latest_build_tag(
        &self,
        repository: &str,
        registry_id: &str,
        env: &str,
    ) -> Result<String, RegistryError> {
        let matcher = TagMatcher::latest_build(env)?;
        let tags = self.list_image_tags(repository, registry_id).await?;
        tracing::debug!(count = tags.len(), pattern = matcher.as_str(), "filtering registry tags");

        tag::latest(tags.into_iter().filter(|t| matcher.is_match(t))).ok_or_else(|| {
            RegistryError::NoMatchingTag {
                repository: repository.to_owned(),
                pattern: matcher.as_str().to_owned(),
            }
        })
    }

    // ── CloudFormation ──

    /// Current status of a stack, or `None` if it does not exist.
    pub async fn describe_stack_status(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackStatus>, StackError> {
        let cmd = self.command([
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            stack_name,
        ]);

        let out = match self.executor.exec(&cmd).await {
            Ok(out) => out,
            Err(e) if e.stderr().is_some_and(|s| s.contains("does not exist")) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(StackError::Describe {
                    stack: stack_name.to_owned(),
                    source: e,
                });
            }
        };

        let parsed: DescribeStacks =
            serde_json::from_str(&out).map_err(|e| StackError::Parse { source: e })?;
        Ok(parsed
            .stacks
            .into_iter()
            .next()
            .map(|s| StackStatus::from(s.stack_status.as_str())))
    }

    pub async fn create_stack(&self, request: &StackRequest) -> Result<(), ToolError> {
        let cmd = self.stack_mutation("create-stack", request);
        self.executor.exec(&cmd).await.map(drop)
    }

    pub async fn update_stack(&self, request: &StackRequest) -> Result<(), ToolError> {
        let cmd = self.stack_mutation("update-stack", request);
        self.executor.exec(&cmd).await.map(drop)
    }

    fn stack_mutation(&self, action: &str, request: &StackRequest) -> Vec<String> {
        let (template_flag, template) = request.template.as_arg();
        let parameters = request.parameters_json();
        let mut base = vec![
            "cloudformation",
            action,
            "--stack-name",
            request.stack_name.as_str(),
            template_flag,
            template,
        ];
        if !request.parameters.is_empty() {
            base.push("--parameters");
            base.push(&parameters);
        }

        self.command(base)
    }

    /// Physical id of a logical resource in a stack.
    pub async fn stack_resource_id(
        &self,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String, DeployTagError> {
        let cmd = self.command([
            "cloudformation",
            "list-stack-resources",
            "--stack-name",
            stack_name,
        ]);
        let out = self
            .executor
            .exec(&cmd)
            .await
            .map_err(|e| DeployTagError::ListResources {
                stack: stack_name.to_owned(),
                source: e,
            })?;
        let parsed: ListStackResources =
            serde_json::from_str(&out).map_err(|e| DeployTagError::Parse { source: e })?;

        parsed
            .summaries
            .into_iter()
            .find(|r| r.logical_id == logical_id)
            .and_then(|r| r.physical_id)
            .ok_or_else(|| DeployTagError::ResourceNotFound {
                stack: stack_name.to_owned(),
                logical_id: logical_id.to_owned(),
            })
    }

    // ── ECS ──

    /// Container `(name, image)` pairs of a task definition.
    pub async fn task_definition_images(
        &self,
        task_definition: &str,
    ) -> Result<Vec<(String, String)>, DeployTagError> {
        let cmd = self.command([
            "ecs",
            "describe-task-definition",
            "--task-definition",
            task_definition,
        ]);
        let out = self
            .executor
            .exec(&cmd)
            .await
            .map_err(|e| DeployTagError::DescribeTaskDefinition {
                task_definition: task_definition.to_owned(),
                source: e,
            })?;
        let parsed: DescribeTaskDefinition =
            serde_json::from_str(&out).map_err(|e| DeployTagError::Parse { source: e })?;

        Ok(parsed
            .task_definition
            .container_definitions
            .into_iter()
            .map(|c| (c.name, c.image))
            .collect())
    }

    /// Tag of the image currently running in a stack's task definition.
    ///
    /// A single-container task is unambiguous. Otherwise the container is the
    /// one named after the first two `-`-separated segments of the stack name
    /// (`{env}-{service}`).
    pub async fn find_latest_deploy_tag(&self, stack_name: &str) -> Result<String, DeployTagError> {
        let task_id = self
            .stack_resource_id(stack_name, TASK_DEFINITION_RESOURCE)
            .await?;
        tracing::debug!(stack = stack_name, task_definition = %task_id, "found task definition");

        let containers = self.task_definition_images(&task_id).await?;
        let container_name = stack_name.split('-').take(2).collect::<Vec<_>>().join("-");

        let image = match containers.as_slice() {
            [(_, image)] => image,
            many => many
                .iter()
                .find(|(name, _)| *name == container_name)
                .map(|(_, image)| image)
                .ok_or_else(|| DeployTagError::ContainerNotFound {
                    task_definition: task_id.clone(),
                    container: container_name.clone(),
                })?,
        };

        let image: ImageRef = image.parse()?;
        Ok(image.tag)
    }
}

// ── Response shapes ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesPage {
    #[serde(default)]
    image_ids: Vec<ImageId>,
    #[serde(default, alias = "NextToken")]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageId {
    #[serde(default)]
    image_tag: Option<String>,
}

#[derive(Deserialize)]
struct DescribeStacks {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackSummary>,
}

#[derive(Deserialize)]
struct StackSummary {
    #[serde(rename = "StackStatus")]
    stack_status: String,
}

#[derive(Deserialize)]
struct ListStackResources {
    #[serde(rename = "StackResourceSummaries", default)]
    summaries: Vec<StackResource>,
}

#[derive(Deserialize)]
struct StackResource {
    #[serde(rename = "LogicalResourceId")]
    logical_id: String,
    #[serde(rename = "PhysicalResourceId", default)]
    physical_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTaskDefinition {
    task_definition: TaskDefinition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinition {
    #[serde(default)]
    container_definitions: Vec<ContainerDefinition>,
}

#[derive(Deserialize)]
struct ContainerDefinition {
    name: String,
    image: String,
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("error getting login credentials for AWS ECR")]
    Login { source: ToolError },

    #[error("error listing images in repository {repository}")]
    List {
        repository: String,
        source: ToolError,
    },

    #[error("unexpected response from ECR")]
    Parse { source: serde_json::Error },

    #[error(transparent)]
    Pattern(#[from] deckhand_core::Error),

    #[error("no matching containers found in {repository} (pattern {pattern})")]
    NoMatchingTag { repository: String, pattern: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DeployTagError {
    #[error("error listing resources of stack {stack}")]
    ListResources { stack: String, source: ToolError },

    #[error("stack {stack} has no resource '{logical_id}'")]
    ResourceNotFound { stack: String, logical_id: String },

    #[error("error describing task definition {task_definition}")]
    DescribeTaskDefinition {
        task_definition: String,
        source: ToolError,
    },

    #[error("task definition {task_definition} has no container named {container}")]
    ContainerNotFound {
        task_definition: String,
        container: String,
    },

    #[error("unexpected response from AWS")]
    Parse { source: serde_json::Error },

    #[error(transparent)]
    Image(#[from] deckhand_core::Error),
}
