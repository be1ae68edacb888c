use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::label::Label;

/// Config location used when `--config` is not given, relative to the repository root.
pub const DEFAULT_CONFIG_FILE: &str = ".deploy/config.toml";
pub const DEFAULT_DOCKERFILE: &str = ".deploy/Dockerfile";
pub const DEFAULT_TEST_SCRIPT: &str = ".deploy/tests.sh";

/// `.deploy/config.toml`: one service per repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used as the image name and ECR repository name
    #[serde(default)]
    pub name: String,
    /// ECR registry host, e.g. `123456789012.dkr.ecr.us-east-1.amazonaws.com`
    #[serde(default)]
    pub ecr_repo: String,
    /// Stack name without the environment prefix
    #[serde(default)]
    pub stack: String,
    /// CloudFormation template: an `s3://` URL or a repo-relative path
    #[serde(default)]
    pub cf_template: Option<String>,
    /// Per-environment `KEY=VALUE` stack parameters
    #[serde(default)]
    pub cf_parameters: BTreeMap<String, Vec<String>>,
    /// Test entrypoint, relative to the image WORKDIR
    #[serde(default = "default_test_script")]
    pub test_script: String,
    /// Dockerfile path relative to the repository root
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    /// Static `KEY=VALUE` labels added to every build
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Stack status polling during `deploy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on status checks. `None` polls until a terminal status.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// A single CloudFormation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackParameter {
    pub key: String,
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the config path against the repository root.
    ///
    /// The path always lands under `repo_root`: a leading `/` on an explicit
    /// path is dropped before joining.
    pub fn resolve_path(repo_root: &Path, explicit: Option<&Path>) -> PathBuf {
        let relative: PathBuf = explicit
            .unwrap_or(Path::new(DEFAULT_CONFIG_FILE))
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        repo_root.join(relative)
    }

    /// Load and validate the config for the repository at `repo_root`.
    pub fn load(repo_root: &Path, explicit: Option<&Path>) -> crate::Result<Self> {
        let path = Self::resolve_path(repo_root, explicit);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.is_file() {
            return Err(crate::Error::ConfigMissing {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), "reading config");
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> crate::Result<()> {
        let required = [("name", &self.name), ("ecr_repo", &self.ecr_repo)];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(crate::Error::MissingField {
                    field,
                    path: path.to_path_buf(),
                });
            }
        }

        if self.poll.interval_secs == 0 {
            return Err(crate::Error::InvalidPoll {
                field: "poll.interval_secs",
                path: path.to_path_buf(),
            });
        }
        if self.poll.max_attempts == Some(0) {
            return Err(crate::Error::InvalidPoll {
                field: "poll.max_attempts",
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// `cf_parameters[env]` as parsed parameters, in file order.
    ///
    /// Entries split at the first `=`, so values may themselves contain `=`.
    pub fn parameters_for(&self, env: &str) -> crate::Result<Vec<StackParameter>> {
        let Some(entries) = self.cf_parameters.get(env) else {
            return Ok(Vec::new());
        };

        entries
            .iter()
            .map(|entry| {
                entry
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .map(|(key, value)| StackParameter::new(key, value))
                    .ok_or_else(|| crate::Error::InvalidParameter {
                        env: env.to_owned(),
                        entry: entry.clone(),
                    })
            })
            .collect()
    }

    /// Static labels from the config file.
    pub fn static_labels(&self) -> crate::Result<Vec<Label>> {
        self.labels.iter().map(|l| l.parse()).collect()
    }

    /// Dockerfile location; a blank `dockerfile` means the default.
    pub fn dockerfile_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(non_blank(&self.dockerfile).unwrap_or(DEFAULT_DOCKERFILE))
    }

    /// Test entrypoint; a blank `test_script` means the default.
    pub fn test_script(&self) -> &str {
        non_blank(&self.test_script).unwrap_or(DEFAULT_TEST_SCRIPT)
    }

    /// Stack name for an environment: `{env}-{stack}`.
    pub fn stack_name(&self, env: &str) -> String {
        format!("{env}-{stack}", stack = self.stack)
    }

    /// ECR registry id: the account number leading the registry host.
    pub fn registry_id(&self) -> &str {
        self.ecr_repo.split('.').next().unwrap_or(&self.ecr_repo)
    }

    /// Registry host used for `docker login`.
    pub fn registry_host(&self) -> &str {
        self.ecr_repo.split('/').next().unwrap_or(&self.ecr_repo)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn default_dockerfile() -> String {
    DEFAULT_DOCKERFILE.to_owned()
}

fn default_test_script() -> String {
    DEFAULT_TEST_SCRIPT.to_owned()
}

fn default_poll_interval_secs() -> u64 {
    5
}
