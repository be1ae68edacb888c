use crate::tool::{Tool, ToolError};

/// Abstraction over external CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, ToolError>;

    /// Execute a command, forwarding its output to our stderr.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), ToolError>;

    /// Execute a command with data piped to stdin.
    async fn exec_with_stdin(&self, args: &[String], stdin_data: &[u8])
    -> Result<String, ToolError>;
}

/// Runs the real binary for one [`Tool`].
#[derive(Debug, Clone, Copy)]
pub struct RealExecutor {
    tool: Tool,
}

impl RealExecutor {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        tracing::debug!(tool = %self.tool, ?args, "running");
        let mut cmd = tokio::process::Command::new(self.tool.program());
        cmd.args(args);
        cmd
    }

    fn failed(&self, args: &[String], stderr: String) -> ToolError {
        ToolError::CommandFailed {
            tool: self.tool,
            args: args.to_vec(),
            stderr,
        }
    }
}

impl CommandExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, ToolError> {
        use std::process::Stdio;

        let output = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ToolError::NotFound {
                tool: self.tool,
                source: e,
            })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidUtf8 {
                tool: self.tool,
                source: e,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(self.failed(args, stderr))
        }
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), ToolError> {
        use std::process::Stdio;

        // Child stdout goes to our stderr: stdout is reserved for values
        // callers capture, such as `tag --output-new-name`.
        let status = self
            .command(args)
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ToolError::NotFound {
                tool: self.tool,
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(self.failed(args, format!("exit code: {status}")))
        }
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ToolError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::NotFound {
                tool: self.tool,
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| ToolError::StdinWrite {
                    tool: self.tool,
                    source: e,
                })?;
            stdin.shutdown().await.map_err(|e| ToolError::StdinWrite {
                tool: self.tool,
                source: e,
            })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::NotFound {
                tool: self.tool,
                source: e,
            })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidUtf8 {
                tool: self.tool,
                source: e,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(self.failed(args, stderr))
        }
    }
}

pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
