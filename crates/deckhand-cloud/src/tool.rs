use std::fmt;

/// External command-line tools deckhand drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Docker,
    Aws,
    Git,
}

impl Tool {
    pub fn program(self) -> &'static str {
        match self {
            Tool::Docker => "docker",
            Tool::Aws => "aws",
            Tool::Git => "git",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("could not find the {tool} command; is it installed and on PATH?")]
    NotFound {
        tool: Tool,
        source: std::io::Error,
    },

    #[error("{tool} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        tool: Tool,
        args: Vec<String>,
        stderr: String,
    },

    #[error("{tool} output was not valid UTF-8")]
    InvalidUtf8 {
        tool: Tool,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {tool} stdin")]
    StdinWrite {
        tool: Tool,
        source: std::io::Error,
    },
}

impl ToolError {
    /// Captured stderr of a failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
