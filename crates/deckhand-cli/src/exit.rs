use std::fmt;
use std::process::ExitCode;

/// Process exit codes, one per failure layer.
pub mod code {
    pub const MISSING_ENV: u8 = 1;
    /// Config, repository, credentials.
    pub const SETUP: u8 = 2;
    /// Cleanup, test, tag lookup, missing template.
    pub const COMMAND: u8 = 3;
    /// Build, push, tag.
    pub const IMAGE: u8 = 4;
    /// Stack describe or deploy image lookup.
    pub const STACK_LOOKUP: u8 = 5;
    pub const LAUNCH: u8 = 6;
    pub const WATCH: u8 = 7;
    /// The stack was already up to date.
    pub const NO_UPDATES: u8 = 255;
}

/// How a command finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Done,
    /// Deploy found nothing to change. Benign, but reported with its own code.
    NoUpdates,
}

impl Completion {
    pub fn exit_code(self) -> u8 {
        match self {
            Completion::Done => 0,
            Completion::NoUpdates => code::NO_UPDATES,
        }
    }
}

/// An error paired with the exit code it maps to.
#[derive(Debug)]
pub struct Failure {
    code: u8,
    error: anyhow::Error,
}

impl Failure {
    pub fn new(code: u8, error: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }

    /// Print the error and its causes to stderr.
    pub fn report(&self) -> ExitCode {
        eprintln!("error: {}", self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        ExitCode::from(self.code)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (exit {})", self.error, self.code)
    }
}

/// Attach an exit code (and optionally a message) to a fallible result.
pub trait ExitContext<T> {
    fn exit_code(self, code: u8) -> Result<T, Failure>;

    fn exit_context<C>(self, code: u8, context: C) -> Result<T, Failure>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ExitContext<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn exit_code(self, code: u8) -> Result<T, Failure> {
        self.map_err(|e| Failure::new(code, e))
    }

    fn exit_context<C>(self, code: u8, context: C) -> Result<T, Failure>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Failure::new(code, e.into().context(context)))
    }
}
