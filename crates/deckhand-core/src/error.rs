use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file is missing: {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("failed to load config from {}", path.display())]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("`{field}` not set in {}", path.display())]
    MissingField { field: &'static str, path: PathBuf },

    #[error("`{field}` must be at least 1 in {}", path.display())]
    InvalidPoll { field: &'static str, path: PathBuf },

    #[error("invalid cf_parameters entry {entry:?} for environment '{env}': expected KEY=VALUE")]
    InvalidParameter { env: String, entry: String },

    // ── Tags and image references ──
    #[error("invalid tag pattern for environment '{env}'")]
    TagPattern { env: String, source: regex::Error },

    #[error("invalid image reference {0:?}: expected [REGISTRY/]NAME:TAG")]
    InvalidImageRef(String),

    #[error("invalid label {0:?}: expected KEY=VALUE")]
    InvalidLabel(String),
}
