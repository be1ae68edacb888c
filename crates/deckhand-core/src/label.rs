use std::fmt;
use std::str::FromStr;

/// Label key holding the short commit SHA an image was built from.
pub const COMMIT_LABEL: &str = "deckhand.commit";
/// Label key holding the build time, formatted as [`BUILD_DATE_FORMAT`](crate::tag::BUILD_DATE_FORMAT).
pub const BUILD_DATE_LABEL: &str = "deckhand.build_date";

/// An image label, `KEY=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn commit(sha: &str) -> Self {
        Self::new(COMMIT_LABEL, sha)
    }

    pub fn build_date(timestamp: &str) -> Self {
        Self::new(BUILD_DATE_LABEL, timestamp)
    }

    /// `label=KEY=VALUE`, as accepted by `docker images --filter`.
    pub fn filter(&self) -> String {
        format!("label={self}")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for Label {
    type Err = crate::Error;

    /// A bare `KEY` is accepted and yields an empty value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s.split_once('=').unwrap_or((s, ""));
        if key.trim().is_empty() {
            return Err(crate::Error::InvalidLabel(s.to_owned()));
        }
        Ok(Self::new(key, value))
    }
}
