//! Tag derivation and matching.
//!
//! Three tag shapes exist:
//!
//! ```text
//! ci_job-42                 build tag    JOB_NAME-BUILD_NUMBER, or "latest"
//! stage-pass-2401021530     phase tag    {env}-{pass|fail|deploy}-{YYMMDDHHmm}
//! 2401021530                bare tag     timestamp only
//! ```
//!
//! Production never builds fresh images: the latest build for `prod` is the
//! newest `stage-pass-*` tag, i.e. an image that already passed in staging.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone};
use regex::Regex;

/// chrono format for tag timestamps and the build-date label (`YYMMDDHHmm`).
pub const BUILD_DATE_FORMAT: &str = "%y%m%d%H%M";

/// Build tag used outside CI.
pub const DEFAULT_BUILD_TAG: &str = "latest";

pub const JOB_NAME_VAR: &str = "JOB_NAME";
pub const BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";

pub const PRODUCTION_ENV: &str = "prod";
/// Environment whose passing builds are promoted to production.
pub const PROMOTION_SOURCE_ENV: &str = "stage";

const BARE_TAG_PATTERN: &str = "^[0-9]*$";

/// Lifecycle phase encoded in a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pass,
    Fail,
    Deploy,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Pass, Phase::Fail, Phase::Deploy];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pass => "pass",
            Phase::Fail => "fail",
            Phase::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(())
    }
}

/// `{env}-{phase}-{timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTag {
    pub env: String,
    pub phase: Phase,
    pub timestamp: String,
}

impl PhaseTag {
    pub fn new(env: impl Into<String>, phase: Phase, timestamp: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            phase,
            timestamp: timestamp.into(),
        }
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.env, self.phase, self.timestamp)
    }
}

impl FromStr for PhaseTag {
    type Err = ();

    /// Splits from the right so environments may contain `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, timestamp) = s.rsplit_once('-').ok_or(())?;
        if !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let (env, phase) = head.rsplit_once('-').ok_or(())?;
        if env.is_empty() {
            return Err(());
        }
        Ok(Self::new(env, phase.parse()?, timestamp))
    }
}

/// Build tag from CI identifiers: `{job}-{build}` with `/` and `%2F`
/// replaced by `_`. Falls back to [`DEFAULT_BUILD_TAG`] unless both are set.
pub fn build_tag(job_name: Option<&str>, build_number: Option<&str>) -> String {
    match (
        job_name.filter(|v| !v.is_empty()),
        build_number.filter(|v| !v.is_empty()),
    ) {
        (Some(job), Some(build)) => format!("{job}-{build}")
            .replace('/', "_")
            .replace("%2F", "_"),
        _ => DEFAULT_BUILD_TAG.to_owned(),
    }
}

/// [`build_tag`] from `JOB_NAME` and `BUILD_NUMBER`.
pub fn build_tag_from_env() -> String {
    let job = std::env::var(JOB_NAME_VAR).ok();
    let build = std::env::var(BUILD_NUMBER_VAR).ok();
    build_tag(job.as_deref(), build.as_deref())
}

pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    at.format(BUILD_DATE_FORMAT).to_string()
}

/// Current local time as `YYMMDDHHmm`.
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

/// Derive a tag for `env`.
///
/// With a phase this is `{env}-{phase}-{timestamp}`; without one it is the
/// bare timestamp. A missing or empty timestamp means "now".
pub fn derive_tag(env: &str, timestamp: Option<&str>, phase: Option<Phase>) -> String {
    let timestamp = timestamp
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(timestamp_now);

    match phase {
        Some(phase) => PhaseTag::new(env, phase, timestamp).to_string(),
        None => timestamp,
    }
}

/// Anchored pattern over tag strings.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    regex: Regex,
}

impl TagMatcher {
    /// `^{env}-{phase}-[0-9]*$`
    pub fn for_phase(env: &str, phase: Phase) -> crate::Result<Self> {
        let pattern = format!("^{}-{}-[0-9]*$", regex::escape(env), phase);
        Self::compile(env, &pattern)
    }

    /// Tags eligible as "latest build" for `env`.
    ///
    /// `prod` only accepts `stage-pass-*`; every other environment accepts
    /// bare timestamp tags.
    pub fn latest_build(env: &str) -> crate::Result<Self> {
        if env == PRODUCTION_ENV {
            Self::for_phase(PROMOTION_SOURCE_ENV, Phase::Pass)
        } else {
            Self::compile(env, BARE_TAG_PATTERN)
        }
    }

    fn compile(env: &str, pattern: &str) -> crate::Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| crate::Error::TagPattern {
            env: env.to_owned(),
            source: e,
        })?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Lexicographic maximum of `tags`.
///
/// This is string order, not numeric: `["20", "3", "100"]` yields `"3"`.
/// It is only "newest" because phase and bare tags carry fixed-width,
/// zero-padded timestamps.
pub fn latest<I, S>(tags: I) -> Option<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .max_by(|a, b| a.as_ref().cmp(b.as_ref()))
}
