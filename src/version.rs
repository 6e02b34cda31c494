//! Strict `MAJOR.MINOR.PATCH` parsing, ordering, and version bumping.
//!
//! Only plain numeric triples are versions here. Prefixes (`v1.2.3`), extra
//! components (`1.2.3.4`), suffixes (`1.2.3-rc1`) and components with leading
//! zeros (`01.2.3`) are rejected rather than coerced.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// A string that was expected to be `MAJOR.MINOR.PATCH` but is not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("version '{input}' is not in MAJOR.MINOR.PATCH format")]
pub struct VersionFormatError {
    pub input: String,
}

fn semver_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)$")
            .unwrap_or_else(|e| unreachable!("static version pattern: {e}"))
    })
}

/// Whether a tag name is an orderable version.
pub fn is_version_tag(name: &str) -> bool {
    SemVer::parse(name).is_ok()
}

/// A parsed semantic version (major.minor.patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` string.
    pub fn parse(s: &str) -> Result<Self, VersionFormatError> {
        let err = || VersionFormatError { input: s.to_string() };
        let caps = semver_pattern().captures(s).ok_or_else(err)?;
        let component = |i: usize| caps[i].parse::<u64>().map_err(|_| err());
        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
        })
    }

    /// Bump the version according to the given class.
    ///
    /// Only the selected component moves; lower components keep their value.
    pub fn bump(&self, kind: VersionBump) -> Self {
        match kind {
            VersionBump::Patch => Self { patch: self.patch + 1, ..*self },
            VersionBump::Minor => Self { minor: self.minor + 1, ..*self },
            VersionBump::Major => Self { major: self.major + 1, ..*self },
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = VersionFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

/// Compare two version strings. Errors if either fails to parse.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionFormatError> {
    Ok(SemVer::parse(a)?.cmp(&SemVer::parse(b)?))
}

/// Greatest version in the list, or `None` for an empty list.
pub fn max_version<'a, I>(versions: I) -> Result<Option<SemVer>, VersionFormatError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<SemVer> = None;
    for v in versions {
        let parsed = SemVer::parse(v)?;
        if best.map_or(true, |b| parsed > b) {
            best = Some(parsed);
        }
    }
    Ok(best)
}

/// Highest tag by version ordering, in the tag's original spelling.
///
/// Tags that are not versions are ignored.
pub fn latest_tag<S: AsRef<str>>(tags: &[S]) -> Option<String> {
    tags.iter()
        .filter_map(|t| SemVer::parse(t.as_ref()).ok().map(|v| (v, t.as_ref())))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, t)| t.to_string())
}

/// Which component a deploy bump increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    #[default]
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    /// Resolve the CLI flags: major wins over minor, patch is the fallback.
    pub const fn from_flags(major: bool, minor: bool) -> Self {
        if major {
            Self::Major
        } else if minor {
            Self::Minor
        } else {
            Self::Patch
        }
    }

    /// Apply this bump to a version string.
    pub fn apply(self, version: &str) -> Result<String, VersionFormatError> {
        Ok(SemVer::parse(version)?.bump(self).to_string())
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Patch => write!(f, "patch"),
            VersionBump::Minor => write!(f, "minor"),
            VersionBump::Major => write!(f, "major"),
        }
    }
}
