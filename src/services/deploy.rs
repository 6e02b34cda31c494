//! Deploy version resolution
//!
//! `VersionResolver::step` is pure: it either settles on a version or asks for
//! confirmation to bump past an already-published one. `resolve` drives the
//! steps with a caller-supplied confirmation, which is where the terminal
//! prompt lives.

use std::collections::BTreeSet;

use crate::error::{CookforgeError, Result};
use crate::version::{SemVer, VersionBump, VersionFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    /// Take the requested version as-is
    Quick,
    /// Bump past published versions, with confirmation
    #[default]
    Checked,
}

/// What happens to the repository once the version is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// A tag with this name exists: deploy from it
    CheckoutExisting,
    /// No such tag: write the version into the metadata, commit, tag
    CreateNew,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentVersionDecision {
    /// Version originally asked for
    pub requested: String,
    /// Version to deploy
    pub version: String,
    pub already_published: bool,
    pub tag_exists: bool,
    pub bump: VersionBump,
    /// Set when `version` differs from `requested`
    pub bumped_from: Option<String>,
    pub tag_action: TagAction,
}

/// Outcome of one resolution step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(DeploymentVersionDecision),
    /// `current` is published; deploying needs a go-ahead to use `proposed`
    NeedsConfirmation { current: String, proposed: String },
}

#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    published: BTreeSet<String>,
    repo_tags: BTreeSet<String>,
    bump: VersionBump,
}

impl VersionResolver {
    pub fn new<P, T, S1, S2>(published: P, repo_tags: T, bump: VersionBump) -> Self
    where
        P: IntoIterator<Item = S1>,
        T: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            published: published.into_iter().map(Into::into).collect(),
            repo_tags: repo_tags.into_iter().map(Into::into).collect(),
            bump,
        }
    }

    pub fn is_published(&self, version: &str) -> bool {
        self.published.contains(version)
    }

    pub fn has_tag(&self, version: &str) -> bool {
        self.repo_tags.contains(version)
    }

    /// Next candidate under the configured bump class
    pub fn bump(&self, version: &str) -> std::result::Result<String, VersionFormatError> {
        self.bump.apply(version)
    }

    /// Examine `candidate` once.
    ///
    /// `requested` is only carried into the decision. A published candidate in
    /// checked mode must be parseable so the bump can be proposed.
    pub fn step(
        &self,
        requested: &str,
        candidate: &str,
        mode: DeployMode,
    ) -> std::result::Result<Resolution, VersionFormatError> {
        if mode == DeployMode::Checked && self.is_published(candidate) {
            return Ok(Resolution::NeedsConfirmation {
                current: candidate.to_string(),
                proposed: self.bump(candidate)?,
            });
        }
        Ok(Resolution::Ready(self.decide(requested, candidate)))
    }

    fn decide(&self, requested: &str, version: &str) -> DeploymentVersionDecision {
        let tag_exists = self.has_tag(version);
        DeploymentVersionDecision {
            requested: requested.to_string(),
            version: version.to_string(),
            already_published: self.is_published(version),
            tag_exists,
            bump: self.bump,
            bumped_from: (requested != version).then(|| requested.to_string()),
            tag_action: if tag_exists {
                TagAction::CheckoutExisting
            } else {
                TagAction::CreateNew
            },
        }
    }

    /// Run steps until a version is settled.
    ///
    /// `confirm(current, proposed)` is asked each time `current` turns out to
    /// be published. Declining aborts with `DeployDeclined`. `requested` must
    /// be `MAJOR.MINOR.PATCH` in either mode.
    pub fn resolve<F>(&self, requested: &str, mode: DeployMode, mut confirm: F) -> Result<DeploymentVersionDecision>
    where
        F: FnMut(&str, &str) -> bool,
    {
        SemVer::parse(requested)?;
        let mut candidate = requested.to_string();
        loop {
            match self.step(requested, &candidate, mode)? {
                Resolution::Ready(decision) => return Ok(decision),
                Resolution::NeedsConfirmation { current, proposed } => {
                    if !confirm(&current, &proposed) {
                        return Err(CookforgeError::DeployDeclined { version: current });
                    }
                    candidate = proposed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_takes_requested() {
        let resolver = VersionResolver::new(["1.0.0"], ["1.0.0"], VersionBump::Patch);
        let decision = resolver
            .resolve("1.0.0", DeployMode::Quick, |_, _| panic!("quick mode never asks"))
            .unwrap();
        assert_eq!(decision.version, "1.0.0");
        assert!(decision.already_published);
        assert_eq!(decision.tag_action, TagAction::CheckoutExisting);
        assert_eq!(decision.bumped_from, None);
    }

    #[test]
    fn test_step_asks_before_bumping() {
        let resolver = VersionResolver::new(["1.0.0"], Vec::<String>::new(), VersionBump::Minor);
        let step = resolver.step("1.0.0", "1.0.0", DeployMode::Checked).unwrap();
        assert_eq!(
            step,
            Resolution::NeedsConfirmation {
                current: "1.0.0".into(),
                proposed: "1.1.0".into(),
            }
        );
    }

    #[test]
    fn test_bumps_until_unpublished() {
        let resolver = VersionResolver::new(["1.0.0", "1.0.1", "1.0.2"], ["1.0.0"], VersionBump::Patch);
        let mut asked = Vec::new();
        let decision = resolver
            .resolve("1.0.0", DeployMode::Checked, |cur, next| {
                asked.push((cur.to_string(), next.to_string()));
                true
            })
            .unwrap();

        assert_eq!(decision.version, "1.0.3");
        assert_eq!(decision.bumped_from.as_deref(), Some("1.0.0"));
        assert!(!decision.already_published);
        assert_eq!(decision.tag_action, TagAction::CreateNew);
        assert_eq!(asked.len(), 3);
        assert_eq!(asked[2], ("1.0.2".to_string(), "1.0.3".to_string()));
    }

    #[test]
    fn test_decline_aborts() {
        let resolver = VersionResolver::new(["1.0.0"], Vec::<String>::new(), VersionBump::Patch);
        let err = resolver.resolve("1.0.0", DeployMode::Checked, |_, _| false).unwrap_err();
        assert!(matches!(err, CookforgeError::DeployDeclined { version } if version == "1.0.0"));
    }

    #[test]
    fn test_unpublished_with_existing_tag_checks_out() {
        let resolver = VersionResolver::new(["1.0.0"], ["1.1.0"], VersionBump::Patch);
        let decision = resolver.resolve("1.1.0", DeployMode::Checked, |_, _| false).unwrap();
        assert_eq!(decision.tag_action, TagAction::CheckoutExisting);
        assert!(decision.tag_exists);
    }

    #[test]
    fn test_published_unparseable_version_is_fatal() {
        let resolver = VersionResolver::new(["1.0"], Vec::<String>::new(), VersionBump::Patch);
        let err = resolver.resolve("1.0", DeployMode::Checked, |_, _| true).unwrap_err();
        assert!(matches!(err, CookforgeError::Version(_)));
    }

    #[test]
    fn test_malformed_request_rejected_in_both_modes() {
        let resolver = VersionResolver::new(Vec::<String>::new(), ["v1.1"], VersionBump::Patch);
        for mode in [DeployMode::Quick, DeployMode::Checked] {
            let err = resolver.resolve("v1.1", mode, |_, _| true).unwrap_err();
            assert!(matches!(err, CookforgeError::Version(_)));
        }
    }

    #[test]
    fn test_major_bump() {
        let resolver = VersionResolver::new(["1.2.3"], Vec::<String>::new(), VersionBump::Major);
        let decision = resolver.resolve("1.2.3", DeployMode::Checked, |_, _| true).unwrap();
        assert_eq!(decision.version, "2.2.3");
    }
}
