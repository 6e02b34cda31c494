//! Core types for cookforge

pub mod repo;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use repo::{OrganizationSnapshot, Repository, RepositoryCollection, RepositoryLinks, SearchHit};

/// Which repository URL to hand to git
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Ssh,
    Http,
    Https,
    Svn,
    Html,
    Git,
}

impl LinkType {
    /// Lenient parse: unknown selectors fall back to ssh
    pub fn from_selector(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(LinkType::Ssh),
            "http" => Ok(LinkType::Http),
            "https" => Ok(LinkType::Https),
            "svn" => Ok(LinkType::Svn),
            "html" => Ok(LinkType::Html),
            "git" => Ok(LinkType::Git),
            other => Err(format!("unknown link type: {other}")),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkType::Ssh => "ssh",
            LinkType::Http => "http",
            LinkType::Https => "https",
            LinkType::Svn => "svn",
            LinkType::Html => "html",
            LinkType::Git => "git",
        };
        f.write_str(s)
    }
}

/// TLS peer verification for API calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslVerifyMode {
    #[default]
    VerifyPeer,
    VerifyNone,
}

impl FromStr for SslVerifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_peer" => Ok(SslVerifyMode::VerifyPeer),
            "verify_none" => Ok(SslVerifyMode::VerifyNone),
            other => Err(format!("unknown SSL verify mode: {other}")),
        }
    }
}

impl fmt::Display for SslVerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslVerifyMode::VerifyPeer => f.write_str("verify_peer"),
            SslVerifyMode::VerifyNone => f.write_str("verify_none"),
        }
    }
}
