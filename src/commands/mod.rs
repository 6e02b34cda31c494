//! Cookforge commands
//!
//! Each command takes its collaborators explicitly and returns a report
//! with a `format()` for the terminal.

pub mod clone;
pub mod compare;
pub mod deploy;
pub mod destroy;
pub mod list;
pub mod search;
pub mod sync;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CookforgeError, Result};
use crate::services::SyncEngine;
use crate::types::{LinkType, Repository};

pub use clone::{clone, CloneOptions, CloneReport, CloneStatus};
pub use compare::{compare, CompareOptions, CompareReport};
pub use deploy::{deploy, DeployOptions, DeployReport};
pub use destroy::{destroy, destroy_owner, DestroyReport};
pub use list::{list, ListOptions, ListReport};
pub use search::{search, SearchOptions, SearchReport};
pub use sync::{sync, SyncReport};

/// Aggregate with the first configured organization taking precedence.
///
/// The aggregator lets later organizations win, so the configured list is
/// handed over reversed.
pub async fn repositories_by_precedence(
    engine: &SyncEngine,
    orgs: &[String],
) -> Result<BTreeMap<String, Repository>> {
    let reversed: Vec<String> = orgs.iter().rev().cloned().collect();
    engine.aggregate(&reversed).await
}

/// One cookbook as seen from both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookRow {
    pub name: String,
    /// Latest version on the artifact server
    pub published: Option<String>,
    /// `None` when no repository (or no link of the selected type) exists
    pub link: Option<String>,
    pub repo_found: bool,
    /// Latest version tag of the repository
    pub latest_tag: Option<String>,
}

impl CookbookRow {
    /// Published version and latest tag disagree
    pub fn is_mismatch(&self) -> bool {
        self.published != self.latest_tag
    }

    pub fn link_cell(&self) -> String {
        match (&self.link, self.repo_found) {
            (Some(link), _) => link.clone(),
            (None, true) => "ERROR: No link!".to_string(),
            (None, false) => "ERROR: Cannot find cookbook!".to_string(),
        }
    }

    /// Raw value of one field, `n/a` when absent
    pub fn field(&self, field: RowField) -> String {
        let value = match field {
            RowField::Name => Some(self.name.as_str()),
            RowField::Published => self.published.as_deref(),
            RowField::Link => self.link.as_deref(),
            RowField::Tag => self.latest_tag.as_deref(),
        };
        value.unwrap_or("n/a").to_string()
    }

    pub fn tag_cell(&self) -> String {
        match &self.latest_tag {
            Some(tag) => tag.clone(),
            None if self.repo_found => "ERROR: No tags!".to_string(),
            None => "n/a".to_string(),
        }
    }
}

/// A selectable column of a `CookbookRow`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Name,
    Published,
    Link,
    Tag,
}

impl RowField {
    pub const ALL: [RowField; 4] = [RowField::Name, RowField::Published, RowField::Link, RowField::Tag];

    pub const fn description(self) -> &'static str {
        match self {
            RowField::Name => "cookbook / repository name",
            RowField::Published => "latest version on the artifact server",
            RowField::Link => "repository link of the selected type",
            RowField::Tag => "latest version tag of the repository",
        }
    }

    /// `"name, tag"` -> `[Name, Tag]`; an empty list means just the name
    pub fn parse_list(list: &str) -> Result<Vec<RowField>> {
        let fields = list
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>>>()?;
        if fields.is_empty() {
            return Ok(vec![RowField::Name]);
        }
        Ok(fields)
    }

    /// Field names with descriptions, one per line
    pub fn field_list() -> String {
        let rows: Vec<Vec<String>> = Self::ALL
            .iter()
            .map(|f| vec![f.to_string(), f.description().to_string()])
            .collect();
        format_table(&["Field", "Description"], &rows, false)
    }
}

impl FromStr for RowField {
    type Err = CookforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(RowField::Name),
            "published" | "version" | "latest_cb_tag" => Ok(RowField::Published),
            "link" | "git_url" => Ok(RowField::Link),
            "tag" | "latest_gh_tag" => Ok(RowField::Tag),
            other => Err(CookforgeError::Config(format!("unknown field: {other}"))),
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowField::Name => f.write_str("name"),
            RowField::Published => f.write_str("published"),
            RowField::Link => f.write_str("link"),
            RowField::Tag => f.write_str("tag"),
        }
    }
}

/// Table shape shared by `list` and `compare`
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Explicit columns instead of the command's default layout
    pub fields: Option<Vec<RowField>>,
    pub noheader: bool,
}

impl OutputOptions {
    /// Render rows with the chosen fields, raw values, `n/a` for gaps.
    /// `None` when no fields were chosen.
    pub fn format_fields(&self, rows: &[CookbookRow]) -> Option<String> {
        let fields = self.fields.as_deref()?;
        let header: Vec<String> = fields.iter().map(ToString::to_string).collect();
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|r| fields.iter().map(|f| r.field(*f)).collect())
            .collect();
        Some(format_table(&header, &cells, self.noheader))
    }
}

/// Join artifact server cookbooks with repositories.
///
/// Default rows are the published cookbooks; with `all_repos` they are the
/// repositories instead. `only` restricts to one name.
pub fn build_rows(
    repos: &BTreeMap<String, Repository>,
    cookbooks: &BTreeMap<String, Option<String>>,
    link: LinkType,
    all_repos: bool,
    only: Option<&str>,
) -> Vec<CookbookRow> {
    let row = |name: &str, published: Option<String>| {
        let repo = repos.get(name);
        CookbookRow {
            name: name.to_string(),
            published,
            link: repo.and_then(|r| r.link(link)).map(str::to_string),
            repo_found: repo.is_some(),
            latest_tag: repo.and_then(|r| r.tags_last.clone()),
        }
    };

    let keep = |name: &str| only.map_or(true, |o| o == name);

    if all_repos {
        repos
            .keys()
            .filter(|name| keep(name.as_str()))
            .map(|name| row(name.as_str(), cookbooks.get(name).cloned().flatten()))
            .collect()
    } else {
        cookbooks
            .iter()
            .filter(|(name, _)| keep(name.as_str()))
            .map(|(name, version)| row(name.as_str(), version.clone()))
            .collect()
    }
}

/// Put `token:x-oauth-basic@` into an http(s) URL; other URLs are returned as-is
pub fn inject_token(url: &str, token: Option<&str>) -> String {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return url.to_string();
    };
    for scheme in ["https://", "http://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let authority_end = rest.find('/').unwrap_or(rest.len());
            let host = rest[..authority_end]
                .rsplit_once('@')
                .map_or(&rest[..authority_end], |(_, h)| h);
            return format!("{scheme}{token}:x-oauth-basic@{host}{}", &rest[authority_end..]);
        }
    }
    url.to_string()
}

/// Left-aligned columns, two spaces apart; `noheader` drops the header line
pub fn format_table(header: &[&str], rows: &[Vec<String>], noheader: bool) -> String {
    let mut widths: Vec<usize> = if noheader {
        vec![0; header.len()]
    } else {
        header.iter().map(|h| h.len()).collect()
    };
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<String>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c:<width$}", width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    if !noheader {
        lines.push(render(header.iter().map(|h| (*h).to_string()).collect()));
    }
    lines.extend(rows.iter().map(|r| render(r.clone())));
    lines.join("\n")
}
