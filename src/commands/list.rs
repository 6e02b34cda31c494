//! List command - cookbooks and where their repositories live
//!
//! `cookforge list [COOKBOOK] [--all] [--fields F,F] [--noheader]`
//!
//! Without `--all` every cookbook on the artifact server is listed with its
//! repository link and latest tag. With `--all` every repository is listed
//! with the version published for it, if any. `--fields` swaps the default
//! columns for the named ones.

use crate::error::Result;
use crate::package::ArtifactServer;
use crate::services::SyncEngine;
use crate::types::LinkType;

use super::{build_rows, format_table, repositories_by_precedence, CookbookRow, OutputOptions};

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub cookbook: Option<String>,
    pub all: bool,
    pub link: LinkType,
    pub output: OutputOptions,
}

#[derive(Debug)]
pub struct ListReport {
    pub rows: Vec<CookbookRow>,
    pub output: OutputOptions,
}

impl ListReport {
    pub fn format(&self) -> String {
        if let Some(text) = self.output.format_fields(&self.rows) {
            return text;
        }
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.published.clone().unwrap_or_default(),
                    r.link_cell(),
                    r.tag_cell(),
                ]
            })
            .collect();
        format_table(&["Cookbook", "Version", "Repository", "Tag"], &rows, self.output.noheader)
    }
}

pub async fn list(
    engine: &SyncEngine,
    artifacts: &dyn ArtifactServer,
    orgs: &[String],
    options: &ListOptions,
) -> Result<ListReport> {
    let repos = repositories_by_precedence(engine, orgs).await?;
    let cookbooks = artifacts.list_cookbooks().await?;

    Ok(ListReport {
        rows: build_rows(&repos, &cookbooks, options.link, options.all, options.cookbook.as_deref()),
        output: options.output.clone(),
    })
}
