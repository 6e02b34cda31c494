//! Compare command - published versions against repository tags
//!
//! `cookforge compare [COOKBOOK] [--all] [--mismatch] [--fields F,F] [--noheader]`

use crate::error::Result;
use crate::package::ArtifactServer;
use crate::services::SyncEngine;
use crate::types::LinkType;

use super::{build_rows, format_table, repositories_by_precedence, CookbookRow, OutputOptions};

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub cookbook: Option<String>,
    pub all: bool,
    /// Only rows whose published version differs from the latest tag
    pub mismatch: bool,
    pub link: LinkType,
    pub output: OutputOptions,
}

#[derive(Debug)]
pub struct CompareReport {
    pub rows: Vec<CookbookRow>,
    pub output: OutputOptions,
}

impl CompareReport {
    pub fn mismatches(&self) -> usize {
        self.rows.iter().filter(|r| r.is_mismatch()).count()
    }

    pub fn format(&self) -> String {
        if let Some(text) = self.output.format_fields(&self.rows) {
            return text;
        }
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    if r.is_mismatch() { "*".to_string() } else { String::new() },
                    r.name.clone(),
                    r.published.clone().unwrap_or_else(|| "n/a".to_string()),
                    r.link_cell(),
                    r.tag_cell(),
                ]
            })
            .collect();
        let table = format_table(&["", "Cookbook", "Tag", "Repository", "Tag"], &rows, self.output.noheader);
        if self.output.noheader {
            return table;
        }
        format!("{table}\n{} of {} differ", self.mismatches(), self.rows.len())
    }
}

pub async fn compare(
    engine: &SyncEngine,
    artifacts: &dyn ArtifactServer,
    orgs: &[String],
    options: &CompareOptions,
) -> Result<CompareReport> {
    let repos = repositories_by_precedence(engine, orgs).await?;
    let cookbooks = artifacts.list_cookbooks().await?;

    let mut rows = build_rows(&repos, &cookbooks, options.link, options.all, options.cookbook.as_deref());
    if options.mismatch {
        rows.retain(CookbookRow::is_mismatch);
    }
    Ok(CompareReport {
        rows,
        output: options.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockForge;
    use crate::commands::RowField;
    use crate::package::MockArtifactServer;
    use crate::storage::{CookforgePaths, SnapshotStore};
    use crate::types::Repository;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_compare_mismatch_only() {
        let dir = TempDir::new().unwrap();
        let t = Utc.timestamp_opt(1, 0).unwrap();
        let forge = Arc::new(
            MockForge::new()
                .with_org("chef", t, vec![Repository::new(1, "apache2", t), Repository::new(2, "nginx", t)])
                .with_tags("apache2", ["1.0.0", "1.1.0"])
                .with_tags("nginx", ["2.0.0"]),
        );
        let engine = SyncEngine::new(forge, SnapshotStore::new(CookforgePaths::with_root(dir.path())), "ghe");
        let artifacts = MockArtifactServer::new()
            .with_cookbook("apache2", ["1.0.0"])
            .with_cookbook("nginx", ["2.0.0", "1.9.0"]);

        let options = CompareOptions {
            mismatch: true,
            ..CompareOptions::default()
        };
        let report = compare(&engine, &artifacts, &["chef".to_string()], &options)
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].name, "apache2");
        assert_eq!(report.rows[0].latest_tag.as_deref(), Some("1.1.0"));
        assert!(report.format().ends_with("1 of 1 differ"));

        let options = CompareOptions {
            mismatch: true,
            output: OutputOptions {
                fields: Some(vec![RowField::Name, RowField::Published, RowField::Tag]),
                noheader: true,
            },
            ..CompareOptions::default()
        };
        let report = compare(&engine, &artifacts, &["chef".to_string()], &options)
            .await
            .unwrap();
        assert_eq!(report.format(), "apache2  1.0.0  1.1.0");
    }
}
