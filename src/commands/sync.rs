//! Sync command - refresh the snapshot cache of every organization
//!
//! `cookforge sync [--force]`

use crate::error::Result;
use crate::services::{SyncEngine, SyncOutcome};

#[derive(Debug)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn total_repositories(&self) -> usize {
        self.outcomes.iter().map(|o| o.snapshot.repositories.len()).sum()
    }

    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| {
                let repos = o.snapshot.repositories.len();
                if o.refreshed {
                    format!(
                        "{}: refreshed, {repos} repositories ({} tag fetches, {} reused)",
                        o.org, o.tags_fetched, o.tags_reused
                    )
                } else {
                    format!("{}: up to date, {repos} repositories", o.org)
                }
            })
            .collect();
        lines.push(format!(
            "{} organizations, {} repositories",
            self.outcomes.len(),
            self.total_repositories()
        ));
        lines.join("\n")
    }
}

/// Sync each organization in order; the first failure stops the command
pub async fn sync(engine: &SyncEngine, orgs: &[String], force: bool) -> Result<SyncReport> {
    let mut outcomes = Vec::with_capacity(orgs.len());
    for org in orgs {
        outcomes.push(engine.sync_organization(org, force).await?);
    }
    Ok(SyncReport { outcomes })
}
