//! Search command - find repositories on the forge
//!
//! `cookforge search QUERY... [--link]`

use tracing::info;

use super::format_table;
use crate::adapters::ForgePort;
use crate::error::{CookforgeError, Result};
use crate::types::SearchHit;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    /// Show the browse URL instead of the description
    pub link: bool,
}

#[derive(Debug)]
pub struct SearchReport {
    pub query: String,
    pub hits: Vec<SearchHit>,
    link: bool,
}

impl SearchReport {
    pub fn format(&self) -> String {
        if self.hits.is_empty() {
            return format!("No results when searching for: {}", self.query);
        }

        let third = if self.link { "URL" } else { "Description" };
        let rows: Vec<Vec<String>> = self
            .hits
            .iter()
            .map(|hit| {
                let detail = if self.link { &hit.url } else { &hit.description };
                vec![
                    format!("{:.2}", hit.score),
                    hit.name.clone(),
                    detail.clone().unwrap_or_default(),
                ]
            })
            .collect();
        format_table(&["Score", "Name", third], &rows, false)
    }
}

pub async fn search(forge: &dyn ForgePort, options: &SearchOptions) -> Result<SearchReport> {
    let query = options.query.trim();
    if query.is_empty() {
        return Err(CookforgeError::Config("Please specify a search query".into()));
    }

    let hits = forge.search_repositories(query).await?;
    info!(query = %query, hits = hits.len(), "search finished");

    Ok(SearchReport {
        query: query.to_string(),
        hits,
        link: options.link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockCall, MockForge};
    use crate::types::{Repository, RepositoryLinks};
    use chrono::Utc;

    fn forge() -> MockForge {
        let mut apache = Repository::new(1, "apache2", Utc::now()).with_links(RepositoryLinks {
            html_url: Some("https://forge/chef/apache2".into()),
            ..Default::default()
        });
        apache.description = Some("Apache web server".into());
        MockForge::new().with_org(
            "chef",
            Utc::now(),
            vec![apache, Repository::new(2, "mysql", Utc::now())],
        )
    }

    #[tokio::test]
    async fn test_search_lists_hits() {
        let forge = forge();
        let options = SearchOptions {
            query: " apache ".into(),
            link: false,
        };

        let report = search(&forge, &options).await.unwrap();
        assert_eq!(report.hits.len(), 1);
        assert_eq!(
            report.format(),
            "Score  Name     Description\n1.00   apache2  Apache web server"
        );
        assert_eq!(
            forge.calls(),
            vec![MockCall::SearchRepositories { query: "apache".into() }]
        );
    }

    #[tokio::test]
    async fn test_search_link_column() {
        let options = SearchOptions {
            query: "apache".into(),
            link: true,
        };

        let report = search(&forge(), &options).await.unwrap();
        assert!(report.format().starts_with("Score  Name     URL\n"));
        assert!(report.format().ends_with("https://forge/chef/apache2"));
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let options = SearchOptions {
            query: "postgres".into(),
            link: false,
        };

        let report = search(&forge(), &options).await.unwrap();
        assert_eq!(report.format(), "No results when searching for: postgres");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let forge = forge();
        let err = search(&forge, &SearchOptions::default()).await.unwrap_err();

        assert!(matches!(err, CookforgeError::Config(ref m) if m == "Please specify a search query"));
        assert!(forge.calls().is_empty());
    }
}
