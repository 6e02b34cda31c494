//! Configuration for cookforge
//!
//! Read from `~/.cookforge/config.yaml`, then overridden by command-line
//! flags and the `COOKFORGE_TOKEN` environment variable. The resulting value
//! is passed explicitly to everything that needs it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::adapters::{Credentials, TransportConfig};
use crate::error::{CookforgeError, Result};
use crate::package::UploadCommand;
use crate::types::{LinkType, SslVerifyMode};

pub const TOKEN_ENV: &str = "COOKFORGE_TOKEN";
const DEFAULT_API_VERSION: &str = "v3";

/// Artifact (Chef) server section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactServerConfig {
    /// Base URL including the organization path
    pub url: Option<String>,
    pub token: Option<String>,
    pub ssl_verify_mode: SslVerifyMode,
}

/// Root config.yaml structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookforgeConfig {
    /// Remote forge URL, e.g. `https://ghe.example.com`
    pub url: Option<String>,
    /// Explicit API base; defaults to `{url}/api/{api_version}`
    pub api_url: Option<String>,
    pub api_version: String,
    /// The first organization wins on repository name collisions
    pub organizations: Vec<String>,
    /// Link type selector; unknown values mean ssh
    pub link: Option<String>,
    pub ssl_verify_mode: SslVerifyMode,
    pub proxy: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Where `clone` puts cookbooks
    pub cookbook_path: Option<PathBuf>,
    /// Scratch directory for deploy checkouts
    pub work_dir: Option<PathBuf>,
    pub artifact_server: ArtifactServerConfig,
    /// Argument vector run after a deploy, with `{cookbook}`, `{path}` and
    /// `{version}` placeholders
    pub upload_command: Option<Vec<String>>,
}

impl Default for CookforgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_url: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            organizations: Vec::new(),
            link: None,
            ssl_verify_mode: SslVerifyMode::default(),
            proxy: None,
            token: None,
            username: None,
            password: None,
            cookbook_path: None,
            work_dir: None,
            artifact_server: ArtifactServerConfig::default(),
            upload_command: None,
        }
    }
}

/// Values given on the command line; `None` leaves the file value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub api_url: Option<String>,
    /// Colon-separated organization list
    pub orgs: Option<String>,
    pub link: Option<String>,
    pub ssl_verify_mode: Option<SslVerifyMode>,
    pub proxy: Option<String>,
    pub token: Option<String>,
    pub cookbook_path: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub artifact_url: Option<String>,
}

impl CookforgeConfig {
    /// Load from disk; a missing file gives the defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(contents)?;
        config.cookbook_path = config.cookbook_path.map(|p| expand_tilde(&p));
        config.work_dir = config.work_dir.map(|p| expand_tilde(&p));
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.url {
            self.url = Some(url);
        }
        if let Some(api_url) = overrides.api_url {
            self.api_url = Some(api_url);
        }
        if let Some(orgs) = overrides.orgs {
            self.organizations = split_orgs(&orgs);
        }
        if let Some(link) = overrides.link {
            self.link = Some(link);
        }
        if let Some(mode) = overrides.ssl_verify_mode {
            self.ssl_verify_mode = mode;
        }
        if let Some(proxy) = overrides.proxy {
            self.proxy = Some(proxy);
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        if let Some(path) = overrides.cookbook_path {
            self.cookbook_path = Some(expand_tilde(&path));
        }
        if let Some(path) = overrides.work_dir {
            self.work_dir = Some(expand_tilde(&path));
        }
        if let Some(url) = overrides.artifact_url {
            self.artifact_server.url = Some(url);
        }
    }

    /// Fill the token from the environment when none is configured
    pub fn apply_env_token(&mut self, env_token: Option<String>) {
        if self.token.is_none() {
            self.token = env_token.filter(|t| !t.is_empty());
        }
    }

    /// A usable forge configuration needs a URL and at least one organization
    pub fn validate(&self) -> Result<()> {
        if self.url.as_deref().map_or(true, str::is_empty) && self.api_url.is_none() {
            return Err(CookforgeError::Config("remote URL not specified".into()));
        }
        if self.organizations.is_empty() {
            return Err(CookforgeError::Config("organization(s) not specified".into()));
        }
        Ok(())
    }

    /// The host snapshots are cached under
    pub fn host(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.api_url.as_deref())
            .ok_or_else(|| CookforgeError::Config("remote URL not specified".into()))
    }

    pub fn api_base(&self) -> Result<String> {
        if let Some(api_url) = &self.api_url {
            return Ok(api_url.trim_end_matches('/').to_string());
        }
        let url = self.host()?;
        Ok(format!("{}/api/{}", url.trim_end_matches('/'), self.api_version))
    }

    pub fn link_type(&self) -> LinkType {
        self.link.as_deref().map(LinkType::from_selector).unwrap_or_default()
    }

    pub fn credentials(&self) -> Credentials {
        if let Some(token) = &self.token {
            return Credentials::Token(token.clone());
        }
        if let Some(username) = &self.username {
            return Credentials::Basic {
                username: username.clone(),
                password: self.password.clone(),
            };
        }
        Credentials::Anonymous
    }

    pub fn forge_transport(&self) -> TransportConfig {
        TransportConfig {
            ssl_verify: self.ssl_verify_mode,
            proxy: self.proxy.clone(),
            credentials: self.credentials(),
        }
    }

    pub fn artifact_transport(&self) -> TransportConfig {
        TransportConfig {
            ssl_verify: self.artifact_server.ssl_verify_mode,
            proxy: self.proxy.clone(),
            credentials: self
                .artifact_server
                .token
                .clone()
                .map_or(Credentials::Anonymous, Credentials::Bearer),
        }
    }

    pub fn artifact_url(&self) -> Result<&str> {
        self.artifact_server
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CookforgeError::Config("artifact server URL not specified".into()))
    }

    pub fn cookbook_path(&self) -> PathBuf {
        self.cookbook_path.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cookforge"))
    }

    pub fn upload_command(&self) -> Result<Option<UploadCommand>> {
        self.upload_command.clone().map(UploadCommand::new).transpose()
    }
}

/// `"a:b::c"` -> `["a", "b", "c"]`
pub fn split_orgs(list: &str) -> Vec<String> {
    list.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_tilde(dir: &Path) -> PathBuf {
    if let Some(dir_str) = dir.to_str() {
        if let Some(rest) = dir_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        } else if dir_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    dir.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = r"
url: https://ghe.example.com
organizations: [chef, ops]
link: https
ssl_verify_mode: verify_none
token: abc123
cookbook_path: /srv/cookbooks
artifact_server:
  url: https://chef.example.com/organizations/ops
upload_command: [knife, cookbook, upload, '{cookbook}']
";

    #[test]
    fn test_parse_yaml() {
        let config = CookforgeConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.organizations, vec!["chef", "ops"]);
        assert_eq!(config.link_type(), LinkType::Https);
        assert_eq!(config.ssl_verify_mode, SslVerifyMode::VerifyNone);
        assert_eq!(config.api_version, "v3");
        assert_eq!(config.api_base().unwrap(), "https://ghe.example.com/api/v3");
        assert_eq!(config.credentials(), Credentials::Token("abc123".into()));
        assert_eq!(config.cookbook_path(), PathBuf::from("/srv/cookbooks"));
        assert_eq!(config.artifact_url().unwrap(), "https://chef.example.com/organizations/ops");
        assert!(config.upload_command().unwrap().is_some());
        config.validate().unwrap();
    }

    #[test]
    fn test_api_url_wins() {
        let mut config = CookforgeConfig::from_yaml(YAML).unwrap();
        config.api_url = Some("https://api.github.com/".into());
        assert_eq!(config.api_base().unwrap(), "https://api.github.com");
    }

    #[test]
    fn test_overrides() {
        let mut config = CookforgeConfig::from_yaml(YAML).unwrap();
        config.apply_overrides(ConfigOverrides {
            orgs: Some("a:b::c".into()),
            link: Some("gopher".into()),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.organizations, vec!["a", "b", "c"]);
        assert_eq!(config.link_type(), LinkType::Ssh);
        assert_eq!(config.url.as_deref(), Some("https://ghe.example.com"));
    }

    #[test]
    fn test_env_token_does_not_replace_configured() {
        let mut config = CookforgeConfig::from_yaml(YAML).unwrap();
        config.apply_env_token(Some("from-env".into()));
        assert_eq!(config.token.as_deref(), Some("abc123"));

        let mut config = CookforgeConfig::default();
        config.apply_env_token(Some("from-env".into()));
        assert_eq!(config.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_validate_messages() {
        let config = CookforgeConfig::default();
        match config.validate() {
            Err(CookforgeError::Config(msg)) => assert_eq!(msg, "remote URL not specified"),
            other => panic!("unexpected {other:?}"),
        }

        let config = CookforgeConfig {
            url: Some("https://ghe.example.com".into()),
            ..CookforgeConfig::default()
        };
        match config.validate() {
            Err(CookforgeError::Config(msg)) => assert_eq!(msg, "organization(s) not specified"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_basic_auth_and_anonymous() {
        let config = CookforgeConfig {
            username: Some("deploy".into()),
            password: Some("pw".into()),
            ..CookforgeConfig::default()
        };
        assert!(matches!(config.credentials(), Credentials::Basic { .. }));
        assert_eq!(CookforgeConfig::default().credentials(), Credentials::Anonymous);
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CookforgeConfig::load(&dir.path().join("config.yaml")).await.unwrap();
        assert_eq!(config, CookforgeConfig::default());
    }

    #[tokio::test]
    async fn test_load_bad_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "organizations: {not: [a list").unwrap();
        assert!(matches!(
            CookforgeConfig::load(&path).await,
            Err(CookforgeError::ConfigFormat(_))
        ));
    }
}
