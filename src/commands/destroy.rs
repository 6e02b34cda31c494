//! Destroy command - delete a repository on the forge
//!
//! `cookforge destroy NAME [--user LOGIN] [--yes]`
//!
//! The repository is deleted from the first configured organization, or
//! from the given user's namespace. Confirmation is the caller's job.

use crate::adapters::ForgePort;
use crate::error::{CookforgeError, Result};

#[derive(Debug)]
pub struct DestroyReport {
    pub owner: String,
    pub name: String,
}

impl DestroyReport {
    pub fn format(&self) -> String {
        format!("Repo: {}/{} is deleted", self.owner, self.name)
    }
}

/// Pick the owner: the user when given, otherwise the first organization
pub fn destroy_owner(orgs: &[String], user: Option<&str>) -> Result<String> {
    match user {
        Some(user) if !user.is_empty() => Ok(user.to_string()),
        _ => orgs
            .first()
            .cloned()
            .ok_or_else(|| CookforgeError::Config("organization(s) not specified".into())),
    }
}

pub async fn destroy(forge: &dyn ForgePort, owner: &str, name: &str) -> Result<DestroyReport> {
    if name.is_empty() {
        return Err(CookforgeError::Config("specify a repository name".into()));
    }

    forge.delete_repository(owner, name).await?;

    Ok(DestroyReport {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockCall, MockForge};
    use crate::types::Repository;
    use chrono::Utc;

    #[test]
    fn test_destroy_owner() {
        let orgs = vec!["chef".to_string(), "ops".to_string()];
        assert_eq!(destroy_owner(&orgs, None).unwrap(), "chef");
        assert_eq!(destroy_owner(&orgs, Some("alice")).unwrap(), "alice");
        assert!(destroy_owner(&[], None).is_err());
    }

    #[tokio::test]
    async fn test_destroy() {
        let forge = MockForge::new().with_org("chef", Utc::now(), vec![Repository::new(1, "old", Utc::now())]);

        let report = destroy(&forge, "chef", "old").await.unwrap();
        assert_eq!(report.format(), "Repo: chef/old is deleted");
        assert_eq!(
            forge.calls(),
            vec![MockCall::DeleteRepository {
                owner: "chef".into(),
                name: "old".into(),
            }]
        );

        let err = destroy(&forge, "chef", "old").await.unwrap_err();
        assert!(matches!(err, CookforgeError::Forge(e) if e.status() == Some(404)));
    }
}
