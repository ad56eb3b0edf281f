//! Domain Registry
//!
//! Custom domains configured per application, recorded locally in
//! `data/domains.json` (keyed `<app_id>_<domain>`) after the provider call
//! succeeds. The registry is the admin panel's source of truth for "what
//! did we configure"; the provider remains authoritative for what is live.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hyperdeploy_core::JsonStore;
use serde::{Deserialize, Serialize};

use crate::client::HostingProvider;
use crate::error::{CloudError, Result};

/// A configured custom domain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Application the domain points at
    pub app_id: String,

    /// Application name at configuration time
    pub app_name: String,

    /// The custom domain
    pub domain: String,

    /// When the domain was configured
    pub configured_at: DateTime<Utc>,
}

/// Check a bare domain name: dot-separated labels of letters, digits and
/// inner hyphens, no scheme, no path.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Local registry of configured domains
pub struct DomainRegistry {
    store: JsonStore<DomainRecord>,
    provider: Arc<dyn HostingProvider>,
}

impl DomainRegistry {
    /// Open the registry at `path` (`data/domains.json`)
    pub fn open(path: impl Into<PathBuf>, provider: Arc<dyn HostingProvider>) -> Result<Self> {
        let store = JsonStore::open(path)?;
        tracing::info!(domains = store.len(), "Domain registry loaded");
        Ok(Self { store, provider })
    }

    fn record_key(app_id: &str, domain: &str) -> String {
        format!("{app_id}_{domain}")
    }

    /// Configure `domain` for an application and record it.
    ///
    /// Validates the domain format before any provider call.
    pub async fn set(
        &self,
        api_key: &str,
        app_id: &str,
        domain: &str,
        app_name: &str,
    ) -> Result<DomainRecord> {
        if !is_valid_domain(domain) {
            return Err(CloudError::Validation(format!(
                "invalid domain format: {domain}"
            )));
        }

        self.provider.set_domain(api_key, app_id, domain).await?;

        let record = DomainRecord {
            app_id: app_id.to_string(),
            app_name: app_name.to_string(),
            domain: domain.to_string(),
            configured_at: Utc::now(),
        };
        self.store
            .insert(Self::record_key(app_id, domain), record.clone())?;

        tracing::info!(app_id, domain, "Domain configured");
        Ok(record)
    }

    /// Remove `domain` from an application and drop the record.
    pub async fn remove(&self, api_key: &str, app_id: &str, domain: &str) -> Result<bool> {
        self.provider.remove_domain(api_key, app_id, domain).await?;
        let removed = self.store.remove(&Self::record_key(app_id, domain))?;
        tracing::info!(app_id, domain, "Domain removed");
        Ok(removed.is_some())
    }

    /// Locally recorded domain, if any
    pub fn get(&self, app_id: &str, domain: &str) -> Option<DomainRecord> {
        self.store.get(&Self::record_key(app_id, domain))
    }

    /// All locally recorded domains
    pub fn all(&self) -> Vec<DomainRecord> {
        self.store.values()
    }

    /// Domains recorded for one application
    pub fn for_app(&self, app_id: &str) -> Vec<DomainRecord> {
        self.store.filter(|d| d.app_id == app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHostingProvider;

    fn open_registry(dir: &tempfile::TempDir) -> DomainRegistry {
        DomainRegistry::open(
            dir.path().join("domains.json"),
            Arc::new(MockHostingProvider::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_domain_validation() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("my-bot.example.com.br"));

        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("nodots"));
        assert!(!is_valid_domain("http://example.com"));
        assert!(!is_valid_domain("-leading.example.com"));
        assert!(!is_valid_domain("spaces in.example.com"));
    }

    #[tokio::test]
    async fn test_set_records_domain() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        registry
            .set("key", "app-1", "bot.example.com", "my-bot")
            .await
            .unwrap();

        assert!(registry.get("app-1", "bot.example.com").is_some());
        assert_eq!(registry.for_app("app-1").len(), 1);
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_domain_before_provider_call() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        let err = registry
            .set("key", "app-1", "not a domain", "my-bot")
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
        assert!(registry.all().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_locally() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        registry
            .set("key", "app-1", "bot.example.com", "my-bot")
            .await
            .unwrap();
        assert!(registry.remove("key", "app-1", "bot.example.com").await.unwrap());
        assert!(!registry.remove("key", "app-1", "bot.example.com").await.unwrap());
    }
}
