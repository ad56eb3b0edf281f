//! Backup Registry
//!
//! Backups requested per application, recorded locally in
//! `data/backups.json` keyed `<app_id>_<timestamp>`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hyperdeploy_core::JsonStore;
use serde::{Deserialize, Serialize};

use crate::client::HostingProvider;
use crate::error::Result;

/// A requested backup
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Provider-side backup id, when reported
    pub backup_id: Option<String>,

    /// Application backed up
    pub app_id: String,

    /// Application name at request time
    pub app_name: String,

    /// Download URL, when the provider exposes one
    pub url: Option<String>,

    /// When the backup was requested
    pub created_at: DateTime<Utc>,
}

/// Local registry of requested backups
pub struct BackupRegistry {
    store: JsonStore<BackupRecord>,
    provider: Arc<dyn HostingProvider>,
}

impl BackupRegistry {
    /// Open the registry at `path` (`data/backups.json`)
    pub fn open(path: impl Into<PathBuf>, provider: Arc<dyn HostingProvider>) -> Result<Self> {
        let store = JsonStore::open(path)?;
        tracing::info!(backups = store.len(), "Backup registry loaded");
        Ok(Self { store, provider })
    }

    /// Create a backup via the provider and record it
    pub async fn create(
        &self,
        api_key: &str,
        app_id: &str,
        app_name: &str,
    ) -> Result<BackupRecord> {
        let info = self.provider.create_backup(api_key, app_id).await?;
        let now = Utc::now();

        let record = BackupRecord {
            backup_id: info.id,
            app_id: app_id.to_string(),
            app_name: app_name.to_string(),
            url: info.url,
            created_at: now,
        };

        let key = format!("{app_id}_{}", now.format("%Y%m%d_%H%M%S"));
        self.store.insert(key, record.clone())?;

        tracing::info!(app_id, "Backup recorded");
        Ok(record)
    }

    /// All locally recorded backups
    pub fn all(&self) -> Vec<BackupRecord> {
        self.store.values()
    }

    /// Backups recorded for one application
    pub fn for_app(&self, app_id: &str) -> Vec<BackupRecord> {
        self.store.filter(|b| b.app_id == app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHostingProvider;

    #[tokio::test]
    async fn test_create_records_backup() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::open(
            dir.path().join("backups.json"),
            Arc::new(MockHostingProvider::new()),
        )
        .unwrap();

        let record = registry.create("key", "app-1", "my-bot").await.unwrap();
        assert_eq!(record.backup_id.as_deref(), Some("backup-app-1"));
        assert_eq!(registry.for_app("app-1").len(), 1);
        assert!(registry.for_app("other").is_empty());
    }
}
