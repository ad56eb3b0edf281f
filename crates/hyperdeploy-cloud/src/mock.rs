//! Mock Hosting Provider
//!
//! In-memory implementation of [`HostingProvider`] for development and
//! tests. Records every call so tests can assert on the operations the
//! loops performed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{AppInfo, BackupInfo, HostingProvider};
use crate::error::{CloudError, Result};

/// Mock provider with scripted success/failure
pub struct MockHostingProvider {
    fail_uploads: bool,
    uploads: Mutex<Vec<PathBuf>>,
    started: Mutex<Vec<String>>,
}

impl Default for MockHostingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHostingProvider {
    pub fn new() -> Self {
        Self {
            fail_uploads: false,
            uploads: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose uploads always fail
    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::new()
        }
    }

    /// Archives passed to `upload` so far
    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }

    /// Application ids passed to `start` so far
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostingProvider for MockHostingProvider {
    async fn upload(&self, _api_key: &str, archive: &Path) -> Result<AppInfo> {
        if self.fail_uploads {
            return Err(CloudError::Api {
                status: 500,
                body: "mock upload failure".into(),
            });
        }

        self.uploads.lock().unwrap().push(archive.to_path_buf());
        Ok(AppInfo {
            id: format!("mock-app-{}", self.uploads.lock().unwrap().len()),
            name: Some("mock-app".into()),
        })
    }

    async fn start(&self, _api_key: &str, app_id: &str) -> Result<()> {
        self.started.lock().unwrap().push(app_id.to_string());
        Ok(())
    }

    async fn stop(&self, _api_key: &str, _app_id: &str) -> Result<()> {
        Ok(())
    }

    async fn restart(&self, _api_key: &str, _app_id: &str) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _api_key: &str, _app_id: &str) -> Result<()> {
        Ok(())
    }

    async fn logs(&self, _api_key: &str, _app_id: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn create_backup(&self, _api_key: &str, app_id: &str) -> Result<BackupInfo> {
        Ok(BackupInfo {
            id: Some(format!("backup-{app_id}")),
            url: None,
        })
    }

    async fn set_domain(&self, _api_key: &str, _app_id: &str, _domain: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_domain(&self, _api_key: &str, _app_id: &str, _domain: &str) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
