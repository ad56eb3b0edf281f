//! Hosting Provider Client
//!
//! `HostingProvider` abstracts the vendor operations HyperDeploy uses:
//! upload an archive into a running application, lifecycle control, logs,
//! backups, and custom domains. `SquareClient` implements it against the
//! Square Cloud v2 REST API. Every call is keyed by the *user's* API
//! credential, not a service-wide one.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CloudError, Result};

/// A deployed application as reported by the provider
#[derive(Clone, Debug, Deserialize)]
pub struct AppInfo {
    /// Provider-assigned application id
    pub id: String,

    /// Application name
    #[serde(default)]
    pub name: Option<String>,
}

impl AppInfo {
    /// Name to show users when the provider omitted one
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

/// Backup metadata as reported by the provider
#[derive(Clone, Debug, Deserialize)]
pub struct BackupInfo {
    /// Provider-side backup id
    #[serde(default)]
    pub id: Option<String>,

    /// Download URL, when the provider exposes one
    #[serde(default)]
    pub url: Option<String>,
}

/// Hosting provider trait
///
/// The reconciliation loop only needs `upload` and `start`; the admin
/// surface uses the rest. Tests use [`crate::MockHostingProvider`].
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// Upload a ZIP archive, creating (or replacing) an application
    async fn upload(&self, api_key: &str, archive: &Path) -> Result<AppInfo>;

    /// Start an application
    async fn start(&self, api_key: &str, app_id: &str) -> Result<()>;

    /// Stop an application
    async fn stop(&self, api_key: &str, app_id: &str) -> Result<()>;

    /// Restart an application
    async fn restart(&self, api_key: &str, app_id: &str) -> Result<()>;

    /// Delete an application
    async fn delete(&self, api_key: &str, app_id: &str) -> Result<()>;

    /// Fetch recent application logs
    async fn logs(&self, api_key: &str, app_id: &str) -> Result<String>;

    /// Create a backup of an application
    async fn create_backup(&self, api_key: &str, app_id: &str) -> Result<BackupInfo>;

    /// Point a custom domain at an application
    async fn set_domain(&self, api_key: &str, app_id: &str, domain: &str) -> Result<()>;

    /// Remove a custom domain from an application
    async fn remove_domain(&self, api_key: &str, app_id: &str, domain: &str) -> Result<()>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Square Cloud API client
pub struct SquareClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for SquareClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    #[serde(default)]
    response: Option<T>,
}

impl SquareClient {
    /// Create a client against the public API
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.squarecloud.app/v2".into(),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), %body, "Square Cloud request failed");
        Err(CloudError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_empty(&self, api_key: &str, path: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", api_key)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl HostingProvider for SquareClient {
    async fn upload(&self, api_key: &str, archive: &Path) -> Result<AppInfo> {
        if !archive.exists() {
            return Err(CloudError::Validation(format!(
                "archive not found: {}",
                archive.display()
            )));
        }

        let bytes = tokio::fs::read(archive).await?;
        let filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app.zip".into());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/apps", self.base_url))
            .header("Authorization", api_key)
            .multipart(form)
            .send()
            .await?;

        let envelope: Envelope<AppInfo> = Self::check(response).await?.json().await?;
        let app = envelope.response.ok_or_else(|| CloudError::Api {
            status: 200,
            body: "upload response missing application info".into(),
        })?;

        tracing::info!(app_id = %app.id, "Application uploaded");
        Ok(app)
    }

    async fn start(&self, api_key: &str, app_id: &str) -> Result<()> {
        self.post_empty(api_key, &format!("/apps/{app_id}/start")).await?;
        tracing::info!(app_id, "Application started");
        Ok(())
    }

    async fn stop(&self, api_key: &str, app_id: &str) -> Result<()> {
        self.post_empty(api_key, &format!("/apps/{app_id}/stop")).await?;
        tracing::info!(app_id, "Application stopped");
        Ok(())
    }

    async fn restart(&self, api_key: &str, app_id: &str) -> Result<()> {
        self.post_empty(api_key, &format!("/apps/{app_id}/restart")).await?;
        tracing::info!(app_id, "Application restarted");
        Ok(())
    }

    async fn delete(&self, api_key: &str, app_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/apps/{app_id}", self.base_url))
            .header("Authorization", api_key)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(app_id, "Application deleted");
        Ok(())
    }

    async fn logs(&self, api_key: &str, app_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Logs {
            #[serde(default)]
            logs: String,
        }

        let response = self
            .http
            .get(format!("{}/apps/{app_id}/logs", self.base_url))
            .header("Authorization", api_key)
            .send()
            .await?;
        let envelope: Envelope<Logs> = Self::check(response).await?.json().await?;
        Ok(envelope.response.map(|l| l.logs).unwrap_or_default())
    }

    async fn create_backup(&self, api_key: &str, app_id: &str) -> Result<BackupInfo> {
        let response = self
            .http
            .post(format!("{}/apps/{app_id}/backups", self.base_url))
            .header("Authorization", api_key)
            .send()
            .await?;
        let envelope: Envelope<BackupInfo> = Self::check(response).await?.json().await?;
        let backup = envelope.response.unwrap_or(BackupInfo {
            id: None,
            url: None,
        });
        tracing::info!(app_id, "Backup created");
        Ok(backup)
    }

    async fn set_domain(&self, api_key: &str, app_id: &str, domain: &str) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/apps/{app_id}/network/custom",
                self.base_url
            ))
            .header("Authorization", api_key)
            .json(&serde_json::json!({ "custom": domain }))
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(app_id, domain, "Custom domain configured");
        Ok(())
    }

    async fn remove_domain(&self, api_key: &str, app_id: &str, domain: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!(
                "{}/apps/{app_id}/network/custom",
                self.base_url
            ))
            .header("Authorization", api_key)
            .json(&serde_json::json!({ "custom": domain }))
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(app_id, domain, "Custom domain removed");
        Ok(())
    }

    fn name(&self) -> &str {
        "squarecloud"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_rejects_missing_archive() {
        let client = SquareClient::new();
        let err = client
            .upload("key", Path::new("/nonexistent/app.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
    }

    #[test]
    fn test_app_info_display_name() {
        let named = AppInfo {
            id: "abc".into(),
            name: Some("my-bot".into()),
        };
        assert_eq!(named.display_name(), "my-bot");

        let unnamed = AppInfo {
            id: "abc".into(),
            name: None,
        };
        assert_eq!(unnamed.display_name(), "unnamed");
    }
}
