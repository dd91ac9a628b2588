//! Azure Blob Storage inventory backend.
//!
//! This module mirrors the inventory document to an Azure Storage
//! container over the Blob REST API, authenticating with a SAS token.
//! It is normally used as the optional remote side of a
//! [`MirroredBackend`](super::backend::MirroredBackend).

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::{InventoryError, Result, TerradeckError};

use super::backend::StorageBackend;

/// Blob name for the inventory document.
const BLOB_NAME: &str = "inventory.json";

/// Azure Blob Storage backend.
#[derive(Debug)]
pub struct BlobBackend {
    /// HTTP client.
    client: reqwest::Client,
    /// Storage account name.
    account: String,
    /// Container name.
    container: String,
    /// Blob name prefix.
    prefix: String,
    /// SAS token query string, without the leading '?'.
    sas_token: String,
    /// Endpoint override for tests and Azurite.
    endpoint: Option<String>,
}

impl BlobBackend {
    /// Creates a new blob backend.
    #[must_use]
    pub fn new(account: &str, container: &str, prefix: Option<&str>, sas_token: &str) -> Self {
        let prefix = prefix
            .map(|p| {
                let p = p.trim_matches('/');
                if p.is_empty() {
                    String::new()
                } else {
                    format!("{p}/")
                }
            })
            .unwrap_or_default();

        Self {
            client: reqwest::Client::new(),
            account: account.to_string(),
            container: container.to_string(),
            prefix,
            sas_token: sas_token.trim_start_matches('?').to_string(),
            endpoint: None,
        }
    }

    /// Overrides the storage endpoint, for Azurite or test servers.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    /// Full URL for the inventory blob, including the SAS query.
    fn blob_url(&self) -> String {
        let base = self.endpoint.as_ref().map_or_else(
            || format!("https://{}.blob.core.windows.net", self.account),
            Clone::clone,
        );
        let mut url = format!("{base}/{}/{}{BLOB_NAME}", self.container, self.prefix);
        if !self.sas_token.is_empty() {
            url.push('?');
            url.push_str(&self.sas_token);
        }
        url
    }
}

#[async_trait]
impl StorageBackend for BlobBackend {
    async fn load(&self) -> Result<Option<String>> {
        let url = self.blob_url();
        debug!(
            "Loading inventory from blob {}/{}{BLOB_NAME}",
            self.container, self.prefix
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::blob(format!("Blob GET failed: {e}")))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("No inventory blob found");
                Ok(None)
            }
            status if status.is_success() => {
                let content = response.text().await.map_err(|e| {
                    TerradeckError::Inventory(InventoryError::blob(format!(
                        "Failed to read blob body: {e}"
                    )))
                })?;
                Ok(Some(content))
            }
            status => Err(TerradeckError::Inventory(InventoryError::blob(format!(
                "Blob GET returned {status}"
            )))),
        }
    }

    async fn save(&self, content: &str) -> Result<()> {
        let url = self.blob_url();
        info!(
            "Mirroring inventory to blob {}/{}{BLOB_NAME}",
            self.container, self.prefix
        );

        let response = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "application/json")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| {
                TerradeckError::Inventory(InventoryError::blob(format!("Blob PUT failed: {e}")))
            })?;

        if !response.status().is_success() {
            return Err(TerradeckError::Inventory(InventoryError::blob(format!(
                "Blob PUT returned {}",
                response.status()
            ))));
        }

        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        let url = self.blob_url();

        let response = self.client.head(&url).send().await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::blob(format!("Blob HEAD failed: {e}")))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(TerradeckError::Inventory(InventoryError::blob(format!(
                "Blob HEAD returned {status}"
            )))),
        }
    }

    fn backend_type(&self) -> &'static str {
        "azure-blob"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_load_missing_blob_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inv/inventory.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = BlobBackend::new("acct", "inv", None, "sv=fake").with_endpoint(&server.uri());
        let loaded = backend.load().await.expect("load should not fail");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/inv/state/inventory.json"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/inv/state/inventory.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"resources\":[]}"))
            .mount(&server)
            .await;

        let backend =
            BlobBackend::new("acct", "inv", Some("state"), "sv=fake").with_endpoint(&server.uri());

        backend.save("{\"resources\":[]}").await.expect("save failed");
        let loaded = backend.load().await.expect("load failed").expect("blob should exist");
        assert_eq!(loaded, "{\"resources\":[]}");
    }

    #[tokio::test]
    async fn test_save_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let backend = BlobBackend::new("acct", "inv", None, "sv=fake").with_endpoint(&server.uri());
        let result = backend.save("{}").await;
        assert!(result.is_err());
    }
}
