//! The inventory store: single source of truth for deployment state.
//!
//! The reference portal had every mutator reload the inventory JSON,
//! mutate it in memory, and overwrite the whole file, which loses
//! updates when a log flush races an update request. Here all mutation
//! goes through a single in-process writer: an authoritative in-memory
//! document behind a mutex, persisted as a whole before the lock is
//! released. Callers never observe a half-written document, and
//! concurrent mutators are serialized by construction.

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{InventoryError, Result, TerradeckError};

use super::backend::StorageBackend;
use super::types::{AuditResult, InventoryDocument, LifecycleAction};

/// Serialized-writer store over a persistence backend.
pub struct InventoryStore {
    /// Persistence backend.
    backend: Box<dyn StorageBackend>,
    /// Authoritative in-memory document.
    doc: Mutex<InventoryDocument>,
}

impl InventoryStore {
    /// Opens the store, loading the existing document from the backend
    /// or starting with an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or holds corrupt JSON.
    pub async fn open(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let doc = match backend.load().await? {
            Some(content) => {
                let doc: InventoryDocument = serde_json::from_str(&content).map_err(|e| {
                    TerradeckError::Inventory(InventoryError::Corrupted {
                        message: format!("Failed to parse inventory document: {e}"),
                    })
                })?;
                info!(
                    "Loaded inventory: {} deployment(s), {} audit entries ({} backend)",
                    doc.resources.len(),
                    doc.history.len(),
                    backend.backend_type()
                );
                doc
            }
            None => {
                debug!("No existing inventory, starting empty");
                InventoryDocument::new()
            }
        };

        Ok(Self {
            backend,
            doc: Mutex::new(doc),
        })
    }

    /// Returns a point-in-time copy of the whole inventory document.
    pub async fn read(&self) -> InventoryDocument {
        self.doc.lock().await.clone()
    }

    /// Applies a mutation to the inventory document and durably persists
    /// the result before releasing the writer lock.
    ///
    /// If the closure or the persistence fails, the in-memory document is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a backend error if persistence
    /// fails.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut InventoryDocument) -> Result<T>,
    {
        let mut guard = self.doc.lock().await;

        // Work on a copy so a failed mutation or save leaves the
        // authoritative document untouched.
        let mut working = guard.clone();
        let value = f(&mut working)?;

        let content = serde_json::to_string_pretty(&working).map_err(|e| {
            TerradeckError::Inventory(InventoryError::serialization(format!(
                "Failed to serialize inventory: {e}"
            )))
        })?;
        self.backend.save(&content).await?;

        *guard = working;
        Ok(value)
    }

    /// Appends an audit entry at the head of the history and persists.
    ///
    /// # Errors
    ///
    /// Returns a backend error if persistence fails.
    pub async fn append_audit(
        &self,
        deployment_id: &str,
        action: LifecycleAction,
        actor: &str,
        changes: serde_json::Value,
        result: AuditResult,
    ) -> Result<()> {
        self.mutate(|doc| {
            doc.record_audit(deployment_id, action, actor, changes, result);
            Ok(())
        })
        .await
    }

    /// The backend type name, for diagnostics.
    #[must_use]
    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use crate::inventory::local::LocalBackend;
    use crate::inventory::types::{Deployment, ResourceType};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    async fn open_store(temp: &TempDir) -> InventoryStore {
        let backend = LocalBackend::with_path(temp.path().join("inventory.json"));
        InventoryStore::open(Box::new(backend))
            .await
            .expect("open should succeed")
    }

    #[tokio::test]
    async fn test_open_empty() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp).await;

        let doc = store.read().await;
        assert!(doc.resources.is_empty());
        assert!(doc.history.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_survives_reopen() {
        let temp = TempDir::new().expect("temp dir");

        {
            let store = open_store(&temp).await;
            store
                .mutate(|doc| {
                    doc.push_deployment(Deployment::new(ResourceType::Vnet, BTreeMap::new()));
                    Ok(())
                })
                .await
                .expect("mutate should succeed");
        }

        let store = open_store(&temp).await;
        let doc = store.read().await;
        assert_eq!(doc.resources.len(), 1);
        assert_eq!(doc.resources[0].resource_type, ResourceType::Vnet);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_untouched() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp).await;

        let result: Result<()> = store
            .mutate(|doc| {
                doc.push_deployment(Deployment::new(ResourceType::Vm, BTreeMap::new()));
                Err(TerradeckError::Lifecycle(LifecycleError::not_found("nope")))
            })
            .await;

        assert!(result.is_err());
        assert!(store.read().await.resources.is_empty());
    }

    #[tokio::test]
    async fn test_append_audit_is_newest_first() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp).await;

        store
            .append_audit("d-1", LifecycleAction::Provision, "alex", serde_json::json!({}), AuditResult::Success)
            .await
            .expect("audit append");
        store
            .append_audit("d-1", LifecycleAction::Decommission, "alex", serde_json::json!({}), AuditResult::Failure)
            .await
            .expect("audit append");

        let doc = store.read().await;
        assert_eq!(doc.history.len(), 2);
        assert_eq!(doc.history[0].action, LifecycleAction::Decommission);
        assert_eq!(doc.history[1].action, LifecycleAction::Provision);
    }

    #[tokio::test]
    async fn test_concurrent_mutators_do_not_lose_updates() {
        let temp = TempDir::new().expect("temp dir");
        let store = std::sync::Arc::new(open_store(&temp).await);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mutate(|doc| {
                        doc.push_deployment(Deployment::new(ResourceType::Storage, BTreeMap::new()));
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task").expect("mutate");
        }

        assert_eq!(store.read().await.resources.len(), 10);
    }
}
