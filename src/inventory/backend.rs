//! Storage backend trait definition.
//!
//! This module defines the common interface for inventory persistence
//! backends. Backends move raw JSON text; the store owns parsing.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

/// Trait for inventory persistence backends.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Loads the raw inventory document.
    ///
    /// Returns `None` if no document exists yet.
    async fn load(&self) -> Result<Option<String>>;

    /// Saves the raw inventory document.
    async fn save(&self, content: &str) -> Result<()>;

    /// Checks if a document exists.
    async fn exists(&self) -> Result<bool>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StorageBackend for Box<dyn StorageBackend> {
    async fn load(&self) -> Result<Option<String>> {
        (**self).load().await
    }

    async fn save(&self, content: &str) -> Result<()> {
        (**self).save(content).await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Local primary backend with a best-effort remote mirror.
///
/// Loads prefer the primary and fall back to the mirror when the primary
/// has no document yet. Saves always hit the primary; a mirror failure is
/// logged and swallowed, since the mirror is optional.
pub struct MirroredBackend {
    /// Authoritative backend.
    primary: Box<dyn StorageBackend>,
    /// Optional remote mirror.
    mirror: Box<dyn StorageBackend>,
}

impl MirroredBackend {
    /// Creates a mirrored backend.
    #[must_use]
    pub fn new(primary: Box<dyn StorageBackend>, mirror: Box<dyn StorageBackend>) -> Self {
        Self { primary, mirror }
    }
}

#[async_trait]
impl StorageBackend for MirroredBackend {
    async fn load(&self) -> Result<Option<String>> {
        if let Some(content) = self.primary.load().await? {
            return Ok(Some(content));
        }
        self.mirror.load().await
    }

    async fn save(&self, content: &str) -> Result<()> {
        self.primary.save(content).await?;
        if let Err(e) = self.mirror.save(content).await {
            warn!(
                "Failed to mirror inventory to {} backend: {e}",
                self.mirror.backend_type()
            );
        }
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        if self.primary.exists().await? {
            return Ok(true);
        }
        self.mirror.exists().await
    }

    fn backend_type(&self) -> &'static str {
        "mirrored"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;
    use std::sync::Mutex;

    /// In-memory backend seeded with optional content.
    struct MemoryBackend {
        content: Mutex<Option<String>>,
    }

    impl MemoryBackend {
        fn new(content: Option<&str>) -> Self {
            Self {
                content: Mutex::new(content.map(String::from)),
            }
        }
    }

    #[async_trait]
    impl StorageBackend for MemoryBackend {
        async fn load(&self) -> Result<Option<String>> {
            Ok(self.content.lock().map_or(None, |guard| guard.clone()))
        }

        async fn save(&self, content: &str) -> Result<()> {
            if let Ok(mut guard) = self.content.lock() {
                *guard = Some(content.to_string());
            }
            Ok(())
        }

        async fn exists(&self) -> Result<bool> {
            Ok(self.content.lock().is_ok_and(|guard| guard.is_some()))
        }

        fn backend_type(&self) -> &'static str {
            "memory"
        }
    }

    /// Backend whose every operation fails.
    struct UnreachableBackend;

    #[async_trait]
    impl StorageBackend for UnreachableBackend {
        async fn load(&self) -> Result<Option<String>> {
            Err(InventoryError::backend("unreachable").into())
        }

        async fn save(&self, _content: &str) -> Result<()> {
            Err(InventoryError::backend("unreachable").into())
        }

        async fn exists(&self) -> Result<bool> {
            Err(InventoryError::backend("unreachable").into())
        }

        fn backend_type(&self) -> &'static str {
            "unreachable"
        }
    }

    #[tokio::test]
    async fn test_save_survives_mirror_failure() {
        let primary = Box::new(MemoryBackend::new(None));
        let mirrored = MirroredBackend::new(primary, Box::new(UnreachableBackend));

        mirrored
            .save("{\"resources\":[]}")
            .await
            .expect("save must not fail when only the mirror is down");

        // The primary holds the document despite the failed mirror write.
        assert_eq!(
            mirrored.load().await.expect("load").as_deref(),
            Some("{\"resources\":[]}")
        );
    }

    #[tokio::test]
    async fn test_load_falls_back_to_mirror_when_primary_is_empty() {
        let primary = Box::new(MemoryBackend::new(None));
        let mirror = Box::new(MemoryBackend::new(Some("{\"version\":\"1.0\"}")));
        let mirrored = MirroredBackend::new(primary, mirror);

        assert_eq!(
            mirrored.load().await.expect("load").as_deref(),
            Some("{\"version\":\"1.0\"}")
        );
        assert!(mirrored.exists().await.expect("exists"));
    }

    #[tokio::test]
    async fn test_load_prefers_primary_over_mirror() {
        let primary = Box::new(MemoryBackend::new(Some("primary-doc")));
        let mirror = Box::new(MemoryBackend::new(Some("mirror-doc")));
        let mirrored = MirroredBackend::new(primary, mirror);

        assert_eq!(
            mirrored.load().await.expect("load").as_deref(),
            Some("primary-doc")
        );
    }

    #[tokio::test]
    async fn test_save_writes_both_backends_when_mirror_is_healthy() {
        let primary = Box::new(MemoryBackend::new(None));
        let mirror = Box::new(MemoryBackend::new(None));
        let mirrored = MirroredBackend::new(primary, mirror);

        mirrored.save("doc").await.expect("save");

        assert_eq!(
            mirrored.primary.load().await.expect("load").as_deref(),
            Some("doc")
        );
        assert_eq!(
            mirrored.mirror.load().await.expect("load").as_deref(),
            Some("doc")
        );
    }
}
