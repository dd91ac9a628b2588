//! Inventory management: deployment records, audit history, and
//! persistence backends.
//!
//! The inventory document is the single source of truth for resource
//! status. All reads and writes go through [`InventoryStore`].

mod backend;
mod blob;
mod local;
mod store;
mod types;

pub use backend::{MirroredBackend, StorageBackend};
pub use blob::BlobBackend;
pub use local::{LocalBackend, INVENTORY_DIR, INVENTORY_FILE};
pub use store::InventoryStore;
pub use types::{
    AuditEntry, AuditResult, ChangeEntry, Deployment, DeploymentStatus, InventoryDocument,
    LifecycleAction, LogLine, ResourceType, INVENTORY_VERSION,
};
