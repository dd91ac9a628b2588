//! Per-resource-type configuration schemas.
//!
//! Each of the six supported Azure resource types declares which
//! configuration fields are immutable after creation and which fields
//! get a portal default when the operator leaves them out.

use std::collections::BTreeMap;

use crate::inventory::ResourceType;
use crate::lifecycle::ConfigDiff;

/// Schema for one resource type.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    /// Terraform resource type name.
    pub terraform_type: &'static str,
    /// Fields that cannot change after creation.
    pub immutable: &'static [&'static str],
    /// Default values applied when the operator omits a field.
    pub defaults: &'static [(&'static str, &'static str)],
}

const VM_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_linux_virtual_machine",
    immutable: &["name", "resource_group", "location", "admin_username"],
    defaults: &[
        ("location", "westeurope"),
        ("size", "Standard_B2s"),
        ("admin_username", "azureadmin"),
    ],
};

const STORAGE_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_storage_account",
    immutable: &["name", "resource_group", "location", "account_tier"],
    defaults: &[
        ("location", "westeurope"),
        ("account_tier", "Standard"),
        ("replication_type", "LRS"),
    ],
};

const AKS_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_kubernetes_cluster",
    immutable: &["name", "resource_group", "location", "dns_prefix"],
    defaults: &[("location", "westeurope"), ("node_count", "2"), ("vm_size", "Standard_D2s_v3")],
};

const SQL_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_mssql_server",
    immutable: &["name", "resource_group", "location", "admin_login"],
    defaults: &[("location", "westeurope"), ("version", "12.0"), ("admin_login", "sqladmin")],
};

const KEYVAULT_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_key_vault",
    immutable: &["name", "resource_group", "location", "tenant_id"],
    defaults: &[("location", "westeurope"), ("sku", "standard")],
};

const VNET_SCHEMA: ResourceSchema = ResourceSchema {
    terraform_type: "azurerm_virtual_network",
    immutable: &["name", "resource_group", "location"],
    defaults: &[("location", "westeurope"), ("address_space", "10.0.0.0/16")],
};

/// Returns the schema for a resource type.
#[must_use]
pub const fn schema(resource_type: ResourceType) -> &'static ResourceSchema {
    match resource_type {
        ResourceType::Vm => &VM_SCHEMA,
        ResourceType::Storage => &STORAGE_SCHEMA,
        ResourceType::Aks => &AKS_SCHEMA,
        ResourceType::Sql => &SQL_SCHEMA,
        ResourceType::Keyvault => &KEYVAULT_SCHEMA,
        ResourceType::Vnet => &VNET_SCHEMA,
    }
}

/// Validates a provision-time configuration.
///
/// The portal requires a non-empty `name`; everything else falls back to
/// the schema defaults at render time.
///
/// # Errors
///
/// Returns the offending field name and a message.
pub fn validate_config(
    resource_type: ResourceType,
    config: &BTreeMap<String, String>,
) -> Result<(), (String, String)> {
    match config.get("name") {
        None => Err((
            "name".to_string(),
            format!("{resource_type} configuration requires a 'name' field"),
        )),
        Some(name) if name.trim().is_empty() => Err((
            "name".to_string(),
            format!("{resource_type} 'name' must not be empty"),
        )),
        Some(_) => Ok(()),
    }
}

/// Returns the fields in a diff that are immutable for this resource
/// type. A non-empty result means the update must be rejected.
#[must_use]
pub fn immutable_violations(resource_type: ResourceType, diff: &ConfigDiff) -> Vec<&'static str> {
    let schema = schema(resource_type);
    schema
        .immutable
        .iter()
        .copied()
        .filter(|field| diff.changes.contains_key(*field))
        .collect()
}

/// Overlays schema defaults under the operator-provided configuration.
#[must_use]
pub fn effective_config(
    resource_type: ResourceType,
    config: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut effective: BTreeMap<String, String> = schema(resource_type)
        .defaults
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    for (k, v) in config {
        effective.insert(k.clone(), v.clone());
    }
    effective
}
