//! Terraform HCL generation for the six supported resource types.
//!
//! Rendering is deterministic: configuration and tags are sorted maps,
//! so the same inputs always produce the same HCL text.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::inventory::ResourceType;

use super::schema::{effective_config, schema};

/// Renders a complete Terraform configuration for one resource.
///
/// The output contains the provider block, a resource group data source
/// reference, and the resource block with the effective configuration
/// (operator values over schema defaults) plus a tags block.
#[must_use]
pub fn render(
    resource_type: ResourceType,
    config: &BTreeMap<String, String>,
    tags: &BTreeMap<String, String>,
) -> String {
    let effective = effective_config(resource_type, config);
    let name = effective.get("name").cloned().unwrap_or_else(|| "unnamed".to_string());
    let label = sanitize_label(&name);

    let mut out = String::new();
    let _ = writeln!(out, "terraform {{");
    let _ = writeln!(out, "  required_providers {{");
    let _ = writeln!(out, "    azurerm = {{");
    let _ = writeln!(out, "      source  = \"hashicorp/azurerm\"");
    let _ = writeln!(out, "      version = \"~> 3.0\"");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "  }}");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "provider \"azurerm\" {{");
    let _ = writeln!(out, "  features {{}}");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let tf_type = schema(resource_type).terraform_type;
    let _ = writeln!(out, "resource \"{tf_type}\" \"{label}\" {{");

    match resource_type {
        ResourceType::Vm => render_vm(&mut out, &effective),
        ResourceType::Storage => render_storage(&mut out, &effective),
        ResourceType::Aks => render_aks(&mut out, &effective),
        ResourceType::Sql => render_sql(&mut out, &effective),
        ResourceType::Keyvault => render_keyvault(&mut out, &effective),
        ResourceType::Vnet => render_vnet(&mut out, &effective),
    }

    if !tags.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  tags = {{");
        for (key, value) in tags {
            let _ = writeln!(out, "    {key} = \"{value}\"");
        }
        let _ = writeln!(out, "  }}");
    }

    let _ = writeln!(out, "}}");
    out
}

/// Turns a resource name into a valid Terraform block label.
fn sanitize_label(name: &str) -> String {
    let label: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("r_{label}")
    } else if label.is_empty() {
        "resource".to_string()
    } else {
        label
    }
}

fn attr(out: &mut String, key: &str, config: &BTreeMap<String, String>, field: &str) {
    if let Some(value) = config.get(field) {
        let _ = writeln!(out, "  {key} = \"{value}\"");
    }
}

fn render_common(out: &mut String, config: &BTreeMap<String, String>) {
    attr(out, "name", config, "name");
    attr(out, "resource_group_name", config, "resource_group");
    attr(out, "location", config, "location");
}

fn render_vm(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    attr(out, "size", config, "size");
    attr(out, "admin_username", config, "admin_username");
    let image = config.get("image").map_or("Ubuntu2204", String::as_str);
    let _ = writeln!(out);
    let _ = writeln!(out, "  source_image_reference {{");
    let _ = writeln!(out, "    publisher = \"Canonical\"");
    let _ = writeln!(out, "    offer     = \"0001-com-ubuntu-server-jammy\"");
    let _ = writeln!(out, "    sku       = \"{image}\"");
    let _ = writeln!(out, "    version   = \"latest\"");
    let _ = writeln!(out, "  }}");
    let _ = writeln!(out, "  os_disk {{");
    let _ = writeln!(out, "    caching              = \"ReadWrite\"");
    let _ = writeln!(out, "    storage_account_type = \"Standard_LRS\"");
    let _ = writeln!(out, "  }}");
}

fn render_storage(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    attr(out, "account_tier", config, "account_tier");
    attr(out, "account_replication_type", config, "replication_type");
}

fn render_aks(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    attr(out, "dns_prefix", config, "dns_prefix");
    let node_count = config.get("node_count").map_or("2", String::as_str);
    let vm_size = config.get("vm_size").map_or("Standard_D2s_v3", String::as_str);
    let _ = writeln!(out);
    let _ = writeln!(out, "  default_node_pool {{");
    let _ = writeln!(out, "    name       = \"default\"");
    let _ = writeln!(out, "    node_count = {node_count}");
    let _ = writeln!(out, "    vm_size    = \"{vm_size}\"");
    let _ = writeln!(out, "  }}");
    let _ = writeln!(out, "  identity {{");
    let _ = writeln!(out, "    type = \"SystemAssigned\"");
    let _ = writeln!(out, "  }}");
}

fn render_sql(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    attr(out, "version", config, "version");
    attr(out, "administrator_login", config, "admin_login");
}

fn render_keyvault(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    attr(out, "sku_name", config, "sku");
    attr(out, "tenant_id", config, "tenant_id");
}

fn render_vnet(out: &mut String, config: &BTreeMap<String, String>) {
    render_common(out, config);
    if let Some(space) = config.get("address_space") {
        let _ = writeln!(out, "  address_space = [\"{space}\"]");
    }
    if let Some(subnet) = config.get("subnet") {
        let _ = writeln!(out);
        let _ = writeln!(out, "  subnet {{");
        let _ = writeln!(out, "    name             = \"default\"");
        let _ = writeln!(out, "    address_prefixes = [\"{subnet}\"]");
        let _ = writeln!(out, "  }}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_vnet_render_includes_defaults() {
        let hcl = render(ResourceType::Vnet, &map(&[("name", "v1")]), &BTreeMap::new());

        assert!(hcl.contains("resource \"azurerm_virtual_network\" \"v1\""));
        assert!(hcl.contains("name = \"v1\""));
        assert!(hcl.contains("location = \"westeurope\""));
        assert!(hcl.contains("address_space = [\"10.0.0.0/16\"]"));
    }

    #[test]
    fn test_tags_block_rendered_sorted() {
        let tags = map(&[("ticket", "J-1"), ("environment", "dev")]);
        let hcl = render(ResourceType::Storage, &map(&[("name", "stacct")]), &tags);

        let env_pos = hcl.find("environment").expect("environment tag");
        let ticket_pos = hcl.find("ticket").expect("ticket tag");
        assert!(env_pos < ticket_pos);
    }

    #[test]
    fn test_operator_values_override_defaults() {
        let config = map(&[("name", "db1"), ("location", "northeurope")]);
        let hcl = render(ResourceType::Sql, &config, &BTreeMap::new());

        assert!(hcl.contains("location = \"northeurope\""));
        assert!(!hcl.contains("westeurope"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = map(&[("name", "kv1"), ("tenant_id", "t-1")]);
        let tags = map(&[("managed_by", "terradeck")]);
        assert_eq!(
            render(ResourceType::Keyvault, &config, &tags),
            render(ResourceType::Keyvault, &config, &tags)
        );
    }

    #[test]
    fn test_label_sanitization() {
        let hcl = render(ResourceType::Vm, &map(&[("name", "web-01")]), &BTreeMap::new());
        assert!(hcl.contains("resource \"azurerm_linux_virtual_machine\" \"web_01\""));
    }
}
