//! Configuration diff computation.
//!
//! A diff is the set of configuration keys whose value differs between
//! an old and a new snapshot, each reported exactly once with its
//! `{from, to}` pair. Computation runs over the union of both key sets,
//! so it is commutative over key order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel shown in plan previews for keys with no previous value.
pub const NOT_SET: &str = "(not set)";

/// Change to a single configuration field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldChange {
    /// Previous value, if the key existed.
    pub from: Option<String>,
    /// New value, if the key still exists.
    pub to: Option<String>,
}

/// Diff between two configuration snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigDiff {
    /// Changed fields, keyed by field name.
    #[serde(flatten)]
    pub changes: BTreeMap<String, FieldChange>,
}

impl ConfigDiff {
    /// Computes the diff between two configuration snapshots.
    ///
    /// Every key in the union of the two maps whose value differs is
    /// reported exactly once.
    #[must_use]
    pub fn between(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Self {
        let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

        let changes = keys
            .into_iter()
            .filter_map(|key| {
                let from = old.get(key);
                let to = new.get(key);
                if from == to {
                    None
                } else {
                    Some((
                        key.clone(),
                        FieldChange {
                            from: from.cloned(),
                            to: to.cloned(),
                        },
                    ))
                }
            })
            .collect();

        Self { changes }
    }

    /// Computes a preview diff for `plan`, substituting the
    /// [`NOT_SET`] sentinel for missing old values.
    #[must_use]
    pub fn preview(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Self {
        let mut diff = Self::between(old, new);
        for change in diff.changes.values_mut() {
            if change.from.is_none() {
                change.from = Some(NOT_SET.to_string());
            }
        }
        diff
    }

    /// Returns true if no field changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Field names that changed, in sorted order.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (field, change) in &self.changes {
            let marker = match (&change.from, &change.to) {
                (None, Some(_)) => "+",
                (Some(_), None) => "-",
                _ => "~",
            };
            writeln!(
                f,
                "  {marker} {field}: {} -> {}",
                change.from.as_deref().unwrap_or(NOT_SET),
                change.to.as_deref().unwrap_or("(removed)")
            )?;
        }
        Ok(())
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
    fn test_identical_configs_produce_empty_diff() {
        let config = map(&[("name", "v1"), ("location", "westeurope")]);
        let diff = ConfigDiff::between(&config, &config.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_every_changed_key_reported_exactly_once() {
        let old = map(&[("a", "1"), ("b", "2")]);
        let new = map(&[("a", "1"), ("b", "3"), ("c", "4")]);

        let diff = ConfigDiff::between(&old, &new);
        assert_eq!(diff.len(), 2);
        assert_eq!(
            diff.changes["b"],
            FieldChange {
                from: Some("2".to_string()),
                to: Some("3".to_string()),
            }
        );
        assert_eq!(
            diff.changes["c"],
            FieldChange {
                from: None,
                to: Some("4".to_string()),
            }
        );
    }

    #[test]
    fn test_removed_key_is_reported() {
        let old = map(&[("a", "1"), ("b", "2")]);
        let new = map(&[("a", "1")]);

        let diff = ConfigDiff::between(&old, &new);
        assert_eq!(diff.changed_fields(), vec!["b"]);
        assert_eq!(diff.changes["b"].to, None);
    }

    #[test]
    fn test_commutative_over_key_order() {
        // BTreeMap iteration order is sorted, so build the same logical
        // maps from differently ordered inserts.
        let mut old = BTreeMap::new();
        old.insert("b".to_string(), "2".to_string());
        old.insert("a".to_string(), "1".to_string());
        let mut new = BTreeMap::new();
        new.insert("a".to_string(), "1".to_string());
        new.insert("c".to_string(), "4".to_string());
        new.insert("b".to_string(), "3".to_string());

        let diff = ConfigDiff::between(&old, &new);
        assert_eq!(diff.changed_fields(), vec!["b", "c"]);
    }

    #[test]
    fn test_preview_substitutes_not_set_sentinel() {
        let old = map(&[("name", "v1")]);
        let new = map(&[("name", "v1"), ("address_space", "10.0.0.0/16")]);

        let diff = ConfigDiff::preview(&old, &new);
        assert_eq!(
            diff.changes["address_space"].from.as_deref(),
            Some(NOT_SET)
        );
        assert_eq!(
            diff.changes["address_space"].to.as_deref(),
            Some("10.0.0.0/16")
        );
    }
}
