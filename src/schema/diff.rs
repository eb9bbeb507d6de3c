//! Attribute-level diff between prior and desired state

use super::state::{ResourceData, LIST_COUNT};
use super::types::{is_index, Schema, SchemaNode, ValueType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Change of a single state attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDiff {
    pub old: Option<String>,
    pub new: Option<String>,
    /// A force-new field (or one of its enclosing blocks) changed
    pub requires_replace: bool,
}

/// Planned changes for one resource instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceDiff {
    pub attributes: BTreeMap<String, AttributeDiff>,
}

impl ResourceDiff {
    /// No attribute changes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Number of changed attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether any change forces the object to be recreated
    pub fn requires_replace(&self) -> bool {
        self.attributes.values().any(|d| d.requires_replace)
    }

    /// Whether a path or anything below it changed
    pub fn has_change(&self, path: &str) -> bool {
        let nested = format!("{path}.");
        self.attributes
            .keys()
            .any(|key| key == path || key.starts_with(&nested))
    }

    /// Change of a single attribute
    pub fn get(&self, path: &str) -> Option<&AttributeDiff> {
        self.attributes.get(path)
    }
}

/// Compare prior state with desired state.
///
/// Attributes the schema does not know are ignored. Computed attributes that
/// the desired state leaves unset keep their prior value and produce no change.
pub fn diff(schema: &Schema, prior: &ResourceData, desired: &ResourceData) -> ResourceDiff {
    let keys: BTreeSet<&String> = prior
        .attributes()
        .keys()
        .chain(desired.attributes().keys())
        .collect();

    let mut result = ResourceDiff::default();
    for key in keys {
        let old = prior.get(key);
        let new = desired.get(key);
        if old == new {
            continue;
        }
        let Some((node, force_new)) = resolve(schema, key) else {
            continue;
        };
        if node.computed && new.is_none() {
            continue;
        }
        result.attributes.insert(
            key.clone(),
            AttributeDiff {
                old: old.map(str::to_string),
                new: new.map(str::to_string),
                requires_replace: force_new,
            },
        );
    }
    result
}

/// Find the node a state key belongs to, and whether any node on the way is force-new
fn resolve<'a>(schema: &'a Schema, key: &str) -> Option<(&'a SchemaNode, bool)> {
    let mut scope = schema;
    let mut current: Option<&SchemaNode> = None;
    let mut force_new = false;
    for segment in key.split('.') {
        if let Some(node) = current {
            // everything after a map name is the map key or its count
            if node.value_type == ValueType::Map {
                break;
            }
            if segment == LIST_COUNT || is_index(segment) {
                continue;
            }
            scope = node.block()?;
        }
        let node = scope.get(segment)?;
        force_new |= node.force_new;
        current = Some(node);
    }
    current.map(|node| (node, force_new))
}
