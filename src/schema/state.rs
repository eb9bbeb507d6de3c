//! Declarative state of one resource instance
//!
//! State is an identifier plus a flat map of dotted paths to primitive
//! strings. Lists and sets keep their length under `path.#` and elements under
//! `path.N`; maps keep their size under `path.%` and entries under `path.KEY`.
//! Nested blocks continue the path: `schedule.0.weekly.0.day_of_week`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count suffix for lists and sets
pub const LIST_COUNT: &str = "#";

/// Count suffix for maps
pub const MAP_COUNT: &str = "%";

/// Whether a path holds a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Never set
    Unset,
    /// Explicitly set to an empty value (`""`, `[]` or `{}`)
    Empty,
    /// Set to a non-empty value
    Set,
}

/// Orchestrator-held view of one resource instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl ResourceData {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty state for an existing remote object
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Remote identifier, empty when the object does not exist
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the remote identifier; an empty string marks the object absent
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Whether the state refers to an existing remote object
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Raw value at a path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.attributes.get(path).map(String::as_str)
    }

    /// Set a raw value at a path
    pub fn set(&mut self, path: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(path.into(), value.into());
    }

    /// Remove a path and everything nested below it
    pub fn clear(&mut self, path: &str) {
        let nested = format!("{path}.");
        self.attributes
            .retain(|key, _| key != path && !key.starts_with(&nested));
    }

    /// Remove the identifier and all attributes
    pub fn reset(&mut self) {
        self.id.clear();
        self.attributes.clear();
    }

    /// Element count of a list, set or map at a path
    pub fn count(&self, path: &str) -> Option<usize> {
        self.get(&count_key(path, LIST_COUNT))
            .or_else(|| self.get(&count_key(path, MAP_COUNT)))
            .and_then(|raw| raw.parse().ok())
    }

    /// Three-state presence of a path
    pub fn presence(&self, path: &str) -> Presence {
        if let Some(value) = self.get(path) {
            return if value.is_empty() {
                Presence::Empty
            } else {
                Presence::Set
            };
        }
        match self.count(path) {
            None => Presence::Unset,
            Some(0) => Presence::Empty,
            Some(_) => Presence::Set,
        }
    }

    /// Whether a path holds a non-empty value
    pub fn is_set(&self, path: &str) -> bool {
        self.presence(path) == Presence::Set
    }

    /// All attributes in path order
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Whether no attributes are stored
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// `path.#` or `path.%`
pub(crate) fn count_key(path: &str, suffix: &str) -> String {
    format!("{path}.{suffix}")
}

/// Join a prefix and a segment with a dot
pub(crate) fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}
