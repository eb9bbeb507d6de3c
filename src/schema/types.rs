//! Schema types
//!
//! A [`Schema`] is an ordered map from wire field name to [`SchemaNode`].
//! Nodes describe a field's shape for the declarative state and carry the
//! constraints checked before any request is made.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Shape of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    List,
    Set,
    Map,
}

impl ValueType {
    /// Whether values of this type are stored as a single state entry
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueType::Bool | ValueType::Int | ValueType::Float | ValueType::String
        )
    }

    /// Whether values of this type are stored with a `.#` count entry
    pub fn is_sequence(self) -> bool {
        matches!(self, ValueType::List | ValueType::Set)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Set => "set",
            ValueType::Map => "map",
        };
        f.write_str(name)
    }
}

/// Element of a collection node
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Elem {
    /// Collection of primitive values
    Primitive(ValueType),
    /// Nested block of fields
    Block(Schema),
}

/// Value validator attached to a primitive node
#[derive(Debug, Clone)]
pub enum Validator {
    /// Value must be one of the listed strings (case sensitive)
    OneOf(Vec<String>),
    /// Value must match the regular expression
    Matches(Regex),
    /// Integer value must fall within the inclusive range
    Range { min: i64, max: i64 },
}

impl Validator {
    /// Check a raw state value, returning a human readable reason on failure
    pub fn check(&self, raw: &str) -> std::result::Result<(), String> {
        match self {
            Validator::OneOf(allowed) => {
                if allowed.iter().any(|a| a == raw) {
                    Ok(())
                } else {
                    Err(format!("expected one of {allowed:?}, got {raw:?}"))
                }
            }
            Validator::Matches(re) => {
                if re.is_match(raw) {
                    Ok(())
                } else {
                    Err(format!("{raw:?} does not match {}", re.as_str()))
                }
            }
            Validator::Range { min, max } => {
                let n: i64 = raw
                    .parse()
                    .map_err(|_| format!("expected an integer, got {raw:?}"))?;
                if (*min..=*max).contains(&n) {
                    Ok(())
                } else {
                    Err(format!("expected a value in [{min}, {max}], got {n}"))
                }
            }
        }
    }

    /// Whether this validator makes sense for the given value type
    pub fn applies_to(&self, value_type: ValueType) -> bool {
        match self {
            Validator::OneOf(_) | Validator::Matches(_) => value_type == ValueType::String,
            Validator::Range { .. } => value_type == ValueType::Int,
        }
    }
}

impl std::fmt::Display for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validator::OneOf(allowed) => write!(f, "one_of({})", allowed.join(", ")),
            Validator::Matches(re) => write!(f, "matches({})", re.as_str()),
            Validator::Range { min, max } => write!(f, "range({min}, {max})"),
        }
    }
}

impl Serialize for Validator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Description of a single field for the declarative state
#[derive(Debug, Clone, Serialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,
    /// Write the zero value into state even when the entity leaves it empty
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub always_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Sibling field names that may not be set together with this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elem: Option<Elem>,
    /// The entity holds a single object (not an array) for this block
    #[serde(skip)]
    pub(crate) single: bool,
}

impl SchemaNode {
    /// Create an optional node of the given type
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: true,
            computed: false,
            sensitive: false,
            force_new: false,
            always_set: false,
            default: None,
            description: None,
            min_items: None,
            max_items: None,
            conflicts_with: Vec::new(),
            validators: Vec::new(),
            elem: None,
            single: false,
        }
    }

    /// Nested block schema, if this node is a block
    pub fn block(&self) -> Option<&Schema> {
        match &self.elem {
            Some(Elem::Block(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Mutable nested block schema, if this node is a block
    pub fn block_mut(&mut self) -> Option<&mut Schema> {
        match &mut self.elem {
            Some(Elem::Block(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Primitive element type for lists, sets and maps of primitives
    pub fn primitive_elem(&self) -> Option<ValueType> {
        match &self.elem {
            Some(Elem::Primitive(t)) => Some(*t),
            _ => None,
        }
    }

    /// Whether the entity side of this block is a single object
    pub fn is_single_block(&self) -> bool {
        self.single
    }

    /// Set only by the server
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Mark this node as required
    pub fn set_required(&mut self) -> &mut Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Mark this node as optional
    pub fn set_optional(&mut self) -> &mut Self {
        self.required = false;
        self.optional = true;
        self
    }

    /// Mark this node as computed by the server
    pub fn set_computed(&mut self) -> &mut Self {
        self.computed = true;
        self
    }

    /// Require replacement when the value changes
    pub fn set_force_new(&mut self) -> &mut Self {
        self.force_new = true;
        self
    }

    /// Add a validator
    pub fn add_validator(&mut self, validator: Validator) -> &mut Self {
        self.validators.push(validator);
        self
    }

    /// Add a conflicting sibling
    pub fn add_conflict(&mut self, sibling: impl Into<String>) -> &mut Self {
        let sibling = sibling.into();
        if !self.conflicts_with.contains(&sibling) {
            self.conflicts_with.push(sibling);
        }
        self
    }

    /// Run all validators against a raw value
    pub fn check_value(&self, raw: &str) -> std::result::Result<(), String> {
        self.validators.iter().try_for_each(|v| v.check(raw))
    }
}

/// Ordered mapping from wire field name to schema node
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Schema {
    nodes: BTreeMap<String, SchemaNode>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the previous one if any
    pub fn insert(&mut self, name: impl Into<String>, node: SchemaNode) -> Option<SchemaNode> {
        self.nodes.insert(name.into(), node)
    }

    /// Get a top-level node
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    /// Get a mutable top-level node
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.nodes.get_mut(name)
    }

    /// Whether a top-level node exists
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Iterate nodes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.nodes.iter()
    }

    /// Iterate nodes mutably in name order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut SchemaNode)> {
        self.nodes.iter_mut()
    }

    /// Number of top-level nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the schema has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by schema path (`schedule.weekly.day_of_week`).
    ///
    /// Numeric segments are skipped, so state-style paths such as
    /// `schedule.0.weekly` resolve as well.
    pub fn node(&self, path: &str) -> Option<&SchemaNode> {
        let mut schema = self;
        let mut found = None;
        for segment in path.split('.').filter(|s| !is_index(s)) {
            if found.is_some() {
                schema = found.and_then(SchemaNode::block)?;
            }
            found = Some(schema.get(segment)?);
        }
        found
    }

    /// Mutable lookup by schema path
    pub fn node_mut(&mut self, path: &str) -> Result<&mut SchemaNode> {
        let mut segments = path.split('.').filter(|s| !is_index(s)).peekable();
        let mut schema = self;
        while let Some(segment) = segments.next() {
            let node = schema
                .nodes
                .get_mut(segment)
                .ok_or_else(|| Error::schema(format!("no field '{segment}' in path '{path}'")))?;
            if segments.peek().is_none() {
                return Ok(node);
            }
            schema = node
                .block_mut()
                .ok_or_else(|| Error::schema(format!("'{segment}' in '{path}' is not a block")))?;
        }
        Err(Error::schema(format!("empty schema path '{path}'")))
    }

    /// Make the named siblings mutually exclusive
    pub fn exclusive(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.contains(name) {
                return Err(Error::schema(format!(
                    "exclusive group names unknown field '{name}'"
                )));
            }
        }
        for name in names {
            if let Some(node) = self.nodes.get_mut(*name) {
                for other in names.iter().filter(|o| *o != name) {
                    node.add_conflict(*other);
                }
            }
        }
        Ok(())
    }

    /// Mark every node (recursively) as requiring replacement on change
    pub fn force_new_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.force_new = true;
            if let Some(block) = node.block_mut() {
                block.force_new_all();
            }
        }
    }

    /// Check internal consistency after customization
    pub fn check(&self) -> Result<()> {
        for (name, node) in &self.nodes {
            for sibling in &node.conflicts_with {
                if !self.contains(sibling) {
                    return Err(Error::schema(format!(
                        "'{name}' conflicts with unknown sibling '{sibling}'"
                    )));
                }
            }
            if node.required && node.optional {
                return Err(Error::schema(format!(
                    "'{name}' cannot be both required and optional"
                )));
            }
            if node.required && node.default.is_some() {
                return Err(Error::schema(format!(
                    "'{name}' is required and cannot have a default"
                )));
            }
            for validator in &node.validators {
                if !validator.applies_to(node.value_type) {
                    return Err(Error::schema(format!(
                        "validator {validator} does not apply to {} field '{name}'",
                        node.value_type
                    )));
                }
            }
            if let Some(block) = node.block() {
                block.check()?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = (&'a String, &'a SchemaNode);
    type IntoIter = std::collections::btree_map::Iter<'a, String, SchemaNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Whether a path segment is a list index
pub(crate) fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
