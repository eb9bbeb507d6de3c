//! Entity descriptor table
//!
//! Entities describe their fields once, next to their serde attributes, and the
//! schema generator turns the table into a [`Schema`](super::Schema). Wire names
//! in descriptors must match the serde field names of the entity.

use super::types::Validator;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Declared Rust-side type of an entity field
#[derive(Debug, Clone)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    /// `Option<T>`
    Optional(Box<FieldType>),
    /// `Vec<T>`
    List(Box<FieldType>),
    /// `BTreeSet<T>` or a `Vec<T>` without meaningful order
    Set(Box<FieldType>),
    /// `BTreeMap<String, T>`
    Map(Box<FieldType>),
    /// Nested entity
    Struct(StructDescriptor),
}

impl FieldType {
    /// `Option<T>`
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    /// `Vec<T>`
    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    /// Unordered collection
    pub fn set(inner: FieldType) -> Self {
        FieldType::Set(Box::new(inner))
    }

    /// String-keyed map
    pub fn map(inner: FieldType) -> Self {
        FieldType::Map(Box::new(inner))
    }

    /// Nested entity described by `T`
    pub fn entity<T: Entity>() -> Self {
        FieldType::Struct(T::descriptor())
    }

    /// `Option<T>` of a nested entity
    pub fn optional_entity<T: Entity>() -> Self {
        FieldType::optional(FieldType::entity::<T>())
    }

    /// `Vec<T>` of nested entities
    pub fn list_of<T: Entity>() -> Self {
        FieldType::list(FieldType::entity::<T>())
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Optional(_) => "optional",
            FieldType::List(_) => "list",
            FieldType::Set(_) => "set",
            FieldType::Map(_) => "map",
            FieldType::Struct(_) => "struct",
        }
    }
}

/// Requirement declared for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Derived from the field type: `Optional` is optional, anything else required
    #[default]
    Inferred,
    Required,
    Optional,
    /// Set by the server only
    Computed,
    /// May be set by the user, filled in by the server otherwise
    OptionalComputed,
}

/// One entity field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) requirement: Requirement,
    pub(crate) sensitive: bool,
    pub(crate) force_new: bool,
    pub(crate) always_set: bool,
    pub(crate) default: Option<Value>,
    pub(crate) description: Option<String>,
    pub(crate) min_items: Option<usize>,
    pub(crate) max_items: Option<usize>,
    pub(crate) conflicts_with: Vec<String>,
    pub(crate) validators: Vec<Validator>,
    /// Regex sources that failed to compile, reported at generation time
    pub(crate) invalid_patterns: Vec<String>,
}

impl FieldDescriptor {
    /// Describe a field by wire name. A name of `"-"` keeps the field out of the schema.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            requirement: Requirement::Inferred,
            sensitive: false,
            force_new: false,
            always_set: false,
            default: None,
            description: None,
            min_items: None,
            max_items: None,
            conflicts_with: Vec::new(),
            validators: Vec::new(),
            invalid_patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.requirement = Requirement::Optional;
        self
    }

    #[must_use]
    pub fn computed(mut self) -> Self {
        self.requirement = match self.requirement {
            Requirement::Optional => Requirement::OptionalComputed,
            _ => Requirement::Computed,
        };
        self
    }

    /// Optional for the user, filled in by the server when unset
    #[must_use]
    pub fn optional_computed(mut self) -> Self {
        self.requirement = Requirement::OptionalComputed;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Write the zero value into state even when the entity leaves the field empty
    #[must_use]
    pub fn always_set(mut self) -> Self {
        self.always_set = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    /// Sibling fields that may not be set together with this one
    #[must_use]
    pub fn conflicts_with(mut self, siblings: &[&str]) -> Self {
        self.conflicts_with
            .extend(siblings.iter().map(|s| (*s).to_string()));
        self
    }

    /// Restrict a string field to an enumerated set
    #[must_use]
    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.validators.push(Validator::OneOf(
            allowed.iter().map(|s| (*s).to_string()).collect(),
        ));
        self
    }

    /// Require a string field to match a regular expression
    #[must_use]
    pub fn matches(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => self.validators.push(Validator::Matches(re)),
            Err(_) => self.invalid_patterns.push(pattern.to_string()),
        }
        self
    }

    /// Restrict an integer field to an inclusive range
    #[must_use]
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.validators.push(Validator::Range { min, max });
        self
    }

    /// Wire name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the field is kept out of the schema
    pub fn is_skipped(&self) -> bool {
        self.name == "-"
    }
}

/// Field table of one entity
#[derive(Debug, Clone)]
pub struct StructDescriptor {
    pub(crate) name: &'static str,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) exclusive: Vec<Vec<String>>,
}

impl StructDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            exclusive: Vec::new(),
        }
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// At most one of the named fields may be set
    #[must_use]
    pub fn exclusive(mut self, names: &[&str]) -> Self {
        self.exclusive
            .push(names.iter().map(|s| (*s).to_string()).collect());
        self
    }

    /// Entity name used in error messages
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared fields, including skipped ones
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// A serde entity with a descriptor table
pub trait Entity: Serialize + DeserializeOwned {
    /// Describe the entity's fields
    fn descriptor() -> StructDescriptor;
}
