//! Schema engine
//!
//! Turns entity descriptors into resource schemas and moves values between
//! typed entities and the flat declarative state held by the orchestrator.
//!
//! # Features
//!
//! - **Generation**: Descriptor tables become nested [`Schema`]s, with a hook for customization
//! - **Conversion**: Entities round-trip through [`ResourceData`] without losing empty values
//! - **Validation**: Required fields, item limits, enumerations and sibling conflicts
//! - **Diff**: Attribute-level changes with replacement detection

mod convert;
mod descriptor;
mod diff;
mod generate;
mod state;
mod types;
mod validate;

pub use convert::{
    apply_defaults, config_to_data, data_to_structure, data_to_value, structure_to_data,
    value_to_data,
};
pub use descriptor::{Entity, FieldDescriptor, FieldType, Requirement, StructDescriptor};
pub use diff::{diff, AttributeDiff, ResourceDiff};
pub use generate::{generate_schema, struct_to_schema};
pub use state::{Presence, ResourceData, LIST_COUNT, MAP_COUNT};
pub use types::{Elem, Schema, SchemaNode, Validator, ValueType};
pub use validate::validate_config;
