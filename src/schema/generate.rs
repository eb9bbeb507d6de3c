//! Schema generation from entity descriptors

use super::descriptor::{Entity, FieldDescriptor, FieldType, Requirement, StructDescriptor};
use super::types::{Elem, Schema, SchemaNode, ValueType};
use crate::error::{Error, Result};
use serde_json::Value;

/// Generate the schema of an entity and let the caller adjust it.
///
/// The customize hook runs after the descriptor table has been turned into
/// nodes and before consistency checks, so it can add validators or conflicts
/// that reach across fields.
pub fn struct_to_schema<T, F>(customize: F) -> Result<Schema>
where
    T: Entity,
    F: FnOnce(&mut Schema) -> Result<()>,
{
    generate_schema(&T::descriptor(), customize)
}

/// Generate a schema from a descriptor table
pub fn generate_schema<F>(descriptor: &StructDescriptor, customize: F) -> Result<Schema>
where
    F: FnOnce(&mut Schema) -> Result<()>,
{
    let mut schema = build_block(descriptor)?;
    customize(&mut schema)?;
    schema.check()?;
    Ok(schema)
}

fn build_block(descriptor: &StructDescriptor) -> Result<Schema> {
    let mut schema = Schema::new();
    for field in descriptor.fields.iter().filter(|f| !f.is_skipped()) {
        let node = build_node(descriptor, field)?;
        if schema.insert(field.name.clone(), node).is_some() {
            return Err(Error::schema(format!(
                "{}: duplicate field '{}'",
                descriptor.name, field.name
            )));
        }
    }
    for group in &descriptor.exclusive {
        let names: Vec<&str> = group.iter().map(String::as_str).collect();
        schema.exclusive(&names)?;
    }
    Ok(schema)
}

fn build_node(descriptor: &StructDescriptor, field: &FieldDescriptor) -> Result<SchemaNode> {
    let context = || format!("{}.{}", descriptor.name, field.name);

    if let Some(pattern) = field.invalid_patterns.first() {
        return Err(Error::schema(format!(
            "{}: invalid pattern {pattern:?}",
            context()
        )));
    }

    let (inner, optional_type) = match &field.field_type {
        FieldType::Optional(inner) => (inner.as_ref(), true),
        other => (other, false),
    };
    let mut node = shape(inner, &context())?;

    match field.requirement {
        Requirement::Inferred if optional_type => {
            node.set_optional();
        }
        Requirement::Inferred | Requirement::Required => {
            node.set_required();
        }
        Requirement::Optional => {
            node.set_optional();
        }
        Requirement::Computed => {
            node.required = false;
            node.optional = false;
            node.computed = true;
        }
        Requirement::OptionalComputed => {
            node.set_optional().set_computed();
        }
    }

    if let Some(default) = &field.default {
        if !default_matches(node.value_type, default) {
            return Err(Error::schema(format!(
                "{}: default {default} is not a {}",
                context(),
                node.value_type
            )));
        }
        node.default = Some(default.clone());
    }

    if field.min_items.is_some() || field.max_items.is_some() {
        if node.value_type.is_primitive() {
            return Err(Error::schema(format!(
                "{}: item limits on a {} field",
                context(),
                node.value_type
            )));
        }
        if !node.single {
            node.max_items = field.max_items.or(node.max_items);
        }
        node.min_items = field.min_items;
    }

    node.sensitive = field.sensitive;
    node.force_new = field.force_new;
    node.always_set = field.always_set;
    node.description.clone_from(&field.description);
    node.conflicts_with.clone_from(&field.conflicts_with);
    node.validators.clone_from(&field.validators);
    Ok(node)
}

fn shape(field_type: &FieldType, context: &str) -> Result<SchemaNode> {
    if let Some(t) = primitive(field_type) {
        return Ok(SchemaNode::new(t));
    }
    let unmapped = |what: String| Error::schema(format!("{context}: {what} has no mapping"));
    match field_type {
        FieldType::Optional(_) => Err(unmapped("nested optional".to_string())),
        FieldType::List(elem) | FieldType::Set(elem) => {
            let value_type = if matches!(field_type, FieldType::Set(_)) {
                ValueType::Set
            } else {
                ValueType::List
            };
            let mut node = SchemaNode::new(value_type);
            node.elem = Some(match elem.as_ref() {
                FieldType::Struct(nested) => Elem::Block(build_block(nested)?),
                other => Elem::Primitive(primitive(other).ok_or_else(|| {
                    unmapped(format!("{value_type} of {}", other.type_name()))
                })?),
            });
            Ok(node)
        }
        FieldType::Map(elem) => {
            let value_type =
                primitive(elem).ok_or_else(|| unmapped(format!("map of {}", elem.type_name())))?;
            let mut node = SchemaNode::new(ValueType::Map);
            node.elem = Some(Elem::Primitive(value_type));
            Ok(node)
        }
        FieldType::Struct(nested) => {
            let mut node = SchemaNode::new(ValueType::List);
            node.elem = Some(Elem::Block(build_block(nested)?));
            node.max_items = Some(1);
            node.single = true;
            Ok(node)
        }
        other => Err(unmapped(other.type_name().to_string())),
    }
}

fn primitive(field_type: &FieldType) -> Option<ValueType> {
    match field_type {
        FieldType::Bool => Some(ValueType::Bool),
        FieldType::Int => Some(ValueType::Int),
        FieldType::Float => Some(ValueType::Float),
        FieldType::String => Some(ValueType::String),
        _ => None,
    }
}

fn default_matches(value_type: ValueType, value: &Value) -> bool {
    match value_type {
        ValueType::Bool => value.is_boolean(),
        ValueType::Int => value.is_i64() || value.is_u64(),
        ValueType::Float => value.is_number(),
        ValueType::String => value.is_string(),
        ValueType::List | ValueType::Set | ValueType::Map => false,
    }
}
