//! Configuration validation against a schema
//!
//! Runs before any request is made. Conflicts are resolved relative to the
//! block instance that declares them, so `schedule.0.daily` only conflicts
//! with `schedule.0.weekly`, never with a field of another block.

use super::state::{join, Presence, ResourceData};
use super::types::{Schema, SchemaNode, ValueType};
use crate::error::{Error, Result};

/// Validate desired state against a schema
pub fn validate_config(schema: &Schema, data: &ResourceData) -> Result<()> {
    validate_block(schema, data, "")
}

fn validate_block(schema: &Schema, data: &ResourceData, prefix: &str) -> Result<()> {
    for (name, node) in schema {
        let path = join(prefix, name);
        let presence = data.presence(&path);

        if node.required && presence == Presence::Unset {
            return Err(Error::validation(&path, "required field is not set"));
        }

        if presence == Presence::Set {
            for sibling in &node.conflicts_with {
                let other = join(prefix, sibling);
                if data.is_set(&other) {
                    return Err(Error::ConfigConflict {
                        field: path,
                        conflicts_with: other,
                    });
                }
            }
        }

        if node.value_type.is_primitive() {
            if let Some(raw) = data.get(&path) {
                check_kind(node.value_type, &path, raw)?;
                node.check_value(raw)
                    .map_err(|message| Error::validation(&path, message))?;
            }
            continue;
        }

        let Some(count) = data.count(&path) else {
            continue;
        };
        check_items(node, &path, count)?;

        if let Some(block) = node.block() {
            for i in 0..count {
                validate_block(block, data, &join(&path, &i.to_string()))?;
            }
        } else if let Some(elem) = node.primitive_elem() {
            if node.value_type.is_sequence() {
                for i in 0..count {
                    let item = join(&path, &i.to_string());
                    if let Some(raw) = data.get(&item) {
                        check_kind(elem, &item, raw)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_items(node: &SchemaNode, path: &str, count: usize) -> Result<()> {
    if let Some(min) = node.min_items {
        if count < min {
            return Err(Error::validation(
                path,
                format!("expected at least {min} items, got {count}"),
            ));
        }
    }
    if let Some(max) = node.max_items {
        if count > max {
            return Err(Error::validation(
                path,
                format!("expected at most {max} items, got {count}"),
            ));
        }
    }
    Ok(())
}

fn check_kind(value_type: ValueType, path: &str, raw: &str) -> Result<()> {
    let ok = match value_type {
        ValueType::Bool => matches!(raw, "true" | "false"),
        ValueType::Int => raw.parse::<i64>().is_ok(),
        ValueType::Float => raw.parse::<f64>().is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::validation(
            path,
            format!("expected {value_type}, got {raw:?}"),
        ))
    }
}
