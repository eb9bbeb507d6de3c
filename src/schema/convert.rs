//! Conversion between entities and declarative state
//!
//! Entities go through their serde JSON form, so serde attributes decide what
//! an "empty" field is: anything serialized as `null` or skipped is unset,
//! while an explicitly serialized `[]` or `{}` is stored as a zero count.
//! Set elements, blocks included, are stored sorted and deduplicated.

use super::state::{count_key, join, ResourceData, LIST_COUNT, MAP_COUNT};
use super::types::{Elem, Schema, SchemaNode, ValueType};
use crate::error::{Error, Result};
use crate::types::JsonObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};

/// Materialize an entity from declarative state
pub fn data_to_structure<T: DeserializeOwned>(data: &ResourceData, schema: &Schema) -> Result<T> {
    let value = data_to_value(data, schema)?;
    serde_json::from_value(value)
        .map_err(|e| Error::conversion(std::any::type_name::<T>(), e.to_string()))
}

/// Read declarative state into a JSON object shaped like the entity
pub fn data_to_value(data: &ResourceData, schema: &Schema) -> Result<Value> {
    read_block(data, schema, "").map(Value::Object)
}

/// Write an entity into declarative state
pub fn structure_to_data<T: Serialize>(
    entity: &T,
    schema: &Schema,
    data: &mut ResourceData,
) -> Result<()> {
    let value = serde_json::to_value(entity)
        .map_err(|e| Error::conversion(std::any::type_name::<T>(), e.to_string()))?;
    value_to_data(&value, schema, data)
}

/// Write a JSON object shaped like the entity into declarative state
pub fn value_to_data(value: &Value, schema: &Schema, data: &mut ResourceData) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::conversion("", format!("expected an object, got {}", kind(value))))?;
    write_block(object, schema, "", data)
}

/// Build desired state from orchestrator configuration, filling in defaults
pub fn config_to_data(config: &Value, schema: &Schema) -> Result<ResourceData> {
    let mut data = ResourceData::new();
    value_to_data(config, schema, &mut data)?;
    apply_defaults(schema, "", &mut data)?;
    Ok(data)
}

/// Fill unset primitive fields that declare a default
pub fn apply_defaults(schema: &Schema, prefix: &str, data: &mut ResourceData) -> Result<()> {
    for (name, node) in schema {
        let path = join(prefix, name);
        if let Some(default) = &node.default {
            if node.value_type.is_primitive() && data.get(&path).is_none() {
                let raw = render(node.value_type, default, &path)?;
                data.set(path.clone(), raw);
            }
        }
        if let Some(block) = node.block() {
            for i in 0..data.count(&path).unwrap_or(0) {
                apply_defaults(block, &join(&path, &i.to_string()), data)?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// State -> JSON
// ============================================================================

fn read_block(data: &ResourceData, schema: &Schema, prefix: &str) -> Result<JsonObject> {
    let mut object = JsonObject::new();
    for (name, node) in schema {
        let path = join(prefix, name);
        if let Some(value) = read_node(data, node, &path)? {
            object.insert(name.clone(), value);
        }
    }
    Ok(object)
}

fn read_node(data: &ResourceData, node: &SchemaNode, path: &str) -> Result<Option<Value>> {
    match node.value_type {
        t if t.is_primitive() => {
            let Some(raw) = data.get(path) else {
                return Ok(None);
            };
            node.check_value(raw)
                .map_err(|message| Error::conversion(path, message))?;
            coerce(t, path, raw).map(Some)
        }
        ValueType::Map => {
            let Some(elem) = node.primitive_elem() else {
                return Err(Error::conversion(path, "map without element type"));
            };
            if data.get(&count_key(path, MAP_COUNT)).is_none() {
                return Ok(None);
            }
            let prefix = format!("{path}.");
            let mut object = JsonObject::new();
            for (key, raw) in data.attributes().range(prefix.clone()..) {
                let Some(entry) = key.strip_prefix(&prefix) else {
                    break;
                };
                if entry == MAP_COUNT {
                    continue;
                }
                object.insert(entry.to_string(), coerce(elem, key, raw)?);
            }
            Ok(Some(Value::Object(object)))
        }
        _ => {
            let Some(count) = sequence_count(data, path)? else {
                return Ok(None);
            };
            match &node.elem {
                Some(Elem::Block(block)) if node.single => match count {
                    0 => Ok(None),
                    1 => read_block(data, block, &join(path, "0"))
                        .map(|object| Some(Value::Object(object))),
                    n => Err(Error::conversion(
                        path,
                        format!("expected at most one block, got {n}"),
                    )),
                },
                Some(Elem::Block(block)) => {
                    let items = (0..count)
                        .map(|i| read_block(data, block, &join(path, &i.to_string())))
                        .map(|object| object.map(Value::Object))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Some(Value::Array(items)))
                }
                Some(Elem::Primitive(elem)) => {
                    let items = (0..count)
                        .map(|i| {
                            let item_path = join(path, &i.to_string());
                            let raw = data.get(&item_path).ok_or_else(|| {
                                Error::conversion(&item_path, "missing list element")
                            })?;
                            coerce(*elem, &item_path, raw)
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Some(Value::Array(items)))
                }
                None => Err(Error::conversion(path, "collection without element type")),
            }
        }
    }
}

fn sequence_count(data: &ResourceData, path: &str) -> Result<Option<usize>> {
    let key = count_key(path, LIST_COUNT);
    data.get(&key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| Error::conversion(&key, format!("invalid count {raw:?}")))
        })
        .transpose()
}

fn coerce(value_type: ValueType, path: &str, raw: &str) -> Result<Value> {
    match value_type {
        ValueType::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(Error::conversion(
                path,
                format!("expected a bool, got {raw:?}"),
            )),
        },
        ValueType::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| Error::conversion(path, format!("expected an integer, got {raw:?}"))),
        ValueType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Error::conversion(path, format!("expected a number, got {raw:?}"))),
        ValueType::String => Ok(Value::String(raw.to_string())),
        other => Err(Error::conversion(
            path,
            format!("{other} is not a primitive type"),
        )),
    }
}

// ============================================================================
// JSON -> State
// ============================================================================

fn write_block(
    object: &JsonObject,
    schema: &Schema,
    prefix: &str,
    data: &mut ResourceData,
) -> Result<()> {
    for (name, node) in schema {
        let path = join(prefix, name);
        match object.get(name) {
            None | Some(Value::Null) => {
                if node.computed && node.always_set {
                    data.clear(&path);
                    write_zero(node, &path, data);
                }
            }
            Some(value) => write_node(value, node, &path, data)?,
        }
    }
    Ok(())
}

fn write_node(value: &Value, node: &SchemaNode, path: &str, data: &mut ResourceData) -> Result<()> {
    data.clear(path);
    match node.value_type {
        t if t.is_primitive() => {
            let raw = render(t, value, path)?;
            data.set(path, raw);
        }
        ValueType::Map => {
            let elem = node
                .primitive_elem()
                .ok_or_else(|| Error::conversion(path, "map without element type"))?;
            let object = value.as_object().ok_or_else(|| {
                Error::conversion(path, format!("expected an object, got {}", kind(value)))
            })?;
            data.set(count_key(path, MAP_COUNT), object.len().to_string());
            for (key, item) in object {
                let item_path = join(path, key);
                let raw = render(elem, item, &item_path)?;
                data.set(item_path, raw);
            }
        }
        _ => match &node.elem {
            Some(Elem::Block(block)) if node.single => {
                let item = match value {
                    Value::Object(object) => Some(object),
                    Value::Array(items) if items.len() <= 1 => {
                        match items.first() {
                            Some(first) => Some(first.as_object().ok_or_else(|| {
                                Error::conversion(path, format!("expected an object, got {}", kind(first)))
                            })?),
                            None => None,
                        }
                    }
                    Value::Array(items) => {
                        return Err(Error::conversion(
                            path,
                            format!("expected at most one block, got {}", items.len()),
                        ))
                    }
                    other => {
                        return Err(Error::conversion(
                            path,
                            format!("expected an object, got {}", kind(other)),
                        ))
                    }
                };
                match item {
                    Some(object) => {
                        data.set(count_key(path, LIST_COUNT), "1");
                        write_block(object, block, &join(path, "0"), data)?;
                    }
                    None => data.set(count_key(path, LIST_COUNT), "0"),
                }
            }
            Some(Elem::Block(block)) => {
                let mut items: Vec<&Value> = expect_array(value, path)?.iter().collect();
                if node.value_type == ValueType::Set {
                    items.sort_by_cached_key(|item| item.to_string());
                    items.dedup();
                }
                data.set(count_key(path, LIST_COUNT), items.len().to_string());
                for (i, item) in items.into_iter().enumerate() {
                    let item_path = join(path, &i.to_string());
                    let object = item.as_object().ok_or_else(|| {
                        Error::conversion(&item_path, format!("expected an object, got {}", kind(item)))
                    })?;
                    write_block(object, block, &item_path, data)?;
                }
            }
            Some(Elem::Primitive(elem)) => {
                let items = expect_array(value, path)?;
                let mut rendered = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| render(*elem, item, &join(path, &i.to_string())))
                    .collect::<Result<Vec<_>>>()?;
                if node.value_type == ValueType::Set {
                    rendered.sort();
                    rendered.dedup();
                }
                data.set(count_key(path, LIST_COUNT), rendered.len().to_string());
                for (i, raw) in rendered.into_iter().enumerate() {
                    data.set(join(path, &i.to_string()), raw);
                }
            }
            None => return Err(Error::conversion(path, "collection without element type")),
        },
    }
    Ok(())
}

fn write_zero(node: &SchemaNode, path: &str, data: &mut ResourceData) {
    match node.value_type {
        ValueType::Bool => data.set(path, "false"),
        ValueType::Int | ValueType::Float => data.set(path, "0"),
        ValueType::String => data.set(path, ""),
        ValueType::List | ValueType::Set => data.set(count_key(path, LIST_COUNT), "0"),
        ValueType::Map => data.set(count_key(path, MAP_COUNT), "0"),
    }
}

fn expect_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::conversion(path, format!("expected an array, got {}", kind(value))))
}

/// Render a primitive JSON value as a state string
fn render(value_type: ValueType, value: &Value, path: &str) -> Result<String> {
    let rendered = match value_type {
        ValueType::Bool => value.as_bool().map(|b| b.to_string()),
        ValueType::Int => value.as_i64().map(|n| n.to_string()),
        ValueType::Float => value.as_f64().map(|n| n.to_string()),
        ValueType::String => value.as_str().map(str::to_string),
        ValueType::List | ValueType::Set | ValueType::Map => None,
    };
    rendered.ok_or_else(|| {
        Error::conversion(path, format!("expected {value_type}, got {}", kind(value)))
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
