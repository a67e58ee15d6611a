//! Conversion of JSON-Schema documents into `SchemaNode`s
//!
//! Only the structural subset matters for flattening: `type`, `properties`,
//! `items`, `required`, `title` (used as a label) and `format` (to spot
//! date leaves). Everything else is ignored.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::types::{Field, ScalarType, SchemaKind, SchemaNode};

const ROOT_PATH: &str = "$";

/// Convert a JSON-Schema document into a `SchemaNode`
pub fn from_json_schema(document: &Value) -> Result<SchemaNode, SchemaError> {
    convert(document, ROOT_PATH)
}

fn convert(schema: &Value, path: &str) -> Result<SchemaNode, SchemaError> {
    let Some(schema) = schema.as_object() else {
        return Err(SchemaError::Malformed {
            path: path.to_string(),
            found: describe(schema),
        });
    };

    let kind = match schema_type(schema, path)? {
        Some("object") => convert_object(schema, path)?,
        Some("array") => convert_array(schema, path)?,
        Some("string") => SchemaKind::Scalar(string_type(schema)),
        Some("number") => SchemaKind::Scalar(ScalarType::Number),
        Some("integer") => SchemaKind::Scalar(ScalarType::Integer),
        Some("boolean") => SchemaKind::Scalar(ScalarType::Boolean),
        Some("null") | None => match first_alternative(schema) {
            Some(alternative) => return Ok(with_title(convert(alternative, path)?, schema)),
            None => SchemaKind::Scalar(ScalarType::Any),
        },
        Some(other) => {
            return Err(SchemaError::UnknownKind {
                path: path.to_string(),
                kind: other.to_string(),
            })
        }
    };

    Ok(with_title(SchemaNode::new(kind), schema))
}

/// The declared type; a type list picks its first non-null entry, and a
/// missing type is inferred from `properties` / `items`
fn schema_type<'s>(schema: &'s Map<String, Value>, path: &str) -> Result<Option<&'s str>, SchemaError> {
    match schema.get("type") {
        Some(Value::String(t)) => Ok(Some(t.as_str())),
        Some(Value::Array(types)) => Ok(types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .or(Some("null"))),
        Some(other) => Err(SchemaError::Malformed {
            path: format!("{}.type", path),
            found: describe(other),
        }),
        None if schema.contains_key("properties") => Ok(Some("object")),
        None if schema.contains_key("items") => Ok(Some("array")),
        None => Ok(None),
    }
}

fn string_type(schema: &Map<String, Value>) -> ScalarType {
    match schema.get("format").and_then(Value::as_str) {
        Some("date-time") | Some("date") => ScalarType::Date,
        _ => ScalarType::String,
    }
}

fn convert_object(schema: &Map<String, Value>, path: &str) -> Result<SchemaKind, SchemaError> {
    let properties = match schema.get("properties") {
        None => return Ok(SchemaKind::Object { children: Vec::new() }),
        Some(Value::Object(properties)) => properties,
        Some(other) => {
            return Err(SchemaError::Malformed {
                path: format!("{}.properties", path),
                found: describe(other),
            })
        }
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut children = Vec::with_capacity(properties.len());
    for (name, property) in properties {
        let mut child = convert(property, &format!("{}.{}", path, name))?;
        child.required = required.contains(&name.as_str());
        children.push(Field {
            name: name.clone(),
            schema: child,
        });
    }

    Ok(SchemaKind::Object { children })
}

fn convert_array(schema: &Map<String, Value>, path: &str) -> Result<SchemaKind, SchemaError> {
    let item_path = format!("{}[]", path);
    let item = match schema.get("items") {
        // Tuple form: the first position stands for every element
        Some(Value::Array(positions)) => match positions.first() {
            Some(first) => convert(first, &item_path)?,
            None => SchemaNode::any(),
        },
        Some(items) => convert(items, &item_path)?,
        None => SchemaNode::any(),
    };

    Ok(SchemaKind::Array {
        item: Box::new(item),
    })
}

/// First non-null branch of an `anyOf` / `oneOf`
fn first_alternative(schema: &Map<String, Value>) -> Option<&Value> {
    ["anyOf", "oneOf"]
        .iter()
        .filter_map(|keyword| schema.get(*keyword).and_then(Value::as_array))
        .flatten()
        .find(|alternative| alternative.get("type").and_then(Value::as_str) != Some("null"))
}

fn with_title(node: SchemaNode, schema: &Map<String, Value>) -> SchemaNode {
    match schema.get("title").and_then(Value::as_str) {
        Some(title) => node.with_label(title),
        None => node,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}
