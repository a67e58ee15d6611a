//! Streaming schema inference from sample records
//!
//! Statistics are accumulated one value at a time and the `SchemaNode` is
//! built once at the end, so no intermediate schemas are merged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::types::{Field, ScalarType, SchemaKind, SchemaNode};

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

/// Counts how many strings looked like timestamps
#[derive(Debug, Default)]
struct StringStats {
    dates: usize,
    total: usize,
}

impl StringStats {
    fn add_string(&mut self, s: &str) {
        self.total += 1;
        if is_date(s) {
            self.dates += 1;
        }
    }

    /// Date only when every sample was one
    fn scalar_type(&self) -> ScalarType {
        if self.total > 0 && self.dates == self.total {
            ScalarType::Date
        } else {
            ScalarType::String
        }
    }
}

#[derive(Debug, Default)]
struct ArrayBuilder {
    items: Box<SchemaBuilder>,
}

impl ArrayBuilder {
    fn add_array(&mut self, items: &[Value]) {
        for item in items {
            self.items.add_value(item);
        }
    }

    fn build(self) -> SchemaNode {
        SchemaNode::array(self.items.build())
    }
}

/// Properties in first-seen order, with how often each one appeared
#[derive(Debug, Default)]
struct ObjectBuilder {
    properties: Vec<(String, SchemaBuilder, usize)>,
    index: HashMap<String, usize>,
    samples: usize,
}

impl ObjectBuilder {
    fn add_object(&mut self, object: &Map<String, Value>) {
        self.samples += 1;

        for (key, value) in object {
            let position = match self.index.get(key) {
                Some(&position) => position,
                None => {
                    self.properties.push((key.clone(), SchemaBuilder::new(), 0));
                    self.index.insert(key.clone(), self.properties.len() - 1);
                    self.properties.len() - 1
                }
            };

            let (_, builder, seen) = &mut self.properties[position];
            builder.add_value(value);
            *seen += 1;
        }
    }

    fn build(self) -> SchemaNode {
        let samples = self.samples;
        let children = self
            .properties
            .into_iter()
            .map(|(name, builder, seen)| {
                let mut schema = builder.build();
                // Required when present in every sample
                schema.required = seen == samples;
                Field { name, schema }
            })
            .collect();

        SchemaNode::new(SchemaKind::Object { children })
    }
}

/// Accumulates values and builds the `SchemaNode` describing all of them
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    type_counts: HashMap<JsonType, usize>,
    sample_count: usize,
    string_stats: Option<StringStats>,
    array_builder: Option<ArrayBuilder>,
    object_builder: Option<ObjectBuilder>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the builder, accumulating statistics
    pub fn add_value(&mut self, value: &Value) {
        self.sample_count += 1;
        *self.type_counts.entry(JsonType::from_value(value)).or_insert(0) += 1;

        match value {
            Value::String(s) => self.string_stats.get_or_insert_with(StringStats::default).add_string(s),
            Value::Array(items) => self.array_builder.get_or_insert_with(ArrayBuilder::default).add_array(items),
            Value::Object(object) => self
                .object_builder
                .get_or_insert_with(ObjectBuilder::default)
                .add_object(object),
            _ => {}
        }
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Build the schema. Nulls never decide the type; conflicting types
    /// (other than integer vs number) collapse to an untyped leaf.
    pub fn build(self) -> SchemaNode {
        let mut types: Vec<JsonType> = self
            .type_counts
            .keys()
            .copied()
            .filter(|t| *t != JsonType::Null)
            .collect();

        if types.len() == 2 && types.contains(&JsonType::Integer) && types.contains(&JsonType::Number) {
            types = vec![JsonType::Number];
        }

        let [json_type] = types.as_slice() else {
            return SchemaNode::any();
        };

        match json_type {
            JsonType::Boolean => SchemaNode::boolean(),
            JsonType::Integer => SchemaNode::integer(),
            JsonType::Number => SchemaNode::number(),
            JsonType::String => SchemaNode::scalar(
                self.string_stats
                    .map_or(ScalarType::String, |stats| stats.scalar_type()),
            ),
            JsonType::Array => self
                .array_builder
                .map_or_else(|| SchemaNode::array(SchemaNode::any()), ArrayBuilder::build),
            JsonType::Object => self
                .object_builder
                .map_or_else(SchemaNode::free_object, ObjectBuilder::build),
            JsonType::Null => SchemaNode::any(),
        }
    }
}

fn is_date(value: &str) -> bool {
    match value.len() {
        10 => ISO_DATE_REGEX.is_match(value),
        len if len >= 19 && value.as_bytes()[10] == b'T' => ISO_DATETIME_REGEX.is_match(value),
        _ => false,
    }
}

/// Infer the schema of one record from sample records
pub fn infer_schema(examples: &[Value]) -> SchemaNode {
    let mut builder = SchemaBuilder::new();
    for example in examples {
        builder.add_value(example);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_builder() {
        assert_eq!(SchemaBuilder::new().build(), SchemaNode::any());
    }

    #[test]
    fn test_scalars() {
        assert_eq!(infer_schema(&[json!("hello"), json!("world")]), SchemaNode::string());
        assert_eq!(infer_schema(&[json!(42), json!(100)]), SchemaNode::integer());
        assert_eq!(infer_schema(&[json!(1), json!(2.5)]), SchemaNode::number());
        assert_eq!(infer_schema(&[json!(true), json!(null)]), SchemaNode::boolean());
        assert_eq!(infer_schema(&[json!(1), json!("x")]), SchemaNode::any());
    }

    #[test]
    fn test_object_keeps_first_seen_order() {
        let schema = infer_schema(&[
            json!({"name": "Alice", "age": 30}),
            json!({"name": "Bob", "email": "bob@example.com"}),
        ]);

        let SchemaKind::Object { children } = &schema.kind else {
            panic!("Expected object, got {:?}", schema.kind);
        };
        let names: Vec<&str> = children.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "email"]);

        assert!(children[0].schema.required);
        assert!(!children[1].schema.required);
        assert!(!children[2].schema.required);
    }

    #[test]
    fn test_date_detection() {
        assert_eq!(
            infer_schema(&[json!("2016-07-04T13:56:31.000Z"), json!("2021-01-01")]),
            SchemaNode::date()
        );
        assert_eq!(
            infer_schema(&[json!("2016-07-04T13:56:31"), json!("tomorrow")]),
            SchemaNode::string()
        );
    }

    #[test]
    fn test_nested_arrays_and_objects() {
        let schema = infer_schema(&[json!({
            "user": {"name": "Alice"},
            "posts": [{"id": 1, "title": "First"}, {"id": 2}],
            "tags": [],
            "meta": {}
        })]);

        assert_eq!(
            schema.child("user"),
            Some(&SchemaNode::object([("name", SchemaNode::string().required())]).required())
        );

        let Some(SchemaNode { kind: SchemaKind::Array { item }, .. }) = schema.child("posts") else {
            panic!("Expected posts array");
        };
        assert!(item.child("id").unwrap().required);
        assert!(!item.child("title").unwrap().required);

        assert_eq!(schema.child("tags"), Some(&SchemaNode::array(SchemaNode::any()).required()));
        assert_eq!(schema.child("meta"), Some(&SchemaNode::free_object().required()));
    }
}
