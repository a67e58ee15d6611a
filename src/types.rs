use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use crate::error::SchemaError;

/// Leaf type of a scalar schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
    /// Rendered as a whole-second timestamp without zone suffix
    Date,
    /// Untyped leaf, passed through as-is
    Any,
}

/// Shape of a schema node
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Object with its fields in declaration order. No fields means a
    /// free-form object, which cannot be flattened.
    Object { children: Vec<Field> },
    /// Array with its single item schema
    Array { item: Box<SchemaNode> },
    Scalar(ScalarType),
}

/// A named child of an object schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: SchemaNode,
}

/// Normalized description of a value's shape
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,

    /// Display label. Replaces a scalar's header; a wildcard item label
    /// renames its array's columns
    pub label: Option<String>,

    /// Informational only, never enforced
    pub required: bool,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        SchemaNode {
            kind,
            label: None,
            required: false,
        }
    }

    pub fn scalar(scalar_type: ScalarType) -> Self {
        Self::new(SchemaKind::Scalar(scalar_type))
    }

    pub fn string() -> Self {
        Self::scalar(ScalarType::String)
    }

    pub fn number() -> Self {
        Self::scalar(ScalarType::Number)
    }

    pub fn integer() -> Self {
        Self::scalar(ScalarType::Integer)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarType::Boolean)
    }

    pub fn date() -> Self {
        Self::scalar(ScalarType::Date)
    }

    pub fn any() -> Self {
        Self::scalar(ScalarType::Any)
    }

    /// Object with the given fields, kept in iteration order
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        let children = fields
            .into_iter()
            .map(|(name, schema)| Field {
                name: name.into(),
                schema,
            })
            .collect();
        Self::new(SchemaKind::Object { children })
    }

    /// Object whose keys are not declared
    pub fn free_object() -> Self {
        Self::new(SchemaKind::Object { children: Vec::new() })
    }

    pub fn array(item: SchemaNode) -> Self {
        Self::new(SchemaKind::Array {
            item: Box::new(item),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Look up a direct child of an object schema
    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            SchemaKind::Object { children } => children
                .iter()
                .find(|field| field.name == name)
                .map(|field| &field.schema),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, SchemaKind::Scalar(_))
    }
}

/// One step of an access path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A single output column: its header and where to find its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub header: String,

    /// Sequential key/index lookups from the record root
    pub path: Vec<PathSegment>,

    /// Type of the leaf the path ends at
    pub scalar_type: ScalarType,

    /// Whether the header came from an explicit label
    #[serde(skip)]
    pub labelled: bool,
}

impl ColumnDefinition {
    pub fn new(header: impl Into<String>, path: Vec<PathSegment>, scalar_type: ScalarType) -> Self {
        ColumnDefinition {
            header: header.into(),
            path,
            scalar_type,
            labelled: false,
        }
    }
}

/// Ordered columns derived from a schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlattenedSchema {
    columns: Vec<ColumnDefinition>,
}

impl FlattenedSchema {
    /// Wrap computed columns, rejecting duplicate headers
    pub fn from_columns(columns: Vec<ColumnDefinition>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.header.as_str()) {
                return Err(SchemaError::DuplicateHeader(column.header.clone()));
            }
        }
        Ok(FlattenedSchema { columns })
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDefinition> {
        self.columns.iter()
    }
}

/// A materialized cell value, before stringification
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text form used by delimited sinks
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Bool(b) => Cow::Owned(b.to_string()),
            Cell::Number(n) => Cow::Owned(n.to_string()),
            Cell::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keeps_declaration_order() {
        let schema = SchemaNode::object([
            ("zeta", SchemaNode::string()),
            ("alpha", SchemaNode::number()),
        ]);

        let SchemaKind::Object { children } = &schema.kind else {
            panic!("Expected object schema");
        };
        let names: Vec<&str> = children.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(schema.child("alpha").unwrap().is_scalar());
        assert!(schema.child("missing").is_none());
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let columns = vec![
            ColumnDefinition::new("name", vec![PathSegment::Key("a".into())], ScalarType::String),
            ColumnDefinition::new("name", vec![PathSegment::Key("b".into())], ScalarType::String),
        ];

        match FlattenedSchema::from_columns(columns) {
            Err(SchemaError::DuplicateHeader(header)) => assert_eq!(header, "name"),
            other => panic!("Expected duplicate header error, got {:?}", other),
        }
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Empty.as_text(), "");
        assert_eq!(Cell::Bool(true).as_text(), "true");
        assert_eq!(Cell::Number(25.into()).to_string(), "25");
        assert_eq!(Cell::Text("x".into()).as_text(), "x");
    }
}
