//! Schema flattening: turn a nested schema into ordered output columns
//!
//! Column order is a pure function of the schema, the resolved overlay and
//! the configured array width, so a plan can be recomputed per response.

use crate::config::TabularConfig;
use crate::error::SchemaError;
use crate::overlay::ResolvedOverlay;
use crate::types::{ColumnDefinition, Field, FlattenedSchema, PathSegment, SchemaKind, SchemaNode};
use tracing::debug;

/// Reserved suffix on an array item label selecting 1-based, human headers
pub const WILDCARD_LABEL: char = '*';

/// Header for a scalar array item at the schema root, which has no key
const ROOT_ITEM_HEADER: &str = "value";

/// Naming context threaded through the recursion
#[derive(Debug, Clone)]
pub struct FlatteningContext<'a> {
    /// Key of the field being flattened; `None` at the schema root
    pub key: Option<&'a str>,

    /// Dotted path used for overlay lookups
    pub base_path: String,

    /// Set while flattening the item schema of an array
    pub parent_is_array_item: bool,

    /// Label of the current node; only a scalar's own header uses it
    pub label_override: Option<&'a str>,
}

impl<'a> FlatteningContext<'a> {
    pub fn root() -> Self {
        FlatteningContext {
            key: None,
            base_path: String::new(),
            parent_is_array_item: false,
            label_override: None,
        }
    }

    fn child(&self, name: &'a str) -> Self {
        let base_path = if self.base_path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.base_path, name)
        };

        FlatteningContext {
            key: Some(name),
            base_path,
            parent_is_array_item: false,
            label_override: None,
        }
    }

    /// Context for an array's item: same key and path, array-item naming
    fn array_item(&self) -> Self {
        FlatteningContext {
            key: self.key,
            base_path: self.base_path.clone(),
            parent_is_array_item: true,
            label_override: None,
        }
    }
}

/// How the columns of one array element are named
#[derive(Debug, Clone, PartialEq)]
enum ArrayNaming<'a> {
    /// `{name}_{i}` / `{name}_{i}.{item}`
    Indexed(&'a str),
    /// `{base}`, `{base} 2`, ... for human-facing exports
    Wildcard(&'a str),
}

impl<'a> ArrayNaming<'a> {
    fn for_item(item: &'a SchemaNode, array_name: &'a str) -> Self {
        match item.label.as_deref() {
            Some(label) if label.ends_with(WILDCARD_LABEL) => {
                let base = label.trim_end_matches(WILDCARD_LABEL).trim();
                if base.is_empty() {
                    ArrayNaming::Wildcard(array_name)
                } else {
                    ArrayNaming::Wildcard(base)
                }
            }
            _ => ArrayNaming::Indexed(array_name),
        }
    }

    fn header(&self, index: usize, single: bool, item_header: &str) -> String {
        let element = match self {
            ArrayNaming::Indexed(name) => format!("{}_{}", name, index),
            ArrayNaming::Wildcard(base) if index == 0 => base.to_string(),
            ArrayNaming::Wildcard(base) => format!("{} {}", base, index + 1),
        };

        if single {
            element
        } else {
            format!("{}.{}", element, item_header)
        }
    }
}

/// Computes the `FlattenedSchema` for a schema plus resolved overlay
pub struct Flattener<'a> {
    max_array_elements: usize,
    overlay: &'a ResolvedOverlay,
}

impl<'a> Flattener<'a> {
    pub fn new(config: &TabularConfig, overlay: &'a ResolvedOverlay) -> Self {
        Flattener {
            max_array_elements: config.max_array_elements,
            overlay,
        }
    }

    /// Flatten a response's root schema
    pub fn flatten(&self, schema: &SchemaNode) -> Result<FlattenedSchema, SchemaError> {
        let columns = self.flatten_node(schema, &FlatteningContext::root());
        debug!(columns = columns.len(), "flattened response schema");
        FlattenedSchema::from_columns(columns)
    }

    /// Apply any overlay entry at this path, then flatten
    fn flatten_node<'s>(&'s self, schema: &'s SchemaNode, ctx: &FlatteningContext<'s>) -> Vec<ColumnDefinition> {
        let schema = match self.overlay.get(&ctx.base_path) {
            Some(resolved) => {
                debug!(path = %ctx.base_path, "substituting dynamic schema");
                resolved
            }
            None => schema,
        };
        self.flatten_resolved(schema, ctx)
    }

    fn flatten_resolved<'s>(&'s self, schema: &'s SchemaNode, ctx: &FlatteningContext<'s>) -> Vec<ColumnDefinition> {
        let ctx = FlatteningContext {
            label_override: schema.label.as_deref(),
            ..ctx.clone()
        };

        match &schema.kind {
            SchemaKind::Scalar(scalar_type) => {
                let (header, path) = match ctx.key {
                    Some(key) => (ctx.label_override.unwrap_or(key), vec![PathSegment::Key(key.to_string())]),
                    // A scalar item of the root array is the record itself
                    None if ctx.parent_is_array_item => (ctx.label_override.unwrap_or(ROOT_ITEM_HEADER), Vec::new()),
                    // A bare scalar response has no columns
                    None => return Vec::new(),
                };

                let mut column = ColumnDefinition::new(header, path, *scalar_type);
                column.labelled = ctx.label_override.is_some();
                vec![column]
            }
            // Free-form objects cannot be expanded statically
            SchemaKind::Object { children } if children.is_empty() => Vec::new(),
            SchemaKind::Object { children } => self.flatten_object(children, &ctx),
            SchemaKind::Array { item } => self.flatten_array(item, &ctx),
        }
    }

    fn flatten_object<'s>(&'s self, children: &'s [Field], ctx: &FlatteningContext<'s>) -> Vec<ColumnDefinition> {
        let mut columns = Vec::new();
        for field in children {
            columns.extend(self.flatten_node(&field.schema, &ctx.child(&field.name)));
        }

        // Top-level fields of the record stay unnamespaced
        let Some(key) = ctx.key else {
            return columns;
        };

        for column in &mut columns {
            column.path.insert(0, PathSegment::Key(key.to_string()));
            if !ctx.parent_is_array_item && !column.labelled {
                column.header = format!("{}.{}", key, column.header);
            }
        }

        columns
    }

    fn flatten_array<'s>(&'s self, item: &'s SchemaNode, ctx: &FlatteningContext<'s>) -> Vec<ColumnDefinition> {
        // The item shares the array's path, so it is not looked up in the overlay again
        let template = self.flatten_resolved(item, &ctx.array_item());

        // The root array is the record sequence itself
        let Some(array_name) = ctx.key else {
            return template;
        };

        if template.is_empty() {
            return template;
        }

        let naming = ArrayNaming::for_item(item, array_name);
        // Only wildcard headers escape the enclosing object's prefix
        let labelled = naming != ArrayNaming::Indexed(array_name);
        let single = template.len() == 1;

        let mut columns = Vec::with_capacity(template.len() * self.max_array_elements);
        for index in 0..self.max_array_elements {
            for item_column in &template {
                let mut column = item_column.clone();
                column.path.insert(1, PathSegment::Index(index));
                column.header = naming.header(index, single, &item_column.header);
                column.labelled = labelled;
                columns.push(column);
            }
        }

        columns
    }
}
