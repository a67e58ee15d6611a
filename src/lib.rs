//! # Tabulate - schema-driven tabular exports
//!
//! Turns nested JSON response bodies into CSV or spreadsheet rows, guided by
//! a declared response schema rather than by whatever the data happens to
//! contain. Every row of an export has the same columns in the same order.
//!
//! ## Modules
//!
//! - **types**: schema model, column definitions and cells
//! - **flatten**: schema flattening, row materialization and output sinks
//! - **overlay**: per-request dynamic schemas resolved before flattening
//! - **routes**: route registry, content negotiation and the exporter
//! - **schema**: JSON-Schema conversion and schema inference from samples
//!
//! ## Quick Start
//!
//! ```rust
//! use tabulate::{write_csv, SchemaNode, TabularConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = SchemaNode::object([
//!     ("first_name", SchemaNode::string()),
//!     ("tags", SchemaNode::array(SchemaNode::string())),
//! ]);
//! let config = TabularConfig {
//!     max_array_elements: 2,
//!     ..Default::default()
//! };
//!
//! let body = json!({"first_name": "Alice", "tags": ["a", "b", "c"]});
//! let csv = write_csv(&schema, body, &config, Vec::new())?;
//!
//! assert_eq!(String::from_utf8(csv)?, "first_name,tags_0,tags_1\nAlice,a,b\n");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod flatten;
pub mod overlay;
pub mod routes;
pub mod schema;
pub mod types;

// Re-export commonly used types for convenience
pub use config::TabularConfig;
pub use error::{ConfigError, ExportError, OverlayResolutionError, SchemaError, SinkError};
pub use flatten::{CsvSink, Flattener, RowMaterializer, RowSink, SpreadsheetSink, WorksheetWriter};
pub use overlay::{DynamicOverlay, FnResolver, ResolvedOverlay, SchemaResolver};
pub use routes::export::write_csv;
pub use routes::{negotiate, Exporter, OutputFormat, RequestContext, RouteDeclaration, RouteRegistry};
pub use schema::{from_json_schema, infer_schema};
pub use types::{Cell, ColumnDefinition, FlattenedSchema, PathSegment, ScalarType, SchemaNode};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_schema_to_csv() {
        let document = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "owner": {
                        "type": "object",
                        "properties": {"name": {"type": "string"}}
                    },
                    "seen": {"type": "string", "format": "date-time"}
                }
            }
        });
        let schema = from_json_schema(&document).unwrap();
        let body = json!([
            {"id": 1, "owner": {"name": "Alice"}, "seen": "2016-07-04T13:56:31.000Z"},
            {"id": 2, "owner": null}
        ]);

        let csv = write_csv(&schema, body, &TabularConfig::default(), Vec::new()).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "id,owner.name,seen\n1,Alice,2016-07-04T13:56:31\n2,,\n"
        );
    }

    #[test]
    fn test_inferred_schema_to_csv() {
        let records = vec![
            json!({"name": "Alice", "langs": ["en", "fr"]}),
            json!({"name": "Bob", "langs": ["de"]}),
        ];
        let schema = infer_schema(&records);
        let config = TabularConfig {
            max_array_elements: 2,
            ..Default::default()
        };

        let csv = write_csv(&schema, serde_json::Value::Array(records), &config, Vec::new()).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "name,langs_0,langs_1\nAlice,en,fr\nBob,de,\n"
        );
    }

    #[test]
    fn test_duplicate_headers_are_fatal() {
        let schema = SchemaNode::object([
            ("a", SchemaNode::string().with_label("Name")),
            ("b", SchemaNode::string().with_label("Name")),
        ]);

        let result = write_csv(&schema, json!([]), &TabularConfig::default(), Vec::new());
        assert!(matches!(
            result,
            Err(ExportError::Schema(SchemaError::DuplicateHeader(h))) if h == "Name"
        ));
    }
}
