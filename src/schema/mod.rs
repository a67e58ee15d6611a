//! Schema sources
//!
//! Hosts usually declare route schemas in code, but schemas can also come
//! from a JSON-Schema document or be inferred from sample records.

pub mod builder;
pub mod json_schema;

pub use builder::{infer_schema, SchemaBuilder};
pub use json_schema::from_json_schema;
