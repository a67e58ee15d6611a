//! Schema flattening into tabular rows
//!
//! This module turns a nested schema into an ordered list of columns, applies
//! those columns to records, and pushes the resulting rows into sinks.
//!
//! The column plan is computed once per response; rows are produced one
//! record at a time and streamed, so the output is never buffered whole.

pub mod materialize;
pub mod plan;
pub mod writer;

pub use materialize::{resolve_path, Dataset, RowMaterializer};
pub use plan::{Flattener, FlatteningContext, WILDCARD_LABEL};
pub use writer::{CsvSink, MemoryWorksheet, RowSink, SheetRow, SpreadsheetSink, WorksheetWriter};
