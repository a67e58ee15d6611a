//! Per-response export: resolve, flatten, then stream rows into a sink
//!
//! Every fatal condition (schema problems, failing resolvers) is raised by
//! `Exporter::prepare`, before the first byte of tabular output exists.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::negotiate::{OutputFormat, CONTENT_DISPOSITION};
use super::{RequestContext, RouteRegistry};
use crate::config::TabularConfig;
use crate::error::{ConfigError, ExportError, SinkError};
use crate::flatten::{Dataset, Flattener, RowMaterializer, RowSink};
use crate::overlay::ResolvedOverlay;
use crate::types::{Cell, FlattenedSchema, SchemaNode};

/// Response metadata for a tabular body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub content_type: String,
    pub content_disposition: &'static str,
    /// Only set for delimited text
    pub separator: Option<char>,
}

/// Turns handler responses into tabular output for registered routes
#[derive(Debug, Clone)]
pub struct Exporter {
    registry: Arc<RouteRegistry>,
    config: TabularConfig,
}

impl Exporter {
    pub fn new(registry: Arc<RouteRegistry>, config: TabularConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Exporter { registry, config })
    }

    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    /// Resolve overlays and flatten for one response.
    ///
    /// `Ok(None)` means tabular output does not apply (no schema for the
    /// route, or the format is switched off) and the host should send the
    /// original representation.
    pub async fn prepare(
        &self,
        request: &RequestContext,
        format: OutputFormat,
        body: Value,
    ) -> Result<Option<PreparedExport>, ExportError> {
        if format == OutputFormat::Spreadsheet && !self.config.enable_spreadsheet {
            debug!(route = %request.route, "spreadsheet output disabled");
            return Ok(None);
        }

        let Some(route) = self.registry.get(&request.route) else {
            debug!(route = %request.route, "no response schema declared");
            return Ok(None);
        };

        let overlay = route
            .overlay
            .resolve(request, self.config.resolver_concurrency)
            .await?;

        let prepared = PreparedExport::build(&route.schema, &overlay, body, format, &self.config)?;
        Ok(Some(prepared))
    }

    /// `prepare` followed by streaming every row into `sink`
    pub async fn export<S>(
        &self,
        request: &RequestContext,
        format: OutputFormat,
        body: Value,
        sink: &mut S,
    ) -> Result<Option<ResponseHead>, ExportError>
    where
        S: RowSink + ?Sized,
    {
        let Some(prepared) = self.prepare(request, format, body).await? else {
            return Ok(None);
        };

        let rows = prepared.stream(sink)?;
        debug!(route = %request.route, rows, "tabular export finished");
        Ok(Some(prepared.head()))
    }
}

#[derive(Debug, Clone)]
enum PreparedBody {
    Rows {
        columns: FlattenedSchema,
        records: Vec<Value>,
    },
    Scalar(String),
}

/// A response whose columns are fixed and whose rows are ready to stream
#[derive(Debug, Clone)]
pub struct PreparedExport {
    format: OutputFormat,
    separator: char,
    materializer: RowMaterializer,
    body: PreparedBody,
}

impl PreparedExport {
    /// Flatten `schema` for `body`; bare scalars skip flattening entirely
    pub fn build(
        schema: &SchemaNode,
        overlay: &ResolvedOverlay,
        body: Value,
        format: OutputFormat,
        config: &TabularConfig,
    ) -> Result<Self, ExportError> {
        let materializer = RowMaterializer::new(config)?;
        let (schema, body) = unwrap_result_key(schema, body, config.result_key.as_deref());

        let body = match Dataset::classify(body) {
            Dataset::Scalar(text) => PreparedBody::Scalar(text),
            Dataset::Records(records) => PreparedBody::Rows {
                columns: Flattener::new(config, overlay).flatten(schema)?,
                records,
            },
        };

        Ok(PreparedExport {
            format,
            separator: config.separator,
            materializer,
            body,
        })
    }

    pub fn head(&self) -> ResponseHead {
        ResponseHead {
            content_type: self.format.content_type(),
            content_disposition: CONTENT_DISPOSITION,
            separator: match self.format {
                OutputFormat::Csv(_) => Some(self.separator),
                OutputFormat::Spreadsheet => None,
            },
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Columns of the export; `None` for a bare scalar body
    pub fn columns(&self) -> Option<&FlattenedSchema> {
        match &self.body {
            PreparedBody::Rows { columns, .. } => Some(columns),
            PreparedBody::Scalar(_) => None,
        }
    }

    /// Lazily materialized rows, for hosts that pull instead of push
    pub fn rows(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        let (columns, records) = match &self.body {
            PreparedBody::Rows { columns, records } => (Some(columns), records.as_slice()),
            PreparedBody::Scalar(_) => (None, &[][..]),
        };

        records
            .iter()
            .filter_map(move |record| columns.map(|c| self.materializer.materialize(c, record)))
    }

    /// Push the header and every row into `sink`, returning the row count.
    ///
    /// A sink error stops production immediately.
    pub fn stream<S>(&self, sink: &mut S) -> Result<usize, SinkError>
    where
        S: RowSink + ?Sized,
    {
        let mut count = 0;
        match &self.body {
            PreparedBody::Scalar(text) => sink.write_scalar(text)?,
            PreparedBody::Rows { columns, records } => {
                sink.write_header(&columns.headers())?;
                for record in records {
                    sink.write_row(&self.materializer.materialize(columns, record))?;
                    count += 1;
                }
            }
        }
        sink.finish()?;
        Ok(count)
    }
}

/// Unwrap the configured envelope field from both schema and body
fn unwrap_result_key<'s>(schema: &'s SchemaNode, body: Value, key: Option<&str>) -> (&'s SchemaNode, Value) {
    let Some(key) = key else {
        return (schema, body);
    };

    match (schema.child(key), body) {
        (Some(inner), Value::Object(mut envelope)) => {
            debug!(result_key = key, "unwrapping response envelope");
            let records = envelope.remove(key).unwrap_or_else(|| Value::Array(Vec::new()));
            (inner, records)
        }
        (_, body) => (schema, body),
    }
}

/// Write `body` as CSV for a schema without going through a registry
pub fn write_csv<W>(
    schema: &SchemaNode,
    body: Value,
    config: &TabularConfig,
    output: W,
) -> Result<W, ExportError>
where
    W: std::io::Write,
{
    config.validate()?;
    let format = OutputFormat::Csv(super::CsvMediaType::Text);
    let prepared = PreparedExport::build(schema, &ResolvedOverlay::default(), body, format, config)?;

    let mut sink = crate::flatten::CsvSink::new(output, config.separator_byte());
    prepared.stream(&mut sink)?;
    Ok(sink.into_inner()?)
}
