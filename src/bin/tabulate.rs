//! tabulate: Convert nested JSON into CSV with a fixed column layout
//!
//! Usage:
//!   # Infer the schema from the data, read from file
//!   tabulate data.json
//!
//!   # Read from stdin with an explicit JSON-Schema
//!   cat users.json | tabulate --schema users.schema.json
//!
//!   # NDJSON input, semicolon separated, two columns per array
//!   tabulate --ndjson events.jsonl --separator ';' --max-array-elements 2
//!
//!   # Unwrap a pagination envelope and only print the headers
//!   tabulate page.json --result-key items --columns

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use tabulate::schema::{from_json_schema, infer_schema};
use tabulate::{write_csv, Flattener, ResolvedOverlay, SchemaNode, TabularConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tabulate")]
#[command(about = "Flatten nested JSON into CSV rows", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// JSON-Schema of the input or of one record (inferred if omitted)
    #[arg(long)]
    schema: Option<String>,

    /// Process newline-delimited JSON (one record per line)
    #[arg(long)]
    ndjson: bool,

    /// JSON file with a full configuration; flags below override it
    #[arg(long)]
    config: Option<String>,

    /// Column separator (default: ",")
    #[arg(long)]
    separator: Option<char>,

    /// Column groups per array field (default: 5)
    #[arg(long)]
    max_array_elements: Option<usize>,

    /// Field holding the records inside a response envelope
    #[arg(long)]
    result_key: Option<String>,

    /// Number of records to sample when inferring the schema
    #[arg(long, default_value_t = 100)]
    sample_size: usize,

    /// Print the column headers, one per line, instead of the data
    #[arg(long)]
    columns: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let body = read_body(args.input.as_deref(), args.ndjson)?;

    let schema = match &args.schema {
        Some(path) => {
            let document: Value = serde_json::from_reader(BufReader::new(
                File::open(path).with_context(|| format!("Failed to open schema {}", path))?,
            ))
            .context("Failed to parse schema document")?;
            from_json_schema(&document)?
        }
        None => infer_from_sample(&body, args.sample_size),
    };

    if args.columns {
        let flattened = Flattener::new(&config, &ResolvedOverlay::default()).flatten(&schema)?;
        let mut stdout = io::stdout().lock();
        for header in flattened.headers() {
            writeln!(stdout, "{}", header)?;
        }
        return Ok(());
    }

    let output = write_csv(&schema, body, &config, BufWriter::new(io::stdout().lock()))?;
    output
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush output")?;

    Ok(())
}

fn build_config(args: &Args) -> Result<TabularConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open config {}", path))?;
            serde_json::from_reader(BufReader::new(file)).context("Failed to parse config")?
        }
        None => TabularConfig::default(),
    };

    if let Some(separator) = args.separator {
        config.separator = separator;
    }
    if let Some(max) = args.max_array_elements {
        config.max_array_elements = max;
    }
    if let Some(key) = &args.result_key {
        config.result_key = Some(key.clone());
    }

    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

/// Read the whole input as one body; NDJSON lines become an array of records
fn read_body(input: Option<&str>, ndjson: bool) -> Result<Value> {
    let mut reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    if ndjson {
        return parse_lines(reader);
    }

    let mut content = Vec::new();
    reader.read_to_end(&mut content).context("Failed to read input")?;

    // simd-json parses in place, so keep a copy for the line-based fallback
    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!(error = %e, "input is not a single document, trying NDJSON");
            parse_lines(BufReader::new(content.as_slice()))
        }
    }
}

fn parse_lines<R: BufRead>(reader: R) -> Result<Value> {
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse JSON on line {}", number + 1))?;
        records.push(record);
    }

    info!(records = records.len(), "read NDJSON input");
    Ok(Value::Array(records))
}

fn infer_from_sample(body: &Value, sample_size: usize) -> SchemaNode {
    match body {
        Value::Array(records) => {
            let sample = &records[..records.len().min(sample_size)];
            info!(sampled = sample.len(), "inferring schema from records");
            SchemaNode::array(infer_schema(sample))
        }
        other => infer_schema(std::slice::from_ref(other)),
    }
}
