use crate::error::SinkError;
use crate::types::Cell;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;

/// Column header used when a bare scalar goes to a spreadsheet
const SCALAR_COLUMN: &str = "value";

/// Consumer of a header list followed by a stream of rows
pub trait RowSink {
    /// Called once, before any row
    fn write_header(&mut self, headers: &[String]) -> Result<(), SinkError>;

    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError>;

    /// Called instead of header and rows when the response is a bare scalar
    fn write_scalar(&mut self, text: &str) -> Result<(), SinkError>;

    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Streams delimited text; rows go out as they arrive
pub struct CsvSink<W: Write> {
    output: Option<W>,
    rows: Option<csv::Writer<W>>,
    separator: u8,
}

impl<W: Write> CsvSink<W> {
    pub fn new(output: W, separator: u8) -> Self {
        CsvSink {
            output: Some(output),
            rows: None,
            separator,
        }
    }

    fn rows(&mut self) -> Result<&mut csv::Writer<W>, SinkError> {
        if self.rows.is_none() {
            let output = self.output.take().ok_or(SinkError::Finished)?;
            let writer = WriterBuilder::new()
                .delimiter(self.separator)
                .quote_style(QuoteStyle::Necessary)
                .terminator(Terminator::Any(b'\n'))
                .from_writer(output);
            self.rows = Some(writer);
        }
        self.rows.as_mut().ok_or(SinkError::Finished)
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W, SinkError> {
        match (self.rows, self.output) {
            (Some(rows), _) => rows
                .into_inner()
                .map_err(|e| SinkError::Io(e.into_error())),
            (None, Some(mut output)) => {
                output.flush()?;
                Ok(output)
            }
            (None, None) => Err(SinkError::Finished),
        }
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_header(&mut self, headers: &[String]) -> Result<(), SinkError> {
        self.rows()?.write_record(headers)?;
        Ok(())
    }

    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        self.rows()?
            .write_record(row.iter().map(|cell| cell.as_text().into_owned()))?;
        Ok(())
    }

    fn write_scalar(&mut self, text: &str) -> Result<(), SinkError> {
        // Already escaped; written raw, not as a quoted field
        let output = self.output.as_mut().ok_or(SinkError::Finished)?;
        output.write_all(text.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        match (self.rows.as_mut(), self.output.as_mut()) {
            (Some(rows), _) => rows.flush()?,
            (None, Some(output)) => output.flush()?,
            (None, None) => return Err(SinkError::Finished),
        }
        Ok(())
    }
}

/// One spreadsheet row as an ordered header → value record
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow<'a> {
    cells: Vec<(&'a str, Cell)>,
}

impl<'a> SheetRow<'a> {
    pub fn new(headers: &'a [String], row: &[Cell]) -> Self {
        SheetRow {
            cells: headers
                .iter()
                .map(String::as_str)
                .zip(row.iter().cloned())
                .collect(),
        }
    }

    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(h, _)| *h == header)
            .map(|(_, cell)| cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &Cell)> {
        self.cells.iter().map(|(h, c)| (*h, c))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Host-provided worksheet encoder. Rows are committed one at a time so the
/// workbook never has to be held in memory as a whole.
pub trait WorksheetWriter {
    fn set_columns(&mut self, headers: &[String]) -> anyhow::Result<()>;

    fn commit_row(&mut self, row: &SheetRow<'_>) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()>;
}

/// Feeds rows into a `WorksheetWriter`
pub struct SpreadsheetSink<W: WorksheetWriter> {
    worksheet: W,
    headers: Vec<String>,
    rows_committed: usize,
}

impl<W: WorksheetWriter> SpreadsheetSink<W> {
    pub fn new(worksheet: W) -> Self {
        SpreadsheetSink {
            worksheet,
            headers: Vec::new(),
            rows_committed: 0,
        }
    }

    pub fn rows_committed(&self) -> usize {
        self.rows_committed
    }

    pub fn into_inner(self) -> W {
        self.worksheet
    }
}

impl<W: WorksheetWriter> RowSink for SpreadsheetSink<W> {
    fn write_header(&mut self, headers: &[String]) -> Result<(), SinkError> {
        self.headers = headers.to_vec();
        self.worksheet
            .set_columns(&self.headers)
            .map_err(SinkError::Worksheet)
    }

    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        let record = SheetRow::new(&self.headers, row);
        self.worksheet
            .commit_row(&record)
            .map_err(SinkError::Worksheet)?;
        self.rows_committed += 1;
        Ok(())
    }

    fn write_scalar(&mut self, text: &str) -> Result<(), SinkError> {
        self.write_header(&[SCALAR_COLUMN.to_string()])?;
        self.write_row(&[Cell::Text(text.to_string())])
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.worksheet.finish().map_err(SinkError::Worksheet)
    }
}

/// Worksheet that keeps committed rows in memory, for tests and small exports
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryWorksheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<(String, Cell)>>,
    pub finished: bool,
}

impl WorksheetWriter for MemoryWorksheet {
    fn set_columns(&mut self, headers: &[String]) -> anyhow::Result<()> {
        self.columns = headers.to_vec();
        Ok(())
    }

    fn commit_row(&mut self, row: &SheetRow<'_>) -> anyhow::Result<()> {
        anyhow::ensure!(!self.finished, "worksheet already finished");
        self.rows
            .push(row.iter().map(|(h, c)| (h.to_string(), c.clone())).collect());
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.finished = true;
        Ok(())
    }
}
