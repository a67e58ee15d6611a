//! Picking the tabular representation a request asks for

use crate::config::TabularConfig;

pub const TEXT_CSV: &str = "text/csv";
pub const APPLICATION_CSV: &str = "application/csv";
pub const SPREADSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Marks every tabular response as a download
pub const CONTENT_DISPOSITION: &str = "attachment;";

/// Which CSV media type the client asked for, echoed back in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvMediaType {
    Text,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv(CsvMediaType),
    Spreadsheet,
}

impl OutputFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Csv(CsvMediaType::Text) => TEXT_CSV,
            OutputFormat::Csv(CsvMediaType::Application) => APPLICATION_CSV,
            OutputFormat::Spreadsheet => SPREADSHEET,
        }
    }

    pub fn content_type(&self) -> String {
        format!("{}; charset=utf-8; header=present;", self.mime())
    }

    fn from_media_range(range: &str, config: &TabularConfig) -> Option<Self> {
        let media_type = range.split(';').next()?.trim();
        if media_type.eq_ignore_ascii_case(TEXT_CSV) {
            Some(OutputFormat::Csv(CsvMediaType::Text))
        } else if media_type.eq_ignore_ascii_case(APPLICATION_CSV) {
            Some(OutputFormat::Csv(CsvMediaType::Application))
        } else if config.enable_spreadsheet && media_type.eq_ignore_ascii_case(SPREADSHEET) {
            Some(OutputFormat::Spreadsheet)
        } else {
            None
        }
    }
}

/// Outcome of negotiation: the format, if any, and the path to route on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// `None` means the original representation should be sent
    pub format: Option<OutputFormat>,

    /// Request path with any format suffix removed
    pub path: String,

    pub query: Option<String>,
}

impl Negotiation {
    /// Path and query to continue routing with
    pub fn routed_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// Decide the representation from a URL suffix or an accept value.
///
/// A `.csv` / `.xlsx` suffix wins over the accept value and is stripped
/// from the path. Wildcards never select a tabular format.
pub fn negotiate(url: &str, accept: Option<&str>, config: &TabularConfig) -> Negotiation {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (url, None),
    };

    if let Some(stripped) = path.strip_suffix(".csv") {
        return Negotiation {
            format: Some(OutputFormat::Csv(CsvMediaType::Text)),
            path: stripped.to_string(),
            query,
        };
    }

    if config.enable_spreadsheet {
        if let Some(stripped) = path.strip_suffix(".xlsx") {
            return Negotiation {
                format: Some(OutputFormat::Spreadsheet),
                path: stripped.to_string(),
                query,
            };
        }
    }

    let format = accept.and_then(|accept| {
        accept
            .split(',')
            .find_map(|range| OutputFormat::from_media_range(range, config))
    });

    Negotiation {
        format,
        path: path.to_string(),
        query,
    }
}
