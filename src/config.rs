use serde::Deserialize;

use crate::error::ConfigError;

/// Process-wide configuration for tabular output, fixed at startup
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    /// Column separator for delimited text
    pub separator: char,

    /// Number of column groups every array field expands to
    pub max_array_elements: usize,

    /// Whether spreadsheet output may be negotiated
    pub enable_spreadsheet: bool,

    /// Field to unwrap from a response envelope, e.g. a pagination wrapper
    pub result_key: Option<String>,

    /// Leading characters that make a string cell a formula candidate
    pub risky_chars: Vec<char>,

    /// Character prepended to neutralize risky strings
    pub injection_prefix: char,

    /// Upper bound on dynamic schema resolvers running at once
    pub resolver_concurrency: usize,
}

impl Default for TabularConfig {
    fn default() -> Self {
        TabularConfig {
            separator: ',',
            max_array_elements: 5,
            enable_spreadsheet: false,
            result_key: None,
            risky_chars: vec!['=', '+', '-', '@'],
            injection_prefix: '\'',
            resolver_concurrency: 8,
        }
    }
}

impl TabularConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.separator.is_ascii() {
            return Err(ConfigError::Separator(self.separator));
        }
        if self.max_array_elements == 0 {
            return Err(ConfigError::ArrayWidth);
        }
        if self.is_risky(self.injection_prefix) {
            return Err(ConfigError::RiskyPrefix(self.injection_prefix));
        }
        if self.resolver_concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        Ok(())
    }

    pub fn is_risky(&self, c: char) -> bool {
        self.risky_chars.contains(&c)
    }

    /// Separator as the single byte the csv writer expects
    pub fn separator_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.separator as u8
    }
}
