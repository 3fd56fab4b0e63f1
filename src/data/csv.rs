// CSV data source and reader options
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{DataError, DataSource, LocalColumn, LocalTable};

/// Options shared by local CSV reading and the engine's CSV reader and writer
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub sep: String,
    pub quotechar: String,
    /// Lines skipped at the top of each file
    pub skip: usize,
    /// Maximum number of lines read; 0 reads everything
    pub num_lines_read: usize,
    /// Column names for files without a header line
    pub colnames: Option<Vec<String>>,
    pub time_formats: Vec<String>,
    /// Maximum number of lines per written file; 0 writes a single file
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            sep: ",".to_string(),
            quotechar: "\"".to_string(),
            skip: 0,
            num_lines_read: 0,
            colnames: None,
            time_formats: Vec::new(),
            batch_size: 0,
        }
    }
}

impl CsvOptions {
    pub fn sep(mut self, sep: &str) -> Self {
        self.sep = sep.to_string();
        self
    }

    pub fn quotechar(mut self, quotechar: &str) -> Self {
        self.quotechar = quotechar.to_string();
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn num_lines_read(mut self, num_lines_read: usize) -> Self {
        self.num_lines_read = num_lines_read;
        self
    }

    pub fn colnames<S: AsRef<str>>(mut self, colnames: &[S]) -> Self {
        self.colnames = Some(colnames.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn time_formats<S: AsRef<str>>(mut self, time_formats: &[S]) -> Self {
        self.time_formats = time_formats.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn single_byte(value: &str, what: &str) -> Result<u8, DataError> {
        match value.as_bytes() {
            [b] => Ok(*b),
            _ => Err(DataError::Value(format!("'{}' must be a single character.", what))),
        }
    }
}

/// CSV data source
pub struct CsvSource {
    path: String,
    options: CsvOptions,
}

impl CsvSource {
    /// Create a new CSV data source
    pub fn new<P: AsRef<Path>>(path: P, options: CsvOptions) -> Self {
        CsvSource {
            path: path.as_ref().to_string_lossy().to_string(),
            options,
        }
    }
}

impl DataSource for CsvSource {
    fn read(&self) -> Result<LocalTable, DataError> {
        let delimiter = CsvOptions::single_byte(&self.options.sep, "sep")?;
        let quote = CsvOptions::single_byte(&self.options.quotechar, "quotechar")?;

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records().skip(self.options.skip);

        // Header line unless the caller named the columns
        let headers: Vec<String> = match &self.options.colnames {
            Some(colnames) => colnames.clone(),
            None => records
                .next()
                .ok_or_else(|| DataError::Parse(format!("'{}' is empty", self.path)))?
                .map_err(|e| DataError::Parse(e.to_string()))?
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for (i, result) in records.enumerate() {
            if self.options.num_lines_read > 0 && i >= self.options.num_lines_read {
                break;
            }

            let record = result.map_err(|e| DataError::Parse(e.to_string()))?;

            if record.len() != headers.len() {
                return Err(DataError::Parse(format!(
                    "Line {} of '{}' has {} fields, expected {}",
                    i + 1,
                    self.path,
                    record.len(),
                    headers.len()
                )));
            }

            for (column, field) in values.iter_mut().zip(record.iter()) {
                column.push(if field.is_empty() { None } else { Some(field.to_string()) });
            }
        }

        let mut table = LocalTable::new();
        for (name, column) in headers.iter().zip(values) {
            table.push_column(name, LocalColumn::infer(column))?;
        }

        Ok(table)
    }

    fn name(&self) -> &str {
        &self.path
    }
}
