//! Dataset rows, CSV output, cleaning and summaries.
//!
//! A dataset is a flat CSV file: a `class` column followed by the feature
//! columns of one feature mode. One row is written per processed frame.

use crate::core::features::{FeatureExtractor, FeatureMode};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Name of the label column.
pub const CLASS_COLUMN: &str = "class";

/// One labeled feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// Render as a CSV line (without trailing newline).
    pub fn to_csv(&self) -> String {
        let mut line = escape_field(&self.label);
        for value in &self.values {
            line.push(',');
            line.push_str(&value.to_string());
        }
        line
    }
}

/// Dataset errors.
#[derive(Debug)]
pub enum DatasetError {
    Io(std::io::Error),
    /// The file content does not match the expected layout.
    Format { line: usize, message: String },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io(e) => write!(f, "IO error: {e}"),
            DatasetError::Format { line, message } => {
                write!(f, "Format error at line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Io(e) => Some(e),
            DatasetError::Format { .. } => None,
        }
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(e: std::io::Error) -> Self {
        DatasetError::Io(e)
    }
}

/// Header columns for a feature mode: `class` followed by the feature names.
pub fn header(extractor: &FeatureExtractor, mode: FeatureMode) -> Vec<String> {
    std::iter::once(CLASS_COLUMN.to_string())
        .chain(extractor.feature_names(mode))
        .collect()
}

/// Quote a field when it contains a separator, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split a CSV line, honoring double-quoted fields.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Reads whole CSV records, joining physical lines while a quoted field is
/// still open.
struct CsvRecords<R: BufRead> {
    reader: R,
    line: usize,
}

impl<R: BufRead> CsvRecords<R> {
    fn new(reader: R) -> Self {
        Self { reader, line: 0 }
    }

    /// Next record without its line terminator, `None` at end of input.
    fn next_record(&mut self) -> Result<Option<String>, DatasetError> {
        let mut record = String::new();
        let start = self.line + 1;
        loop {
            let read = self.reader.read_line(&mut record)?;
            if read == 0 {
                if record.is_empty() {
                    return Ok(None);
                }
                return Err(DatasetError::Format {
                    line: start,
                    message: "unterminated quoted field".to_string(),
                });
            }
            self.line += 1;

            // Doubled quotes keep the parity, so an odd count means still open.
            if record.matches('"').count() % 2 == 0 {
                break;
            }
        }

        if record.ends_with('\n') {
            record.pop();
            if record.ends_with('\r') {
                record.pop();
            }
        }
        Ok(Some(record))
    }
}

/// Writes feature rows to a CSV dataset file.
pub struct DatasetWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    columns: usize,
    rows_written: u64,
}

impl DatasetWriter {
    /// Create (or truncate) a dataset file and write its header.
    pub fn create(path: impl AsRef<Path>, header: &[String]) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", header.join(","))?;

        Ok(Self {
            writer,
            path,
            columns: header.len(),
            rows_written: 0,
        })
    }

    /// Open an existing dataset for appending.
    ///
    /// The existing header must match; a missing or empty file is created
    /// with the header instead.
    pub fn append(path: impl AsRef<Path>, header: &[String]) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let existing = match File::open(path) {
            Ok(file) => BufReader::new(file).lines().next().transpose()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let Some(existing) = existing else {
            return Self::create(path, header);
        };

        if split_line(existing.trim_end()) != header {
            return Err(DatasetError::Format {
                line: 1,
                message: format!("existing header does not match: {existing}"),
            });
        }

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            columns: header.len(),
            rows_written: 0,
        })
    }

    /// Write one row.
    pub fn write_row(&mut self, row: &FeatureRow) -> Result<(), DatasetError> {
        if row.values.len() + 1 != self.columns {
            return Err(DatasetError::Format {
                line: self.rows_written as usize + 2,
                message: format!(
                    "row has {} values, expected {}",
                    row.values.len(),
                    self.columns - 1
                ),
            });
        }
        writeln!(self.writer, "{}", row.to_csv())?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DatasetError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A dataset loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub header: Vec<String>,
    /// Raw field values per row, label first.
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Read a CSV dataset. Blank lines are ignored; quoted fields may span
    /// line breaks.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let mut records = CsvRecords::new(BufReader::new(file));

        let header = match records.next_record()? {
            Some(record) => split_line(record.trim_end()),
            None => {
                return Err(DatasetError::Format {
                    line: 1,
                    message: "missing header".to_string(),
                })
            }
        };

        let mut rows = Vec::new();
        while let Some(record) = records.next_record()? {
            if record.trim().is_empty() {
                continue;
            }
            rows.push(split_line(&record));
        }

        Ok(Self { header, rows })
    }

    /// Write the dataset back to a CSV file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", self.header.join(","))?;
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|f| escape_field(f)).collect();
            writeln!(writer, "{}", fields.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of rows per class label.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            if let Some(label) = row.first() {
                *counts.entry(label.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Whether a row has the right width and only finite, non-blank values.
    fn is_complete(&self, row: &[String]) -> bool {
        row.len() == self.header.len()
            && row.first().is_some_and(|label| !label.trim().is_empty())
            && row[1..].iter().all(|field| {
                field
                    .trim()
                    .parse::<f64>()
                    .map(|v| v.is_finite())
                    .unwrap_or(false)
            })
    }

    /// Drop incomplete rows: wrong width, blank label, or any blank, NaN or
    /// infinite value.
    pub fn clean(&self) -> CleanReport {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .filter(|row| self.is_complete(row))
            .cloned()
            .collect();

        let cleaned = Dataset {
            header: self.header.clone(),
            rows,
        };

        CleanReport {
            before: self.class_counts(),
            after: cleaned.class_counts(),
            dropped: self.rows.len() - cleaned.rows.len(),
            dataset: cleaned,
        }
    }

    /// Per-class counts and per-column mean and standard deviation over
    /// complete rows.
    pub fn summarize(&self) -> DatasetSummary {
        let complete: Vec<&Vec<String>> =
            self.rows.iter().filter(|row| self.is_complete(row)).collect();

        let columns = self
            .header
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| {
                let values: Vec<f64> = complete
                    .iter()
                    .filter_map(|row| row[i].trim().parse::<f64>().ok())
                    .collect();
                ColumnSummary {
                    name: name.clone(),
                    mean: if values.is_empty() {
                        None
                    } else {
                        Some(values.iter().mean())
                    },
                    std_dev: if values.len() < 2 {
                        None
                    } else {
                        Some(values.iter().std_dev())
                    },
                    min: values.iter().copied().reduce(f64::min),
                    max: values.iter().copied().reduce(f64::max),
                }
            })
            .collect();

        DatasetSummary {
            rows: self.rows.len(),
            complete_rows: complete.len(),
            class_counts: self.class_counts(),
            columns,
        }
    }
}

/// Result of cleaning a dataset.
#[derive(Debug, Clone)]
pub struct CleanReport {
    pub before: BTreeMap<String, usize>,
    pub after: BTreeMap<String, usize>,
    pub dropped: usize,
    pub dataset: Dataset,
}

/// Statistics for one feature column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub mean: Option<f64>,
    /// Sample standard deviation
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Overview of a dataset file.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub complete_rows: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub columns: Vec<ColumnSummary>,
}
