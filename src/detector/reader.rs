//! Reader for detection records written by an external pose detector.
//!
//! Records are stored as JSON Lines (one record per line). A `.json` file
//! holding a single array of records is also accepted.

use crate::detector::types::DetectionRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Errors that can occur while reading detection records.
#[derive(Debug)]
pub enum DetectorError {
    Io(std::io::Error),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::Io(e) => write!(f, "IO error: {e}"),
            DetectorError::Parse { line, message } => {
                write!(f, "Parse error at line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for DetectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectorError::Io(e) => Some(e),
            DetectorError::Parse { .. } => None,
        }
    }
}

impl From<std::io::Error> for DetectorError {
    fn from(e: std::io::Error) -> Self {
        DetectorError::Io(e)
    }
}

/// Streams detection records from a JSON Lines source.
pub struct DetectionReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl DetectionReader<BufReader<File>> {
    /// Open a JSON Lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for DetectionReader<R> {
    type Item = Result<DetectionRecord, DetectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&line).map_err(|e| DetectorError::Parse {
                line: self.line_number,
                message: e.to_string(),
            }));
        }
    }
}

/// Read every record from a file.
///
/// Files with a `.json` extension are parsed as one array; anything else is
/// read as JSON Lines.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<DetectionRecord>, DetectorError> {
    let path = path.as_ref();
    if path.extension().map(|e| e == "json").unwrap_or(false) {
        let content = std::fs::read_to_string(path)?;
        return serde_json::from_str(&content).map_err(|e| DetectorError::Parse {
            line: e.line(),
            message: e.to_string(),
        });
    }

    DetectionReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_lines_and_skips_blanks() {
        let input = concat!(
            r#"{"label":"squat","landmarks":[{"x":0.1,"y":0.2,"z":0.0}]}"#,
            "\n\n",
            r#"{"label":"push-up","landmarks":[]}"#,
            "\n",
        );
        let records: Vec<_> = DetectionReader::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].has_pose());
        assert!(!records[1].has_pose());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"label\":\"squat\"}\n\n{not json}\n";
        let results: Vec<_> = DetectionReader::new(Cursor::new(input)).collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(DetectorError::Parse { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_read_json_array_file() {
        let dir = std::env::temp_dir().join(format!("pose-features-reader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frames.json");
        std::fs::write(&path, r#"[{"label":"start"},{"label":"end","source":"clip/1.jpg"}]"#)
            .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source.as_deref(), Some("clip/1.jpg"));
    }
}
