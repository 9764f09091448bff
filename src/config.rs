//! Configuration for the pose feature extractor.

use crate::core::features::FeatureMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feature mode used when the command line does not name one
    pub feature_mode: FeatureMode,

    /// Class labels accepted in detection records
    pub labels: LabelSet,

    /// What to do with a frame whose features cannot be computed
    pub on_error: ErrorPolicy,

    /// Number of extraction worker threads
    pub workers: usize,

    /// Directory for dataset files
    pub output_path: PathBuf,

    /// Directory for run logs
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pose-feature-extractor");

        Self {
            feature_mode: FeatureMode::Angles,
            labels: LabelSet::exercises(),
            on_error: ErrorPolicy::Abort,
            workers: 1,
            output_path: data_dir.join("datasets"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pose-feature-extractor")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Default dataset file for a feature mode, e.g. `datasets/angles.csv`.
    pub fn dataset_path(&self, mode: FeatureMode) -> PathBuf {
        self.output_path.join(format!("{mode}.csv"))
    }

    /// Where the extraction log is persisted.
    pub fn log_path(&self) -> PathBuf {
        self.data_path.join("extraction_log.json")
    }
}

/// The class labels a dataset may contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Exercise classification labels.
    pub fn exercises() -> Self {
        Self::new(["push-up", "pull-up", "squat"])
    }

    /// Rep stage labels.
    pub fn stages() -> Self {
        Self::new(["start", "end"])
    }

    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated label list. `exercises` and `stages` name the
    /// built-in sets; an empty list accepts any label.
    pub fn from_csv(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "exercises" => return Self::exercises(),
            "stages" => return Self::stages(),
            _ => {}
        }
        Self::new(
            s.split(',')
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
        )
    }

    /// Whether a label is accepted. An empty set accepts everything.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Per-frame failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the frame, count it and continue
    Skip,
    /// Stop the run at the first failing frame
    #[default]
    Abort,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ErrorPolicy::Skip),
            "abort" => Ok(ErrorPolicy::Abort),
            other => Err(format!("unknown error policy '{other}' (expected skip or abort)")),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Skip => write!(f, "skip"),
            ErrorPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
