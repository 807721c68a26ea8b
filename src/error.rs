//! Error types.
//!
//! [`ConversionFailure`] is the per-record outcome of the keypoint converter and is
//! always recoverable. [`PipelineError`] aborts a whole command (bad catalog, bad
//! config, trainer exit status).

use std::path::PathBuf;
use thiserror::Error;

/// Why a single annotation record produced no label line
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionFailure {
    #[error("annotation has no instance or no keypoints")]
    EmptyAnnotation,
    #[error("annotation has {found} keypoints, index 16 is required")]
    InsufficientKeypoints { found: usize },
    #[error("only {found} valid keypoints, at least 2 are required for a bounding box")]
    TooFewValidPoints { found: usize },
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("failed to write label file: {0}")]
    OutputWrite(String),
}

impl ConversionFailure {
    /// Short stable name used in summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyAnnotation => "EmptyAnnotation",
            Self::InsufficientKeypoints { .. } => "InsufficientKeypoints",
            Self::TooFewValidPoints { .. } => "TooFewValidPoints",
            Self::MalformedInput(_) => "MalformedInput",
            Self::OutputWrite(_) => "OutputWrite",
        }
    }
}

/// Errors that stop a command
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read catalog {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("catalog {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("trainer failed: {0}")]
    Trainer(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let err = ConversionFailure::InsufficientKeypoints { found: 5 };
        assert_eq!(
            err.to_string(),
            "annotation has 5 keypoints, index 16 is required"
        );
        assert_eq!(err.kind(), "InsufficientKeypoints");

        let err = ConversionFailure::MalformedInput("bad json".to_string());
        assert_eq!(err.to_string(), "malformed input: bad json");
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::MissingColumn {
            path: PathBuf::from("metadata.csv"),
            column: "common_path".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "catalog metadata.csv has no 'common_path' column"
        );
    }
}
