use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::conversion::ConvertOptions;

/// Root-relative layout of the pose data directory.
///
/// Every collaborator receives one of these instead of building paths itself.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub data_dir: PathBuf,
}

impl DataLayout {
    pub const FRAME_DIR: &'static str = "1_FRAME";
    pub const RECORD_DIR: &'static str = "4_INTERP_DATA";
    pub const LABEL_DIR: &'static str = "5_YOLO_TXT";
    pub const DEFAULT_CATALOG: &'static str = "metadata.csv";

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn frame_dir(&self, common_path: &str) -> PathBuf {
        self.data_dir.join(Self::FRAME_DIR).join(common_path)
    }

    pub fn record_dir(&self, common_path: &str) -> PathBuf {
        self.data_dir.join(Self::RECORD_DIR).join(common_path)
    }

    pub fn label_dir(&self, common_path: &str) -> PathBuf {
        self.data_dir.join(Self::LABEL_DIR).join(common_path)
    }

    /// Catalog path, defaulting to `metadata.csv` inside the data directory
    pub fn catalog_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.join(Self::DEFAULT_CATALOG))
    }
}

/// Convert interpolated keypoint JSON records into YOLO pose label files.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ConvertArgs {
    /// Root data directory containing 1_FRAME, 4_INTERP_DATA and 5_YOLO_TXT
    #[arg(short = 'd', long = "data_dir")]
    pub data_dir: PathBuf,

    /// Metadata CSV with common_path, is_train and is_val columns
    #[arg(long = "metadata")]
    pub metadata: Option<PathBuf>,

    /// Fraction of the body height added above the box for the head
    #[arg(long = "head_ratio", default_value_t = 0.20, value_parser = validate_non_negative)]
    pub head_ratio: f64,

    /// Margin in pixels added around the inferred box before clipping
    #[arg(long = "padding", default_value_t = 20.0, value_parser = validate_non_negative)]
    pub padding: f64,

    /// Number of worker threads (0 uses all cores)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,
}

impl ConvertArgs {
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }

    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            head_ratio: self.head_ratio,
            padding: self.padding,
        }
    }
}

/// Sample converted labels into a YOLO pose train/val dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct DatasetArgs {
    /// Root data directory containing 1_FRAME and 5_YOLO_TXT
    #[arg(short = 'd', long = "data_dir")]
    pub data_dir: PathBuf,

    /// Metadata CSV with common_path, is_train and is_val columns
    #[arg(long = "metadata")]
    pub metadata: Option<PathBuf>,

    /// Directory the dataset (images/, labels/, data.yaml) is written to
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// Keep every n-th label file of each sequence
    #[arg(long = "step", default_value_t = 30, value_parser = validate_step)]
    pub step: usize,

    /// How frame images are placed into the dataset
    #[arg(long = "link_mode", value_enum, default_value = "auto")]
    pub link_mode: LinkMode,
}

impl DatasetArgs {
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }
}

// How images are materialized in the dataset directory
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum LinkMode {
    /// Symbolic links only
    Symlink,
    /// Plain copies
    Copy,
    /// Symbolic links, copying when linking is refused
    Auto,
}

/// Fine-tune a pose model on an assembled dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct TrainArgs {
    /// Experiment config YAML
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Trainer executable
    #[arg(long = "trainer", default_value = "yolo")]
    pub trainer: String,

    /// Print the trainer command instead of running it
    #[arg(long = "dry_run")]
    pub dry_run: bool,
}

// Validate that a pixel margin or ratio is not negative
pub fn validate_non_negative(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val >= 0.0 => Ok(val),
        _ => Err("value must be a non-negative number".to_string()),
    }
}

// Validate that the sampling stride is at least one
pub fn validate_step(s: &str) -> Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if val >= 1 => Ok(val),
        _ => Err("STEP must be a positive integer".to_string()),
    }
}
