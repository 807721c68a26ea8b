//! Pose keypoint to YOLO dataset converter
//!
//! This library converts per-frame keypoint annotation records into YOLO pose
//! label files, assembles sampled train/val datasets from them and prepares
//! fine-tuning runs of an external pose trainer.

pub mod catalog;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod link;
pub mod train;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use catalog::{Catalog, CatalogEntry};
pub use config::{ConvertArgs, DataLayout, DatasetArgs, LinkMode, TrainArgs};
pub use conversion::{convert_catalog, convert_json_to_yolo, convert_record, ConvertOptions};
pub use dataset::assemble_dataset;
pub use error::{ConversionFailure, PipelineError};
pub use io::{create_dataset_yaml, refresh_manifest_path, setup_output_directories};
pub use link::LinkStrategy;
pub use train::{prepare_training, ExperimentConfig, ModelSource};
pub use types::{AnnotationRecord, DatasetManifest, Instance, LabelLine, Split};
