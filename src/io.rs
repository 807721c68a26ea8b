use log::info;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::types::{DatasetManifest, Split};
use crate::utils::{ensure_directory, write_atomically};

pub const MANIFEST_FILE: &str = "data.yaml";

/// Paths of the split directories of an assembled dataset
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train_images_dir,
            Split::Val => &self.val_images_dir,
        }
    }

    pub fn labels_dir(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train_labels_dir,
            Split::Val => &self.val_labels_dir,
        }
    }
}

/// Set up `images/{train,val}` and `labels/{train,val}`, keeping what already exists
pub fn setup_output_directories(dataset_dir: &Path) -> Result<OutputDirs> {
    let images_dir = dataset_dir.join("images");
    let labels_dir = dataset_dir.join("labels");

    Ok(OutputDirs {
        root: ensure_directory(dataset_dir)?,
        train_labels_dir: ensure_directory(&labels_dir.join(Split::Train.as_str()))?,
        val_labels_dir: ensure_directory(&labels_dir.join(Split::Val.as_str()))?,
        train_images_dir: ensure_directory(&images_dir.join(Split::Train.as_str()))?,
        val_images_dir: ensure_directory(&images_dir.join(Split::Val.as_str()))?,
    })
}

/// Write `data.yaml` for the dataset rooted at `dataset_dir`
pub fn create_dataset_yaml(dataset_dir: &Path, step: usize) -> Result<PathBuf> {
    let absolute_path =
        fs::canonicalize(dataset_dir).map_err(|e| PipelineError::io(dataset_dir, e))?;
    let manifest = DatasetManifest::new(absolute_path.to_string_lossy().into_owned(), step);

    let yaml_path = dataset_dir.join(MANIFEST_FILE);
    write_manifest(&yaml_path, &manifest)?;
    Ok(yaml_path)
}

pub fn read_manifest(path: &Path) -> Result<DatasetManifest> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_yaml::from_str(&content).map_err(|source| PipelineError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_manifest(path: &Path, manifest: &DatasetManifest) -> Result<()> {
    let content = serde_yaml::to_string(manifest).map_err(|source| PipelineError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomically(path, content.as_bytes()).map_err(|e| PipelineError::io(path, e))
}

/// What the trainer driver needs from a refreshed manifest
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedManifest {
    pub path: String,
    pub sampling_step: Option<usize>,
}

/// Point the manifest's `path` at the directory it currently lives in.
///
/// The trainer resolves `train`/`val` relative to `path`. The file is handled as
/// a plain mapping so keys this crate does not model (a `test` split, extra
/// metadata) survive the rewrite, and only `path` is required.
pub fn refresh_manifest_path(manifest_path: &Path) -> Result<RefreshedManifest> {
    let yaml_error = |source| PipelineError::Yaml {
        path: manifest_path.to_path_buf(),
        source,
    };

    let content =
        fs::read_to_string(manifest_path).map_err(|e| PipelineError::io(manifest_path, e))?;
    let mut mapping: Mapping = serde_yaml::from_str(&content).map_err(yaml_error)?;

    let parent = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let current_dir = fs::canonicalize(parent).map_err(|e| PipelineError::io(parent, e))?;
    let current = current_dir.to_string_lossy().into_owned();

    let previous = match mapping.get("path") {
        Some(Value::String(path)) => path.clone(),
        Some(_) => {
            return Err(PipelineError::Config(format!(
                "{}: `path` is not a string",
                manifest_path.display()
            )))
        }
        None => {
            return Err(PipelineError::Config(format!(
                "{}: missing `path`",
                manifest_path.display()
            )))
        }
    };

    if previous != current {
        info!("Updating dataset path: {} -> {}", previous, current);
        // Replacing an existing key keeps its position in the mapping
        mapping.insert(Value::from("path"), Value::from(current.as_str()));
        let updated = serde_yaml::to_string(&mapping).map_err(yaml_error)?;
        write_atomically(manifest_path, updated.as_bytes())
            .map_err(|e| PipelineError::io(manifest_path, e))?;
    }

    let sampling_step = mapping
        .get("sampling_step")
        .and_then(Value::as_u64)
        .and_then(|step| usize::try_from(step).ok());

    Ok(RefreshedManifest {
        path: current,
        sampling_step,
    })
}
