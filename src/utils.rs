use glob::{glob, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{ConversionFailure, PipelineError};
use crate::types::AnnotationRecord;

/// Read and parse a single annotation record.
///
/// The file is parsed straight from a buffered stream. Open and parse faults both
/// come back as [`ConversionFailure::MalformedInput`] carrying the cause.
pub fn read_and_parse_json(path: &Path) -> Result<AnnotationRecord, ConversionFailure> {
    let file = fs::File::open(path).map_err(|e| {
        ConversionFailure::MalformedInput(format!("failed to open {}: {}", path.display(), e))
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ConversionFailure::MalformedInput(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Write `contents` to `path` through a temporary sibling file.
///
/// Readers never observe a partially written file, and a failed write leaves
/// nothing behind.
pub fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// List the files directly inside `dir` with one of the given extensions, sorted by path
pub fn list_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let mut files: Vec<PathBuf> = extensions
        .iter()
        .flat_map(|ext| match glob(&format!("{}/*.{}", escaped, ext)) {
            Ok(paths) => paths.filter_map(|entry| entry.ok()).collect::<Vec<_>>(),
            Err(e) => {
                log::error!("Invalid glob pattern for {}: {}", dir.display(), e);
                Vec::new()
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Read an image's pixel dimensions from its header only
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32), String> {
    let size = imagesize::size(path).map_err(|e| e.to_string())?;
    let width = u32::try_from(size.width).map_err(|_| format!("width {} too large", size.width))?;
    let height =
        u32::try_from(size.height).map_err(|_| format!("height {} too large", size.height))?;
    if width == 0 || height == 0 {
        return Err(format!("degenerate image size {}x{}", width, height));
    }
    Ok((width, height))
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory (and parents) if missing, keeping existing content
pub fn ensure_directory(path: &Path) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(path.to_path_buf())
}
