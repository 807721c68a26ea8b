use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::DataLayout;
use crate::error::Result;
use crate::io::{create_dataset_yaml, setup_output_directories, OutputDirs};
use crate::link::LinkStrategy;
use crate::types::{AssemblyStats, Split, FRAME_FORMATS};
use crate::utils::list_files;

/// Take every `step`-th element starting with the first
pub fn sample_every<T: Clone>(items: &[T], step: usize) -> Vec<T> {
    items.iter().step_by(step.max(1)).cloned().collect()
}

/// Dataset-wide file name for a frame of a sequence.
///
/// Path separators of the common path are flattened so every sequence lands in
/// the same flat split directory without collisions.
pub fn unique_name(common_path: &str, file_stem: &str) -> String {
    let flattened = common_path.replace(['/', '\\'], "_");
    sanitize_filename::sanitize(format!("{}_{}", flattened, file_stem))
}

/// Frame image matching a label stem, preferring jpg over png
pub fn find_frame(frame_dir: &Path, file_stem: &str) -> Option<PathBuf> {
    FRAME_FORMATS
        .iter()
        .map(|ext| frame_dir.join(format!("{}.{}", file_stem, ext)))
        .find(|candidate| candidate.is_file())
}

fn is_dangling_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) && !path.exists()
}

/// Place one sampled label and its frame into the split directories
fn link_sample(
    label_file: &Path,
    frame_dir: &Path,
    entry: &CatalogEntry,
    split: Split,
    output_dirs: &OutputDirs,
    strategy: &dyn LinkStrategy,
    stats: &mut AssemblyStats,
) {
    let Some(file_stem) = label_file.file_stem().and_then(|s| s.to_str()) else {
        warn!("Skipping label with a non UTF-8 name: {}", label_file.display());
        stats.errors += 1;
        return;
    };

    let Some(image_file) = find_frame(frame_dir, file_stem) else {
        stats.missing_image += 1;
        return;
    };

    let name = unique_name(&entry.common_path, file_stem);
    let image_ext = image_file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let dst_image = output_dirs
        .images_dir(split)
        .join(format!("{}.{}", name, image_ext));
    let dst_label = output_dirs.labels_dir(split).join(format!("{}.txt", name));

    if is_dangling_symlink(&dst_image) {
        if let Err(e) = fs::remove_file(&dst_image) {
            error!("Failed to remove broken link {}: {}", dst_image.display(), e);
            stats.errors += 1;
            return;
        }
    }

    if dst_image.exists() && dst_label.exists() {
        stats.skipped += 1;
        return;
    }

    let result = (|| -> std::io::Result<()> {
        if !dst_image.exists() {
            strategy.materialize(&image_file, &dst_image)?;
            stats.linked += 1;
        }
        if !dst_label.exists() {
            fs::copy(label_file, &dst_label)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => stats.increment_split(split),
        Err(e) => {
            error!("Failed to place {}: {}", dst_image.display(), e);
            stats.errors += 1;
        }
    }
}

/// Sample one catalog entry's labels into its split
pub fn assemble_entry(
    entry: &CatalogEntry,
    split: Split,
    layout: &DataLayout,
    output_dirs: &OutputDirs,
    step: usize,
    strategy: &dyn LinkStrategy,
) -> AssemblyStats {
    let mut stats = AssemblyStats::default();
    let label_dir = layout.label_dir(&entry.common_path);
    let frame_dir = layout.frame_dir(&entry.common_path);

    if !label_dir.is_dir() || !frame_dir.is_dir() {
        return stats;
    }

    let label_files = list_files(&label_dir, &["txt"]);
    for label_file in sample_every(&label_files, step) {
        link_sample(
            &label_file,
            &frame_dir,
            entry,
            split,
            output_dirs,
            strategy,
            &mut stats,
        );
    }
    stats
}

/// Build the sampled train/val dataset and its manifest.
///
/// Assembly is incremental: samples whose image and label are already present
/// are counted as skipped and left untouched.
pub fn assemble_dataset(
    catalog: &Catalog,
    layout: &DataLayout,
    dataset_dir: &Path,
    step: usize,
    strategy: &dyn LinkStrategy,
    pb: &ProgressBar,
) -> Result<(AssemblyStats, PathBuf)> {
    info!(
        "Assembling dataset in {} (step: {}, mode: {})",
        dataset_dir.display(),
        step,
        strategy.name()
    );
    let output_dirs = setup_output_directories(dataset_dir)?;

    let targets: Vec<(&CatalogEntry, Split)> = catalog.targets().collect();
    let stats = targets
        .par_iter()
        .map(|(entry, split)| {
            let stats = assemble_entry(entry, *split, layout, &output_dirs, step, strategy);
            pb.inc(1);
            stats
        })
        .reduce(AssemblyStats::default, |mut acc, item| {
            acc.merge(&item);
            acc
        });

    let yaml_path = create_dataset_yaml(dataset_dir, step)?;
    Ok((stats, yaml_path))
}
