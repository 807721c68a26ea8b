use dashmap::DashMap;
use indicatif::ProgressBar;
use log::{debug, error, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogEntry;
use crate::config::DataLayout;
use crate::error::ConversionFailure;
use crate::types::{
    AnnotationRecord, ConversionStats, Keypoint, LabelLine, Visibility, FRAME_FORMATS, KPT_END,
    KPT_START, NUM_KEYPOINTS, PERSON_CLASS_ID,
};
use crate::utils::{list_files, read_and_parse_json, read_image_dimensions, write_atomically};

/// Box inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertOptions {
    /// Fraction of the body height added above the top edge for the head
    pub head_ratio: f64,
    /// Margin in pixels added on every side before clipping
    pub padding: f64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            head_ratio: 0.20,
            padding: 20.0,
        }
    }
}

/// Convert the first instance of a record into a YOLO pose label line.
///
/// Keypoints 5..=16 are emitted normalized by the image size whether or not they
/// are valid; a keypoint is valid when both coordinates are strictly positive.
/// The box is the tight box over valid keypoints, raised by `head_ratio` of its
/// height, padded by `padding` pixels and clipped to the image.
pub fn convert_record(
    record: &AnnotationRecord,
    width: u32,
    height: u32,
    options: &ConvertOptions,
) -> Result<LabelLine, ConversionFailure> {
    if width == 0 || height == 0 {
        return Err(ConversionFailure::MalformedInput(format!(
            "image size {}x{} is not positive",
            width, height
        )));
    }

    let raw = match record.instance_info.first() {
        Some(instance) if !instance.keypoints.is_empty() => &instance.keypoints,
        _ => return Err(ConversionFailure::EmptyAnnotation),
    };
    if raw.len() <= KPT_END {
        return Err(ConversionFailure::InsufficientKeypoints { found: raw.len() });
    }

    let (img_w, img_h) = (width as f64, height as f64);
    let mut valid = Vec::with_capacity(NUM_KEYPOINTS);

    let keypoints: [Keypoint; NUM_KEYPOINTS] = std::array::from_fn(|i| {
        let (x, y) = raw[KPT_START + i];
        let visibility = if x > 0.0 && y > 0.0 {
            valid.push((x, y));
            Visibility::Visible
        } else {
            Visibility::Absent
        };
        Keypoint {
            x: x / img_w,
            y: y / img_h,
            visibility,
        }
    });

    if valid.len() < 2 {
        return Err(ConversionFailure::TooFewValidPoints { found: valid.len() });
    }

    let (min_x_body, min_y_body, max_x_body, max_y_body) = valid.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x_min, y_min, x_max, y_max), &(x, y)| {
            (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
        },
    );

    // Face keypoints are excluded, so grow the top edge to cover the head
    let head_extension = (max_y_body - min_y_body) * options.head_ratio;
    let top = min_y_body - head_extension;

    // Pad first, then clip
    let min_x = (min_x_body - options.padding).clamp(0.0, img_w);
    let min_y = (top - options.padding).clamp(0.0, img_h);
    let max_x = (max_x_body + options.padding).clamp(0.0, img_w);
    let max_y = (max_y_body + options.padding).clamp(0.0, img_h);

    let box_w = max_x - min_x;
    let box_h = max_y - min_y;
    let box_cx = min_x + box_w / 2.0;
    let box_cy = min_y + box_h / 2.0;

    Ok(LabelLine {
        class_id: PERSON_CLASS_ID,
        bbox: [box_cx / img_w, box_cy / img_h, box_w / img_w, box_h / img_h],
        keypoints,
    })
}

/// Convert one JSON record file into one label file.
///
/// Nothing is written unless the conversion succeeds; re-running with the same
/// inputs rewrites byte-identical content.
pub fn convert_json_to_yolo(
    json_path: &Path,
    txt_path: &Path,
    width: u32,
    height: u32,
    options: &ConvertOptions,
) -> Result<LabelLine, ConversionFailure> {
    let record = read_and_parse_json(json_path)?;
    let line = convert_record(&record, width, height, options)?;

    write_atomically(txt_path, line.to_string().as_bytes()).map_err(|e| {
        ConversionFailure::OutputWrite(format!("{}: {}", txt_path.display(), e))
    })?;

    Ok(line)
}

/// Convert every record of one catalog entry.
///
/// The first frame image supplies the dimensions for all records of the sequence.
/// Failures are recorded in `failures` keyed by the offending path and never stop
/// sibling files.
pub fn convert_sequence(
    entry: &CatalogEntry,
    layout: &DataLayout,
    options: &ConvertOptions,
    failures: &DashMap<PathBuf, String>,
) -> ConversionStats {
    let mut stats = ConversionStats::new();
    let frame_dir = layout.frame_dir(&entry.common_path);
    let record_dir = layout.record_dir(&entry.common_path);
    let label_dir = layout.label_dir(&entry.common_path);

    let frames = list_files(&frame_dir, FRAME_FORMATS);
    let Some(first_frame) = frames.first() else {
        debug!("No frames in {}, skipping", frame_dir.display());
        stats.items_skipped_no_frames += 1;
        return stats;
    };

    let (width, height) = match read_image_dimensions(first_frame) {
        Ok(dims) => dims,
        Err(e) => {
            warn!("Failed to read image {}: {}", first_frame.display(), e);
            failures.insert(first_frame.clone(), format!("image read error: {}", e));
            stats.item_failures += 1;
            return stats;
        }
    };

    let records = list_files(&record_dir, &["json"]);
    if records.is_empty() {
        debug!("No records in {}, skipping", record_dir.display());
        stats.items_skipped_no_records += 1;
        return stats;
    }

    if let Err(e) = std::fs::create_dir_all(&label_dir) {
        error!("Failed to create {}: {}", label_dir.display(), e);
        failures.insert(label_dir.clone(), format!("directory error: {}", e));
        stats.item_failures += 1;
        return stats;
    }

    let outcomes: Vec<Result<(), ConversionFailure>> = records
        .par_iter()
        .map(|json_path| {
            let mut file_name = json_path.file_stem().unwrap_or_default().to_os_string();
            file_name.push(".txt");
            let txt_path = label_dir.join(file_name);
            convert_json_to_yolo(json_path, &txt_path, width, height, options)
                .map(|_| ())
                .inspect_err(|failure| {
                    failures.insert(
                        json_path.clone(),
                        format!("{}: {}", failure.kind(), failure),
                    );
                })
        })
        .collect();

    stats.items_processed += 1;
    for outcome in &outcomes {
        match outcome {
            Ok(()) => stats.files_converted += 1,
            Err(failure) => stats.increment_failure(failure),
        }
    }
    stats
}

/// Result of a batch conversion run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub stats: ConversionStats,
    /// Failing inputs and the reason, sorted by path
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn print_summary(&self) {
        self.stats.print_summary();
        if self.failures.is_empty() {
            log::info!("All items converted without errors.");
            return;
        }
        warn!("Inputs that failed ({}):", self.failures.len());
        for (path, reason) in &self.failures {
            warn!(" - {}: {}", path.display(), reason);
        }
    }
}

/// Convert every catalog entry in parallel
pub fn convert_catalog(
    entries: &[&CatalogEntry],
    layout: &DataLayout,
    options: &ConvertOptions,
    pb: &ProgressBar,
) -> BatchReport {
    let failures: DashMap<PathBuf, String> = DashMap::new();

    let stats = entries
        .par_iter()
        .map(|entry| {
            let stats = convert_sequence(entry, layout, options, &failures);
            pb.inc(1);
            stats
        })
        .reduce(ConversionStats::new, |mut acc, item| {
            acc.merge(&item);
            acc
        });

    let mut failures: Vec<(PathBuf, String)> = failures.into_iter().collect();
    failures.sort();

    BatchReport { stats, failures }
}
