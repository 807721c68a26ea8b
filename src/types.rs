use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Frame image formats searched in a sequence directory, in priority order
pub const FRAME_FORMATS: &[&str] = &["jpg", "png"];

// First and last (inclusive) keypoint index used for labels; 0..=4 are the face
pub const KPT_START: usize = 5;
pub const KPT_END: usize = 16;

/// Number of keypoints written per label line
pub const NUM_KEYPOINTS: usize = KPT_END - KPT_START + 1;

/// Values per keypoint in a label line: x, y, visibility
pub const KPT_DIMS: usize = 3;

/// The only class written by the converter
pub const PERSON_CLASS_ID: usize = 0;
pub const PERSON_CLASS_NAME: &str = "person";

/// Horizontal-flip permutation of the 12 emitted keypoints.
///
/// COCO keypoints 5..=16 come in left/right pairs (shoulders, elbows, wrists,
/// hips, knees, ankles), so flipping swaps each even slot with its neighbour.
pub fn flip_index() -> Vec<usize> {
    (0..NUM_KEYPOINTS).map(|i| i ^ 1).collect()
}

// One detected subject inside an annotation record. Other per-instance fields
// (scores, boxes, track ids) are not read.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Instance {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keypoints: Vec<(f64, f64)>,
}

// The annotation record produced by the interpolation stage, one per frame.
// Only the first instance is decoded; later ones are skipped unparsed so a
// malformed sibling cannot fail the record.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnnotationRecord {
    #[serde(default, deserialize_with = "first_instance")]
    pub instance_info: Vec<Instance>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn first_instance<'de, D>(deserializer: D) -> Result<Vec<Instance>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FirstInstanceVisitor;

    impl<'de> Visitor<'de> for FirstInstanceVisitor {
        type Value = Vec<Instance>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of instances or null")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let first = seq.next_element::<Instance>()?;
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(first.into_iter().collect())
        }
    }

    deserializer.deserialize_any(FirstInstanceVisitor)
}

/// Visibility flag as written to a label line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Absent = 0,
    Visible = 2,
}

impl Visibility {
    pub fn as_f64(self) -> f64 {
        self as u8 as f64
    }
}

/// One keypoint of a label line, normalized by the image size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub visibility: Visibility,
}

/// A single YOLO pose detection row
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    /// Normalized center-x, center-y, width, height
    pub bbox: [f64; 4],
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_id)?;
        for v in &self.bbox {
            write!(f, " {:.6}", v)?;
        }
        for kp in &self.keypoints {
            write!(f, " {:.6} {:.6} {:.6}", kp.x, kp.y, kp.visibility.as_f64())?;
        }
        writeln!(f)
    }
}

/// Split a catalog entry is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `data.yaml` document consumed by the trainer.
///
/// Field order matches the order keys are written in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DatasetManifest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_step: Option<usize>,
    pub train: String,
    pub val: String,
    pub names: BTreeMap<usize, String>,
    pub kpt_shape: [usize; 2],
    pub flip_idx: Vec<usize>,
}

impl DatasetManifest {
    pub fn new(path: String, sampling_step: usize) -> Self {
        Self {
            path,
            sampling_step: Some(sampling_step),
            train: format!("images/{}", Split::Train),
            val: format!("images/{}", Split::Val),
            names: BTreeMap::from([(PERSON_CLASS_ID, PERSON_CLASS_NAME.to_string())]),
            kpt_shape: [NUM_KEYPOINTS, KPT_DIMS],
            flip_idx: flip_index(),
        }
    }
}

// Struct to hold conversion statistics across catalog items
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub items_processed: usize,
    pub items_skipped_no_frames: usize,
    pub items_skipped_no_records: usize,
    pub item_failures: usize,
    pub files_converted: usize,
    pub empty_annotation: usize,
    pub insufficient_keypoints: usize,
    pub too_few_valid_points: usize,
    pub malformed_input: usize,
    pub output_write: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_failed(&self) -> usize {
        self.empty_annotation
            + self.insufficient_keypoints
            + self.too_few_valid_points
            + self.malformed_input
            + self.output_write
    }

    pub fn increment_failure(&mut self, failure: &crate::error::ConversionFailure) {
        use crate::error::ConversionFailure::*;
        match failure {
            EmptyAnnotation => self.empty_annotation += 1,
            InsufficientKeypoints { .. } => self.insufficient_keypoints += 1,
            TooFewValidPoints { .. } => self.too_few_valid_points += 1,
            MalformedInput(_) => self.malformed_input += 1,
            OutputWrite(_) => self.output_write += 1,
        }
    }

    /// Fold the counts of one item into the running totals
    pub fn merge(&mut self, other: &ConversionStats) {
        self.items_processed += other.items_processed;
        self.items_skipped_no_frames += other.items_skipped_no_frames;
        self.items_skipped_no_records += other.items_skipped_no_records;
        self.item_failures += other.item_failures;
        self.files_converted += other.files_converted;
        self.empty_annotation += other.empty_annotation;
        self.insufficient_keypoints += other.insufficient_keypoints;
        self.too_few_valid_points += other.too_few_valid_points;
        self.malformed_input += other.malformed_input;
        self.output_write += other.output_write;
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Items processed: {}", self.items_processed);
        log::info!("Label files written: {}", self.files_converted);
        log::info!(
            "Items skipped (no frames: {}, no records: {})",
            self.items_skipped_no_frames,
            self.items_skipped_no_records
        );
        if self.item_failures > 0 {
            log::warn!("Items failed: {}", self.item_failures);
        }

        let failed = self.files_failed();
        if failed > 0 {
            log::warn!(
                "Failed conversions: {} (empty annotation: {}, insufficient keypoints: {}, too few valid points: {}, malformed input: {}, write errors: {})",
                failed,
                self.empty_annotation,
                self.insufficient_keypoints,
                self.too_few_valid_points,
                self.malformed_input,
                self.output_write
            );
        }
    }
}

// Counters reported by the dataset assembler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssemblyStats {
    pub train: usize,
    pub val: usize,
    pub skipped: usize,
    pub linked: usize,
    pub missing_image: usize,
    pub errors: usize,
}

impl AssemblyStats {
    pub fn increment_split(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Val => self.val += 1,
        }
    }

    pub fn merge(&mut self, other: &AssemblyStats) {
        self.train += other.train;
        self.val += other.val;
        self.skipped += other.skipped;
        self.linked += other.linked;
        self.missing_image += other.missing_image;
        self.errors += other.errors;
    }

    pub fn print_summary(&self, step: usize) {
        log::info!("=== Assembly Summary ===");
        log::info!("Sampling step: {}", step);
        log::info!("Train images: {}", self.train);
        log::info!("Val images: {}", self.val);
        log::info!("Already present: {}", self.skipped);
        log::info!("Images materialized: {}", self.linked);
        if self.missing_image > 0 {
            log::warn!("Labels without a matching frame: {}", self.missing_image);
        }
        if self.errors > 0 {
            log::warn!("File errors: {}", self.errors);
        }
    }
}
