//! Metadata catalog: one CSV row per recorded sequence.

use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::types::Split;

/// One catalog row
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub common_path: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_train: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_val: bool,
}

impl CatalogEntry {
    /// Train wins when both flags are set
    pub fn split(&self) -> Option<Split> {
        if self.is_train {
            Some(Split::Train)
        } else if self.is_val {
            Some(Split::Val)
        } else {
            None
        }
    }
}

// Accepts the spellings spreadsheet and dataframe exports use for booleans
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v == "1.0" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v == "0.0" => Ok(false),
        Some(v) => Err(serde::de::Error::custom(format!(
            "invalid boolean flag '{}'",
            v
        ))),
    }
}

/// The loaded metadata table
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub const KEY_COLUMN: &'static str = "common_path";

    pub fn from_path(path: &Path) -> Result<Self> {
        let csv_err = |source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .map_err(csv_err)?;

        let has_key = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .any(|h| h == Self::KEY_COLUMN);
        if !has_key {
            return Err(PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column: Self::KEY_COLUMN.to_string(),
            });
        }

        let entries = reader
            .deserialize()
            .collect::<std::result::Result<Vec<CatalogEntry>, _>>()
            .map_err(csv_err)?;

        Ok(Self { entries })
    }

    /// Entries assigned to train or val, with their split
    pub fn targets(&self) -> impl Iterator<Item = (&CatalogEntry, Split)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.split().map(|split| (entry, split)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
