//! `manifest.json` written next to every generated dataset.

use crate::GenResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub row_count: u64,
    pub k: u64,
    pub na_pct: u8,
    pub seed: u64,
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Join datasets name their tables by role (`x`, `y`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<BTreeMap<String, String>>,
}

/// Column type and role metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

impl ColumnInfo {
    pub fn grouped(name: &str, column_type: &str, cardinality: &str, groups: u64) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            cardinality: Some(cardinality.into()),
            groups: Some(groups),
            range: None,
        }
    }

    pub fn ranged(name: &str, column_type: &str, range: [f64; 2]) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            cardinality: None,
            groups: None,
            range: Some(range),
        }
    }

    pub fn plain(name: &str, column_type: &str) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            cardinality: None,
            groups: None,
            range: None,
        }
    }
}

impl Manifest {
    /// Serialize to `<dir>/manifest.json`.
    pub fn write(&self, dir: &Path) -> GenResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(dir: &Path) -> GenResult<Self> {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }
}
