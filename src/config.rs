//! Persisted filter selection.
//!
//! The filter parameters every view shares (year, month, bed type, UFs,
//! comparison years) live in one serializable value with explicit
//! load/save boundaries, instead of ambient per-view state.

use crate::models::BedsQuery;
use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterState {
    /// Reference year for single-year views.
    pub ano: i32,
    /// Reference month (1-12); `None` means whole-year granularity.
    pub mes: Option<u32>,
    /// Bed type filter (e.g. "UTI_ADULTO"); `None`/empty means all types.
    pub tipo_leito: Option<String>,
    /// UF siglas to restrict listings to; empty means national.
    pub ufs: Vec<String>,
    /// Years selected for the comparative analysis view.
    pub anos_comparacao: Vec<i32>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            ano: chrono::Utc::now().year(),
            mes: None,
            tipo_leito: None,
            ufs: Vec::new(),
            anos_comparacao: Vec::new(),
        }
    }
}

impl FilterState {
    /// Conventional location under the user config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cnes-rs").join("filters.json"))
    }

    /// Load saved state. A missing file yields the default state; a file
    /// that exists but does not parse is an error, not a silent reset.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", path.display()));
            }
        };
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
    }

    /// The bed-endpoint query this filter selection describes.
    pub fn to_beds_query(&self) -> BedsQuery {
        BedsQuery {
            ano: self.ano,
            mes: self.mes,
            tipo: self
                .tipo_leito
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            ufs: self.ufs.clone(),
        }
    }
}
