//! Timestamped JSON files for predictions and ticker analyses.

use crate::error::Result;
use crate::types::PredictionRecord;
use chrono::{Duration, NaiveDateTime, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Aggregate files share the directory but are never served as "latest".
const AGGREGATE_PREFIX: &str = "all_";

/// Round to the nearest hour. Minute 30 and later rounds up.
pub fn rounded_hour(at: NaiveDateTime) -> NaiveDateTime {
    let base = if at.minute() >= 30 { at + Duration::hours(1) } else { at };
    base.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(base)
}

/// Directory of `{prefix}{YYYYMMDD_HHMM}.json` files.
#[derive(Debug, Clone)]
pub struct PredictionStore {
    dir: PathBuf,
}

impl PredictionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(prefix: &str, at: NaiveDateTime) -> String {
        format!("{}{}.json", prefix, rounded_hour(at).format("%Y%m%d_%H%M"))
    }

    /// Persist a record. A missing timestamp is filled from `at`.
    pub fn save(&self, prefix: &str, record: &PredictionRecord, at: NaiveDateTime) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let mut record = record.clone();
        if record.timestamp.is_none() {
            record.timestamp = Some(at.format("%Y-%m-%d %H:%M:%S").to_string());
        }

        let path = self.dir.join(Self::file_name(prefix, at));
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        info!("Saved prediction to {}", path.display());
        Ok(path)
    }

    /// Most recently modified `*.json` file starting with `prefix`.
    ///
    /// Ties on modification time are broken by file name so that the later
    /// timestamp wins. A missing directory yields `None`.
    pub fn latest_path(&self, prefix: &str) -> Result<Option<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store directory {} does not exist", self.dir.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut best: Option<(SystemTime, String, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || name.starts_with(AGGREGATE_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified()?;
            let newer = match &best {
                Some((t, n, _)) => (modified, name.as_str()) > (*t, n.as_str()),
                None => true,
            };
            if newer {
                best = Some((modified, name, entry.path()));
            }
        }

        Ok(best.map(|(_, _, path)| path))
    }

    /// Load the latest file for `prefix` as raw JSON.
    pub fn load_latest(&self, prefix: &str) -> Result<Option<serde_json::Value>> {
        match self.latest_path(prefix)? {
            Some(path) => {
                let text = fs::read_to_string(&path)?;
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => Ok(None),
        }
    }
}

/// Supported ticker languages. Anything else falls back to Korean.
pub fn ticker_lang(lang: &str) -> &'static str {
    match lang.trim().to_lowercase().as_str() {
        "en" => "en",
        "jp" | "ja" => "jp",
        _ => "ko",
    }
}

/// File prefix for a ticker analysis in the given language.
pub fn ticker_prefix(symbol: &str, lang: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    match ticker_lang(lang) {
        "ko" => format!("{}_", symbol),
        other => format!("{}_{}_", other, symbol),
    }
}
