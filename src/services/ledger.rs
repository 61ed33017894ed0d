//! Per-account CSV ledger of client telemetry.
//!
//! Every poll of the prediction endpoint carries the client's account
//! snapshot in the query string. Rows land in `{dir}/{YYYYMM}/{account}.csv`.

use crate::error::{AppError, Result};
use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const LEDGER_HEADER: [&str; 16] = [
    "date",
    "time",
    "balance",
    "equity",
    "profit",
    "floating_profit",
    "drawdown",
    "today_profit",
    "yesterday_profit",
    "week_profit",
    "month_profit",
    "total_profit",
    "server",
    "symbol",
    "nickname",
    "ip",
];

/// Account snapshot reported by a client. Every field is free text and
/// absent fields are recorded as empty cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountTelemetry {
    pub account: String,
    pub balance: String,
    pub equity: String,
    pub profit: String,
    pub floating_profit: String,
    pub drawdown: String,
    pub today_profit: String,
    pub yesterday_profit: String,
    pub week_profit: String,
    pub month_profit: String,
    pub total_profit: String,
    pub server: String,
    pub symbol: String,
    pub nickname: String,
}

/// Reduce an account identifier to a safe file stem.
pub fn account_stem(account: &str) -> String {
    let stem: String = account
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem.to_string()
    }
}

/// Writes are serialized per file so concurrent first polls for an account
/// produce exactly one header.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    dir: PathBuf,
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Open a ledger file for appending. The flag is true when this call created it.
fn open_for_append(path: &Path) -> std::io::Result<(File, bool)> {
    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Ok((OpenOptions::new().append(true).open(path)?, false))
        }
        Err(e) => Err(e),
    }
}

impl AccountLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, account: &str, at: NaiveDateTime) -> PathBuf {
        self.dir
            .join(at.format("%Y%m").to_string())
            .join(format!("{}.csv", account_stem(account)))
    }

    /// Append one row, writing the header when this call creates the file.
    ///
    /// Blocking; async callers go through [`record`](Self::record).
    pub fn append(&self, ip: &str, at: NaiveDateTime, telemetry: &AccountTelemetry) -> Result<PathBuf> {
        let path = self.path_for(&telemetry.account, at);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = self.locks.entry(path.clone()).or_default().clone();
        let _held = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let (file, is_new) = open_for_append(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(LEDGER_HEADER)?;
        }

        let date = at.format("%Y-%m-%d").to_string();
        let time = at.format("%H:%M:%S").to_string();
        let t = telemetry;
        let row: [&str; 16] = [
            date.as_str(),
            time.as_str(),
            &t.balance,
            &t.equity,
            &t.profit,
            &t.floating_profit,
            &t.drawdown,
            &t.today_profit,
            &t.yesterday_profit,
            &t.week_profit,
            &t.month_profit,
            &t.total_profit,
            &t.server,
            &t.symbol,
            &t.nickname,
            ip,
        ];
        writer.write_record(row)?;
        writer.flush()?;

        debug!("Ledger row for {} appended to {}", t.account, path.display());
        Ok(path)
    }

    /// [`append`](Self::append) on the blocking pool.
    pub async fn record(&self, ip: String, at: NaiveDateTime, telemetry: AccountTelemetry) -> Result<PathBuf> {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || ledger.append(&ip, at, &telemetry))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    }
}
