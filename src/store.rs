//! Persistent stores: prediction slot and append-only record logs
//!
//! The verification log is the engine's memory. Every resolved prediction is
//! one immutable JSONL line; an in-memory index keyed by draw id makes
//! duplicate-resolution checks exact instead of text scans. The log is read
//! once at startup and appended to afterwards.

use crate::error::{BotError, Result};
use crate::types::{DetectorKind, DrawId, Outcome, PredictionRecord, TimeSegment};
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// One resolved prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub draw_id: DrawId,
    pub predicted: Outcome,
    pub actual: Outcome,
    pub correct: bool,
    pub kind: DetectorKind,
    pub combined_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn segment(&self) -> TimeSegment {
        TimeSegment::from_hour(self.timestamp.hour())
    }
}

/// Append-only verification log with an exact keyed index
pub struct VerificationLog {
    path: PathBuf,
    records: Vec<VerificationRecord>,
    index: HashMap<String, usize>,
}

impl VerificationLog {
    /// Open the log, replaying any existing records into memory.
    /// Unparsable lines are skipped with a warning rather than failing the
    /// startup.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut log = Self {
            path: path.clone(),
            records: Vec::new(),
            index: HashMap::new(),
        };

        if path.exists() {
            let raw = tokio::fs::read_to_string(&path).await?;
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<VerificationRecord>(line) {
                    Ok(record) => log.insert(record),
                    Err(e) => {
                        tracing::warn!("skipping unreadable verification record: {}", e);
                    }
                }
            }
            tracing::info!("loaded {} verification records", log.records.len());
        }

        Ok(log)
    }

    fn insert(&mut self, record: VerificationRecord) {
        let key = record.draw_id.to_string();
        if self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
    }

    pub fn contains(&self, id: &DrawId) -> bool {
        self.index.contains_key(&id.to_string())
    }

    pub fn verdict(&self, id: &DrawId) -> Option<&VerificationRecord> {
        self.index
            .get(&id.to_string())
            .map(|&pos| &self.records[pos])
    }

    /// Append a record. A record for an already-logged draw id is a no-op,
    /// keeping resolution idempotent at the storage layer too.
    pub async fn append(&mut self, record: VerificationRecord) -> Result<()> {
        if self.contains(&record.draw_id) {
            tracing::debug!("verification for {} already logged", record.draw_id);
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(&record)?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;

        self.insert(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in chronological order
    pub fn records(&self) -> &[VerificationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&VerificationRecord> {
        self.records.last()
    }

    pub fn last_draw_id(&self) -> Option<&DrawId> {
        self.records.last().map(|r| &r.draw_id)
    }

    /// Losses since the most recent correct prediction
    pub fn consecutive_losses(&self) -> u32 {
        self.records
            .iter()
            .rev()
            .take_while(|r| !r.correct)
            .count() as u32
    }

    /// Detector behind the most recent loss, `None` when the newest record
    /// is a win
    pub fn last_failed_kind(&self) -> Option<DetectorKind> {
        match self.records.last() {
            Some(record) if !record.correct => Some(record.kind),
            _ => None,
        }
    }

    /// Direction of the most recent logged prediction
    pub fn last_direction(&self) -> Option<Outcome> {
        self.records.last().map(|r| r.predicted)
    }

    /// Accuracy over the newest `window` records; 0.5 with no data
    pub fn recent_accuracy(&self, window: usize) -> f64 {
        let recent: Vec<&VerificationRecord> =
            self.records.iter().rev().take(window).collect();
        if recent.is_empty() {
            return 0.5;
        }
        let correct = recent.iter().filter(|r| r.correct).count();
        correct as f64 / recent.len() as f64
    }

    /// Number of records considered by `recent_accuracy`
    pub fn recent_samples(&self, window: usize) -> usize {
        self.records.len().min(window)
    }
}

/// JSON slot holding the single outstanding prediction
pub struct PredictionSlot {
    path: PathBuf,
}

impl PredictionSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Option<PredictionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() || raw.trim() == "{}" {
            return Ok(None);
        }
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("prediction slot unreadable, treating as empty: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn store(&self, record: &PredictionRecord) -> Result<()> {
        write_json(&self.path, record).await
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            tokio::fs::write(&self.path, b"{}")
                .await
                .map_err(BotError::from)?;
        }
        Ok(())
    }
}

/// One direction override applied by the arbiter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalRecord {
    pub draw_id: DrawId,
    pub kind: DetectorKind,
    pub original: Outcome,
    pub adjusted: Outcome,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of direction overrides
pub struct ReversalLog {
    path: PathBuf,
}

impl ReversalLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, record: &ReversalRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(record)?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }

    pub async fn read_all(&self) -> Result<Vec<ReversalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}

pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let raw = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, raw).await.map_err(BotError::from)
}
