//! JSON session log and statistics.
//!
//! The log is a single document, newest entry first:
//!
//! ```json
//! { "sessions": [ { "kind": "work", "duration": 1500, "timestamp": 1760000000, "date": "2026-10-16" } ] }
//! ```
//!
//! Every write rewrites the whole document into a temp file next to the log
//! and renames it over the old one, so a crash mid-write leaves the previous
//! version intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecorderError;
use crate::recorder::SessionRecorder;
use crate::timer::PhaseKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub kind: PhaseKind,
    /// Actual elapsed seconds.
    pub duration: u64,
    /// Unix seconds at completion.
    pub timestamp: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    sessions: Vec<SessionEntry>,
}

/// File-backed session log.
#[derive(Debug, Clone)]
pub struct AnalyticsLog {
    path: PathBuf,
}

impl AnalyticsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded sessions, newest first. A missing file is an empty log.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn entries(&self) -> Result<Vec<SessionEntry>, RecorderError> {
        Ok(self.load()?.sessions)
    }

    /// Prepend an entry, keeping every earlier one.
    ///
    /// # Errors
    /// Returns an error if the existing log is unreadable or the new
    /// document cannot be written.
    pub fn append(&self, entry: SessionEntry) -> Result<(), RecorderError> {
        let mut doc = self.load()?;
        doc.sessions.insert(0, entry);
        self.store(&doc)
    }

    fn load(&self) -> Result<SessionDocument, RecorderError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionDocument::default())
            }
            Err(source) => {
                return Err(RecorderError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(SessionDocument::default());
        }
        serde_json::from_str(&content).map_err(|source| RecorderError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, doc: &SessionDocument) -> Result<(), RecorderError> {
        let write_err = |source: std::io::Error| RecorderError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let json = serde_json::to_vec_pretty(doc).map_err(|e| write_err(e.into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl SessionRecorder for AnalyticsLog {
    fn record(
        &self,
        kind: PhaseKind,
        elapsed_secs: u64,
        date: NaiveDate,
    ) -> Result<(), RecorderError> {
        self.append(SessionEntry {
            kind,
            duration: elapsed_secs,
            timestamp: Utc::now().timestamp(),
            date,
        })?;
        tracing::debug!(%kind, elapsed_secs, path = %self.path.display(), "session recorded");
        Ok(())
    }
}

/// Sums for one reporting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub work_secs: u64,
    pub break_secs: u64,
    pub work_sessions: u64,
    pub break_sessions: u64,
}

impl PeriodTotals {
    fn add(&mut self, entry: &SessionEntry) {
        match entry.kind {
            PhaseKind::Work => {
                self.work_secs += entry.duration;
                self.work_sessions += 1;
            }
            PhaseKind::Break => {
                self.break_secs += entry.duration;
                self.break_sessions += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub today: PeriodTotals,
    pub this_week: PeriodTotals,
    pub total: PeriodTotals,
}

impl AnalyticsSummary {
    /// Aggregate entries relative to `today`. The week starts on Monday.
    pub fn compute(entries: &[SessionEntry], today: NaiveDate) -> Self {
        let week_start =
            today - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        let mut summary = Self::default();
        for entry in entries {
            summary.total.add(entry);
            if entry.date >= week_start && entry.date <= today {
                summary.this_week.add(entry);
            }
            if entry.date == today {
                summary.today.add(entry);
            }
        }
        summary
    }
}
