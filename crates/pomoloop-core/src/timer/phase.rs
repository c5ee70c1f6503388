use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Work,
    Break,
}

impl PhaseKind {
    /// The phase that follows this one. Work and break alternate forever.
    pub fn next(self) -> Self {
        match self {
            PhaseKind::Work => PhaseKind::Break,
            PhaseKind::Break => PhaseKind::Work,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Work => "work",
            PhaseKind::Break => "break",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed interval.
///
/// `elapsed` stays zero until [`Phase::finish`] is called on countdown
/// completion; an interrupted phase is never finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub planned: Duration,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl Phase {
    pub fn begin(kind: PhaseKind, planned: Duration) -> Self {
        Self {
            kind,
            planned,
            started_at: Local::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Elapsed time rounded to whole seconds, as stored in the session log.
    pub fn elapsed_secs(&self) -> u64 {
        let secs = self.elapsed.as_secs();
        if self.elapsed.subsec_millis() >= 500 {
            secs + 1
        } else {
            secs
        }
    }
}
