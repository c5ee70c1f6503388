use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::timer::PhaseKind;

/// Every state change the scheduler goes through produces an Event.
/// The CLI renders them; tests collect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PhaseStarted {
        kind: PhaseKind,
        planned_secs: u64,
        at: DateTime<Local>,
    },
    /// Emitted once per poll tick while a phase counts down.
    Countdown {
        kind: PhaseKind,
        remaining_secs: u64,
    },
    PhaseCompleted {
        kind: PhaseKind,
        elapsed_secs: u64,
        at: DateTime<Local>,
    },
    /// The session log rejected a completed phase. The loop carries on.
    RecordFailed {
        kind: PhaseKind,
        message: String,
    },
    ChimePlayed {
        at: DateTime<Local>,
    },
}
