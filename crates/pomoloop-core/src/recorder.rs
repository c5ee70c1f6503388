//! Session recorder contract.
//!
//! The scheduler hands each completed phase to a [`SessionRecorder`] and
//! never looks at how it is stored. A failed write is the recorder's
//! problem to report; it must not stop the timer.

use chrono::NaiveDate;

use crate::error::RecorderError;
use crate::timer::PhaseKind;

pub trait SessionRecorder: Send + Sync {
    /// Persist one completed phase.
    fn record(
        &self,
        kind: PhaseKind,
        elapsed_secs: u64,
        date: NaiveDate,
    ) -> Result<(), RecorderError>;
}

impl<R: SessionRecorder + ?Sized> SessionRecorder for std::sync::Arc<R> {
    fn record(
        &self,
        kind: PhaseKind,
        elapsed_secs: u64,
        date: NaiveDate,
    ) -> Result<(), RecorderError> {
        (**self).record(kind, elapsed_secs, date)
    }
}
