//! Phase scheduler.
//!
//! A two-state machine with no terminal state:
//!
//! ```text
//! Work -> (chime) -> Break -> (chime) -> Work -> ...
//! ```
//!
//! Each phase starts playback for its track directory, counts down on a
//! fixed poll interval, stops playback, hands the completed phase to the
//! recorder and plays the transition chime. Interruption is handled outside
//! the scheduler by the exit coordinator; an interrupted phase is never
//! recorded.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::task::block_in_place;
use tokio::time::Instant;

use super::{Phase, PhaseKind, SessionSettings};
use crate::events::Event;
use crate::recorder::SessionRecorder;

/// What the scheduler needs from the audio side.
///
/// Every method may block (process teardown, a chime playing to the end).
/// The scheduler calls them through [`block_in_place`], so it must run on a
/// multi-threaded tokio runtime.
pub trait PhaseAudio: Send + Sync {
    /// Start looping the tracks in `tracks`, replacing whatever was playing.
    fn start_playback(&self, tracks: &Path);
    /// Stop background playback and everything it spawned.
    fn stop_playback(&self);
    /// Play `chime` once, blocking until it ends.
    fn play_chime(&self, chime: &Path);
}

impl<A: PhaseAudio + ?Sized> PhaseAudio for Arc<A> {
    fn start_playback(&self, tracks: &Path) {
        (**self).start_playback(tracks)
    }

    fn stop_playback(&self) {
        (**self).stop_playback()
    }

    fn play_chime(&self, chime: &Path) {
        (**self).play_chime(chime)
    }
}

type Observer = Box<dyn FnMut(&Event) + Send>;

pub struct PhaseScheduler<A, R> {
    settings: SessionSettings,
    audio: A,
    recorder: R,
    observer: Option<Observer>,
    kind: PhaseKind,
}

impl<A: PhaseAudio, R: SessionRecorder> PhaseScheduler<A, R> {
    /// New scheduler, positioned at the first work phase.
    pub fn new(settings: SessionSettings, audio: A, recorder: R) -> Self {
        Self {
            settings,
            audio,
            recorder,
            observer: None,
            kind: PhaseKind::Work,
        }
    }

    /// Receive every [`Event`] the scheduler produces.
    pub fn with_observer(mut self, observer: impl FnMut(&Event) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn next_kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn emit(&mut self, event: Event) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }

    /// Alternate phases until the process is terminated.
    pub async fn run(&mut self) {
        loop {
            self.run_phase().await;
        }
    }

    /// Run exactly `count` phases.
    pub async fn run_phases(&mut self, count: usize) -> Vec<Phase> {
        let mut phases = Vec::with_capacity(count);
        for _ in 0..count {
            phases.push(self.run_phase().await);
        }
        phases
    }

    /// Run the next phase to completion and advance.
    pub async fn run_phase(&mut self) -> Phase {
        let kind = self.kind;
        let planned = self.settings.planned(kind);
        let mut phase = Phase::begin(kind, planned);
        tracing::info!(%kind, planned_secs = planned.as_secs(), "phase started");
        self.emit(Event::PhaseStarted {
            kind,
            planned_secs: planned.as_secs(),
            at: phase.started_at,
        });

        let started = Instant::now();
        let end = started + planned;

        let playing = !self.settings.silent;
        if playing {
            let tracks = self.settings.track_dir(kind);
            block_in_place(|| self.audio.start_playback(tracks));
        }

        loop {
            let now = Instant::now();
            if now >= end {
                break;
            }
            let remaining = end - now;
            let remaining_secs = remaining.as_millis().div_ceil(1000) as u64;
            self.emit(Event::Countdown {
                kind,
                remaining_secs,
            });
            tokio::time::sleep(remaining.min(self.settings.poll_interval)).await;
        }

        phase.finish(started.elapsed());
        if playing {
            block_in_place(|| self.audio.stop_playback());
        }

        let elapsed_secs = phase.elapsed_secs();
        if let Err(e) = self
            .recorder
            .record(kind, elapsed_secs, Local::now().date_naive())
        {
            tracing::warn!(%kind, error = %e, "could not record phase");
            self.emit(Event::RecordFailed {
                kind,
                message: e.to_string(),
            });
        }
        tracing::info!(%kind, elapsed_secs, "phase completed");
        self.emit(Event::PhaseCompleted {
            kind,
            elapsed_secs,
            at: Local::now(),
        });

        if let Some(chime) = self.settings.chime_file().map(Path::to_path_buf) {
            block_in_place(|| self.audio.play_chime(&chime));
            self.emit(Event::ChimePlayed { at: Local::now() });
            tokio::time::sleep(self.settings.chime_pause).await;
        }

        self.kind = kind.next();
        phase
    }
}
