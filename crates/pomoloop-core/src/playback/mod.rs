//! Background playback supervisor.
//!
//! The [`Supervisor`] owns at most one [`PlaybackJob`] at a time. A job is a
//! worker thread that walks a [`TrackList`], playing each file through an
//! external [`Player`] process, rescanning the directory whenever the list
//! runs out. Every player it spawns lives in the job's [`HandleRegistry`].
//!
//! ## Teardown
//!
//! ```text
//! close registry -> SIGTERM (descendants, group, player) -> grace polls
//!     -> SIGKILL survivors -> signature sweep of the track directory
//! ```
//!
//! After [`Supervisor::stop`] returns nothing the job started is still
//! running, whether tracked by handle, by process group, or only
//! recognisable by its command line.

mod player;
pub mod process;
mod registry;
mod tracks;

pub use player::Player;
pub use process::{Signature, StopSignal};
pub use registry::{ChildStatus, GracePolicy, HandleRegistry, OwnedProcess};
pub use tracks::TrackList;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::shutdown::Teardown;
use crate::timer::PhaseAudio;

/// How long an idle job waits before rescanning an empty directory.
const IDLE_RESCAN: Duration = Duration::from_secs(1);
/// How often a job checks on the current player.
const PLAYER_POLL: Duration = Duration::from_millis(200);
/// Default upper bound for a single chime.
pub const CHIME_TIMEOUT: Duration = Duration::from_secs(30);
const CHIME_POLL: Duration = Duration::from_millis(50);

/// One phase's worth of background audio.
pub struct PlaybackJob {
    track_dir: PathBuf,
    registry: Arc<HandleRegistry>,
    cancel: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackJob {
    fn launch(player: Player, track_dir: &Path, shuffle: bool) -> std::io::Result<Self> {
        let registry = Arc::new(HandleRegistry::new());
        let (cancel, cancelled) = mpsc::channel();

        let worker = {
            let registry = Arc::clone(&registry);
            let dir = track_dir.to_path_buf();
            thread::Builder::new()
                .name("pomoloop-playback".into())
                .spawn(move || play_loop(&player, &dir, shuffle, &registry, &cancelled))?
        };

        Ok(Self {
            track_dir: track_dir.to_path_buf(),
            registry,
            cancel: Some(cancel),
            worker: Some(worker),
        })
    }

    pub fn pids(&self) -> Vec<u32> {
        self.registry.pids()
    }

    fn stop(mut self, grace: GracePolicy, program: &str) {
        let handles = self.registry.close();
        // Dropping the sender wakes the worker out of any wait.
        drop(self.cancel.take());

        let escalated = registry::terminate(handles, grace);
        if escalated > 0 {
            tracing::warn!(escalated, dir = %self.track_dir.display(), "players ignored SIGTERM and were killed");
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(dir = %self.track_dir.display(), "playback worker panicked");
            }
        }

        let signature = Signature::new(program, vec![self.track_dir.clone()]);
        let strays = process::sweep(&signature, StopSignal::Kill);
        if strays > 0 {
            tracing::warn!(strays, dir = %self.track_dir.display(), "killed untracked players");
        }
        tracing::info!(dir = %self.track_dir.display(), "playback stopped");
    }
}

/// Returns true when the job should stop.
fn cancelled_within(cancel: &Receiver<()>, timeout: Duration) -> bool {
    !matches!(cancel.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

fn play_loop(
    player: &Player,
    dir: &Path,
    shuffle: bool,
    registry: &HandleRegistry,
    cancel: &Receiver<()>,
) {
    loop {
        let tracks = TrackList::resolve(dir, shuffle);
        tracing::debug!(dir = %dir.display(), tracks = tracks.len(), "track list resolved");
        if tracks.is_empty() {
            tracing::debug!(dir = %dir.display(), "no tracks, idling");
            if cancelled_within(cancel, IDLE_RESCAN) {
                return;
            }
            continue;
        }

        for track in tracks {
            match registry.spawn(&mut player.command(&track)) {
                Ok(Some(pid)) => {
                    tracing::info!(pid, track = %track.display(), "playing");
                    if !wait_for_track(registry, pid, cancel) {
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(track = %track.display(), error = %e, "cannot start player");
                    if cancelled_within(cancel, IDLE_RESCAN) {
                        return;
                    }
                }
            }
        }
    }
}

/// Returns false if the job was cancelled while the track played.
fn wait_for_track(registry: &HandleRegistry, pid: u32, cancel: &Receiver<()>) -> bool {
    let mut adopted = false;
    loop {
        if cancelled_within(cancel, PLAYER_POLL) {
            return false;
        }
        if !adopted {
            registry.adopt_descendants();
            adopted = true;
        }
        if registry.poll(pid) == ChildStatus::Exited {
            return true;
        }
    }
}

/// Options that shape every job a supervisor starts.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub shuffle: bool,
    pub grace: GracePolicy,
    /// Every directory (or file) our players may be pointed at. Used for
    /// orphan reconciliation and the final sweep.
    pub roots: Vec<PathBuf>,
    /// A chime still playing after this long is stopped.
    pub chime_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            shuffle: false,
            grace: GracePolicy::default(),
            roots: Vec::new(),
            chime_timeout: CHIME_TIMEOUT,
        }
    }
}

pub struct Supervisor {
    player: Option<Player>,
    options: SupervisorOptions,
    active: Mutex<Option<PlaybackJob>>,
    chime: HandleRegistry,
    closed: AtomicBool,
}

impl Supervisor {
    /// A supervisor without a player never produces audio; it exists for
    /// silent sessions on hosts with nothing to play with.
    pub fn new(player: Option<Player>, options: SupervisorOptions) -> Self {
        Self {
            player,
            options,
            active: Mutex::new(None),
            chime: HandleRegistry::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<PlaybackJob>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signature(&self) -> Option<Signature> {
        self.player
            .as_ref()
            .map(|p| Signature::new(p.name(), self.options.roots.clone()))
    }

    /// Start looping `track_dir`, replacing any active job.
    ///
    /// The previous job is fully torn down before the new one spawns
    /// anything. Silent mode creates no job at all.
    pub fn start(&self, track_dir: &Path, silent: bool) {
        if silent {
            return;
        }
        let Some(player) = &self.player else {
            return;
        };

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            previous.stop(self.options.grace, player.name());
        }
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("supervisor closed, not starting playback");
            return;
        }

        match PlaybackJob::launch(player.clone(), track_dir, self.options.shuffle) {
            Ok(job) => {
                tracing::info!(dir = %track_dir.display(), "playback started");
                *active = Some(job);
            }
            Err(e) => tracing::warn!(error = %e, "cannot start playback worker"),
        }
    }

    /// Tear down the active job, if any. Calling it again is a no-op.
    pub fn stop(&self) {
        let mut active = self.lock_active();
        if let (Some(job), Some(player)) = (active.take(), &self.player) {
            job.stop(self.options.grace, player.name());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Player pids of the active job.
    pub fn active_pids(&self) -> Vec<u32> {
        self.lock_active()
            .as_ref()
            .map(PlaybackJob::pids)
            .unwrap_or_default()
    }

    /// Ask players left behind by an earlier run to exit.
    ///
    /// Finding none is the normal case.
    pub fn reconcile_orphans(&self) -> usize {
        let Some(signature) = self.signature() else {
            return 0;
        };
        let orphans = process::sweep(&signature, StopSignal::Terminate);
        if orphans > 0 {
            tracing::info!(orphans, "terminated players left by a previous run");
        }
        orphans
    }

    /// Play `chime` once and wait for it, at most `chime_timeout`.
    ///
    /// Returns early if [`Supervisor::shutdown`] runs meanwhile.
    pub fn play_chime(&self, chime: &Path) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(player) = &self.player else {
            return;
        };

        let pid = match self.chime.spawn(&mut player.command(chime)) {
            Ok(Some(pid)) => pid,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(chime = %chime.display(), error = %e, "cannot play chime");
                return;
            }
        };

        let deadline = Instant::now() + self.options.chime_timeout;
        while self.chime.poll(pid) == ChildStatus::Running {
            if Instant::now() >= deadline {
                tracing::warn!(chime = %chime.display(), "chime overran, stopping it");
                registry::terminate(self.chime.drain(), self.options.grace);
                break;
            }
            thread::sleep(CHIME_POLL);
        }
    }

    /// Stop everything for good. Later `start` and `play_chime` calls are
    /// ignored.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stop();
        registry::terminate(self.chime.close(), self.options.grace);
        if let Some(signature) = self.signature() {
            process::sweep(&signature, StopSignal::Kill);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PhaseAudio for Supervisor {
    fn start_playback(&self, tracks: &Path) {
        self.start(tracks, false);
    }

    fn stop_playback(&self) {
        self.stop();
    }

    fn play_chime(&self, chime: &Path) {
        Supervisor::play_chime(self, chime);
    }
}

impl Teardown for Supervisor {
    fn teardown(&self) {
        self.shutdown();
    }
}
