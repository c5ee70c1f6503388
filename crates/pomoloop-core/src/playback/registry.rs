//! Handle registry for the processes a playback job owns.
//!
//! Spawning happens under the registry lock and the child is pushed before
//! the lock is released, so a handle can never be lost between spawn and
//! bookkeeping. Once closed, the registry refuses new spawns: teardown and
//! a late spawn cannot interleave.

use std::process::{Child, Command};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::process::{self, ProcessTable, StopSignal};

/// Graceful-then-forceful shutdown tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_millis(100),
        }
    }
}

/// A spawned player together with every descendant seen so far.
#[derive(Debug)]
pub struct OwnedProcess {
    child: Child,
    descendants: Vec<u32>,
    /// Once the child is reaped its pid (and group id) may be reused, so
    /// only the recorded descendants may still be signalled.
    reaped: bool,
}

impl OwnedProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn adopt_descendants(&mut self, table: &ProcessTable) {
        for pid in table.descendants(self.pid()) {
            if !self.descendants.contains(&pid) {
                self.descendants.push(pid);
            }
        }
    }

    fn new(child: Child) -> Self {
        Self {
            child,
            descendants: Vec::new(),
            reaped: false,
        }
    }

    /// Innermost first: deepest descendants, then the group, then the player.
    fn signal(&self, sig: StopSignal) {
        for &pid in self.descendants.iter().rev() {
            process::signal_pid(pid, sig);
        }
        if !self.reaped {
            process::signal_group(self.pid(), sig);
            process::signal_pid(self.pid(), sig);
        }
    }

    fn child_running(&mut self) -> bool {
        if self.reaped {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) | Err(_) => {
                self.reaped = true;
                false
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        self.child_running() || self.descendants.iter().any(|&pid| process::is_running(pid))
    }

    fn reap(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.wait() {
            tracing::debug!(pid = self.pid(), error = %e, "wait after kill failed");
        }
        self.reaped = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Running,
    Exited,
}

#[derive(Debug, Default)]
struct RegistryState {
    closed: bool,
    handles: Vec<OwnedProcess>,
}

#[derive(Debug, Default)]
pub struct HandleRegistry {
    state: Mutex<RegistryState>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic while holding the lock leaves the handle list intact.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn `cmd` and record it. Returns `Ok(None)` once closed.
    ///
    /// # Errors
    /// Returns the spawn error; nothing is recorded in that case.
    pub fn spawn(&self, cmd: &mut Command) -> std::io::Result<Option<u32>> {
        let mut state = self.lock();
        if state.closed {
            return Ok(None);
        }
        let child = cmd.spawn()?;
        let pid = child.id();
        state.handles.push(OwnedProcess::new(child));
        tracing::debug!(pid, "player spawned");
        Ok(Some(pid))
    }

    /// Poll a recorded child, dropping it once it has exited.
    pub fn poll(&self, pid: u32) -> ChildStatus {
        let mut state = self.lock();
        let Some(index) = state.handles.iter().position(|h| h.pid() == pid) else {
            return ChildStatus::Exited;
        };
        match state.handles[index].child.try_wait() {
            Ok(None) => ChildStatus::Running,
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::debug!(pid, %status, "player exited abnormally");
                }
                state.handles.swap_remove(index);
                ChildStatus::Exited
            }
            Err(e) => {
                tracing::debug!(pid, error = %e, "cannot poll player");
                state.handles.swap_remove(index);
                ChildStatus::Exited
            }
        }
    }

    /// Record the current descendants of every live handle.
    pub fn adopt_descendants(&self) {
        let table = ProcessTable::snapshot();
        for handle in self.lock().handles.iter_mut() {
            handle.adopt_descendants(&table);
        }
    }

    pub fn pids(&self) -> Vec<u32> {
        self.lock().handles.iter().map(OwnedProcess::pid).collect()
    }

    /// Hand over every recorded process, leaving the registry open.
    pub fn drain(&self) -> Vec<OwnedProcess> {
        std::mem::take(&mut self.lock().handles)
    }

    /// Refuse further spawns and hand over every recorded process.
    pub fn close(&self) -> Vec<OwnedProcess> {
        let mut state = self.lock();
        state.closed = true;
        std::mem::take(&mut state.handles)
    }
}

/// Terminate `handles` and everything they spawned.
///
/// SIGTERM first, then up to `policy.attempts` polls `policy.interval`
/// apart, then SIGKILL for whatever survived. Returns the number of
/// processes that needed escalation.
pub fn terminate(mut handles: Vec<OwnedProcess>, policy: GracePolicy) -> usize {
    if handles.is_empty() {
        return 0;
    }

    let table = ProcessTable::snapshot();
    for handle in handles.iter_mut() {
        handle.adopt_descendants(&table);
        handle.signal(StopSignal::Terminate);
    }

    for _ in 0..policy.attempts {
        handles.retain_mut(|h| h.is_alive());
        if handles.is_empty() {
            return 0;
        }
        thread::sleep(policy.interval);
    }
    handles.retain_mut(|h| h.is_alive());

    let escalated = handles.len();
    for handle in handles.iter_mut() {
        tracing::debug!(pid = handle.pid(), "grace period expired, killing");
        handle.signal(StopSignal::Kill);
        handle.reap();
    }
    escalated
}
