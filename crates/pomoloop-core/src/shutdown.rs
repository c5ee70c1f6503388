//! Signal and exit coordination.
//!
//! One teardown routine, run at most once, from whichever exit path gets
//! there first:
//!
//! - the [`ExitGuard`] going out of scope (normal return, unwinding)
//! - the panic hook (release builds abort on panic, so Drop never runs)
//! - the signal listener (SIGINT, SIGTERM, SIGHUP), which then exits 0
//!
//! When panics unwind, the hook only reacts to panics on the thread that
//! created the coordinator. A panic elsewhere (say, in a playback worker)
//! leaves the session running; the worker's job is torn down by the next
//! stop as usual.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::task::JoinHandle;

/// How long a panicking thread waits for teardown before letting the
/// panic continue.
const PANIC_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Something that must be cleaned up before the process ends.
pub trait Teardown: Send + Sync {
    fn teardown(&self);
}

pub struct ExitCoordinator {
    target: Arc<dyn Teardown>,
    done: AtomicBool,
    owner: ThreadId,
}

impl ExitCoordinator {
    /// The calling thread becomes the owner for panic handling.
    pub fn new(target: Arc<dyn Teardown>) -> Arc<Self> {
        Arc::new(Self {
            target,
            done: AtomicBool::new(false),
            owner: thread::current().id(),
        })
    }

    /// Run teardown unless it already ran. Returns true if this call ran it.
    pub fn run_teardown(&self) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::debug!("running teardown");
        self.target.teardown();
        true
    }

    /// Install the full exit discipline around `target`: panic hook plus a
    /// scope guard. The signal listener is started separately once a
    /// runtime exists.
    pub fn install(target: Arc<dyn Teardown>) -> ExitGuard {
        let coordinator = Self::new(target);
        coordinator.install_panic_hook();
        coordinator.guard()
    }

    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Guard that runs teardown when dropped.
    pub fn guard(self: &Arc<Self>) -> ExitGuard {
        ExitGuard {
            coordinator: Arc::clone(self),
        }
    }

    /// Whether a panic on the current thread ends the session.
    ///
    /// Always true when panics abort the process.
    pub fn panic_ends_session(&self) -> bool {
        cfg!(panic = "abort") || thread::current().id() == self.owner
    }

    /// Chain a teardown onto the current panic hook.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            previous(info);
            if coordinator.panic_ends_session() {
                teardown_from_panic(Arc::clone(&coordinator));
            } else {
                tracing::warn!(
                    thread = thread::current().name().unwrap_or("unnamed"),
                    "background thread panicked, session continues"
                );
            }
        }));
    }

    /// Listen for SIGINT, SIGTERM and SIGHUP; on the first one, tear down
    /// and exit with status 0.
    ///
    /// Handlers are registered before this returns. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if a signal handler cannot be registered.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let signals = Signals::register()?;
        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let name = signals.recv().await;
            tracing::info!(signal = name, "shutting down");
            coordinator.run_teardown();
            std::process::exit(0);
        }))
    }
}

/// Teardown on a helper thread so a lock held by the panicking thread
/// cannot deadlock the hook.
fn teardown_from_panic(coordinator: Arc<ExitCoordinator>) {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("pomoloop-teardown".into())
        .spawn(move || {
            coordinator.run_teardown();
            let _ = tx.send(());
        });
    if spawned.is_ok() {
        let _ = rx.recv_timeout(PANIC_TEARDOWN_TIMEOUT);
    }
}

/// Runs the coordinator's teardown on drop.
pub struct ExitGuard {
    coordinator: Arc<ExitCoordinator>,
}

impl ExitGuard {
    pub fn coordinator(&self) -> &Arc<ExitCoordinator> {
        &self.coordinator
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.coordinator.run_teardown();
    }
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}
