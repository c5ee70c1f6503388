//! # pomoloop Core Library
//!
//! Business logic for the pomoloop work/break timer. The `pomoloop` binary
//! is a thin layer over this crate: it parses arguments, renders the
//! countdown and wires the pieces below together.
//!
//! ## Architecture
//!
//! - **Phase scheduler**: an async work/break state machine that counts each
//!   phase down on a fixed poll interval
//! - **Playback supervisor**: owns the background player processes for the
//!   current phase and guarantees they are gone after every teardown
//! - **Session recorder**: persists completed phases to a JSON log
//! - **Exit coordinator**: runs the supervisor's teardown exactly once on
//!   any exit path
//!
//! ## Key Components
//!
//! - [`PhaseScheduler`]: drives phases through a [`PhaseAudio`] and a
//!   [`SessionRecorder`]
//! - [`Supervisor`]: the production [`PhaseAudio`]
//! - [`AnalyticsLog`]: the production [`SessionRecorder`]
//! - [`Config`]: TOML configuration with environment overrides

pub mod duration;
pub mod error;
pub mod events;
pub mod playback;
pub mod recorder;
pub mod shutdown;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DurationError, RecorderError, Result};
pub use events::Event;
pub use playback::{Player, Supervisor, SupervisorOptions};
pub use recorder::SessionRecorder;
pub use shutdown::{ExitCoordinator, ExitGuard, Teardown};
pub use storage::{AnalyticsLog, AnalyticsSummary, Config, SessionEntry};
pub use timer::{
    Phase, PhaseAudio, PhaseKind, PhaseScheduler, SessionOverrides, SessionSettings,
};
