mod phase;
mod scheduler;
mod settings;

pub use phase::{Phase, PhaseKind};
pub use scheduler::{PhaseAudio, PhaseScheduler};
pub use settings::{SessionOverrides, SessionSettings};
