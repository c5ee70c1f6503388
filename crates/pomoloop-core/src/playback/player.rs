//! External audio player selection.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::CoreError;

/// Players tried in order when none is configured, with the flags that make
/// them play one file headless and exit.
const KNOWN_PLAYERS: &[(&str, &[&str])] = &[
    ("mpv", &["--no-video", "--really-quiet"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("mpg123", &["-q"]),
    ("paplay", &[]),
    ("afplay", &[]),
];

/// A resolved player program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    program: PathBuf,
    name: String,
    args: Vec<String>,
}

impl Player {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string_lossy().into_owned());
        Self {
            program,
            name,
            args,
        }
    }

    /// Find a player on `PATH`.
    ///
    /// A non-empty `preferred` is the only candidate; its `args` are used
    /// as given. Otherwise the known players are tried in order.
    ///
    /// # Errors
    /// Returns [`CoreError::MissingPlayer`] when nothing is found.
    pub fn detect(preferred: &str, args: &[String]) -> Result<Self, CoreError> {
        let preferred = preferred.trim();
        if !preferred.is_empty() {
            return which::which(preferred)
                .map(|path| Self::new(path, args.to_vec()))
                .map_err(|_| CoreError::MissingPlayer {
                    tried: preferred.to_string(),
                });
        }

        for (name, default_args) in KNOWN_PLAYERS {
            if let Ok(path) = which::which(name) {
                let args = if args.is_empty() {
                    default_args.iter().map(|s| s.to_string()).collect()
                } else {
                    args.to_vec()
                };
                tracing::debug!(player = %path.display(), "audio player found");
                return Ok(Self::new(path, args));
            }
        }

        Err(CoreError::MissingPlayer {
            tried: KNOWN_PLAYERS
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Executable name used for signature matching.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command that plays `track` once, detached from our terminal and in
    /// its own process group so the whole group can be signalled.
    pub fn command(&self, track: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(track)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}
