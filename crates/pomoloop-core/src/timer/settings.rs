use std::path::{Path, PathBuf};
use std::time::Duration;

use super::PhaseKind;
use crate::duration;
use crate::error::CoreError;
use crate::playback::{GracePolicy, SupervisorOptions};
use crate::storage::Config;

/// Pause after a chime before the next phase starts.
const CHIME_PAUSE: Duration = Duration::from_secs(1);

/// Command-line choices layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub work: Option<Duration>,
    pub break_: Option<Duration>,
    pub silent: bool,
    pub shuffle: bool,
    pub collection: Option<String>,
}

/// Everything one timer run needs, fully resolved.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub work: Duration,
    pub break_: Duration,
    pub silent: bool,
    pub shuffle: bool,
    pub work_dir: PathBuf,
    pub break_dir: PathBuf,
    pub chime: Option<PathBuf>,
    pub poll_interval: Duration,
    pub chime_pause: Duration,
    pub grace: GracePolicy,
}

impl SessionSettings {
    /// Merge config and overrides.
    ///
    /// # Errors
    /// Fails on a malformed duration in the config file or a collection
    /// that does not exist.
    pub fn resolve(config: &Config, overrides: SessionOverrides) -> Result<Self, CoreError> {
        let work = match overrides.work {
            Some(d) => d,
            None => duration::parse(&config.timer.work)?,
        };
        let break_ = match overrides.break_ {
            Some(d) => d,
            None => duration::parse(&config.timer.break_)?,
        };

        let (work_dir, break_dir) = match overrides.collection.as_deref() {
            Some(name) => {
                let dir = config.audio.collections_dir.join(name);
                if name.trim().is_empty() || !dir.is_dir() {
                    return Err(CoreError::UnknownCollection {
                        name: name.to_string(),
                        dir: config.audio.collections_dir.clone(),
                    });
                }
                (dir.join("work"), dir.join("break"))
            }
            None => (config.audio.work_dir.clone(), config.audio.break_dir.clone()),
        };

        let chime = Some(config.audio.chime.clone()).filter(|p| !p.as_os_str().is_empty());

        Ok(Self {
            work,
            break_,
            silent: overrides.silent || config.audio.silent,
            shuffle: overrides.shuffle || config.audio.shuffle,
            work_dir,
            break_dir,
            chime,
            poll_interval: Duration::from_millis(config.timer.poll_interval_ms.max(1)),
            chime_pause: CHIME_PAUSE,
            grace: GracePolicy {
                attempts: config.playback.grace_attempts,
                interval: Duration::from_millis(config.playback.grace_interval_ms),
            },
        })
    }

    pub fn planned(&self, kind: PhaseKind) -> Duration {
        match kind {
            PhaseKind::Work => self.work,
            PhaseKind::Break => self.break_,
        }
    }

    pub fn track_dir(&self, kind: PhaseKind) -> &Path {
        match kind {
            PhaseKind::Work => &self.work_dir,
            PhaseKind::Break => &self.break_dir,
        }
    }

    /// The chime file, if one is configured and currently present.
    pub fn chime_file(&self) -> Option<&Path> {
        self.chime.as_deref().filter(|p| p.is_file())
    }

    /// Whether this run will ever hand a file to the player.
    pub fn needs_player(&self) -> bool {
        !self.silent || self.chime_file().is_some()
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        let mut roots = vec![self.work_dir.clone(), self.break_dir.clone()];
        roots.extend(self.chime.clone());
        SupervisorOptions {
            shuffle: self.shuffle,
            grace: self.grace,
            roots,
            ..SupervisorOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.audio.work_dir = dir.join("work");
        config.audio.break_dir = dir.join("break");
        config.audio.collections_dir = dir.join("collections");
        config.audio.chime = dir.join("chime.mp3");
        config
    }

    #[test]
    fn defaults_come_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            SessionSettings::resolve(&config_in(dir.path()), SessionOverrides::default()).unwrap();
        assert_eq!(settings.work, Duration::from_secs(25 * 60));
        assert_eq!(settings.break_, Duration::from_secs(5 * 60));
        assert_eq!(settings.track_dir(PhaseKind::Work), dir.path().join("work"));
        assert!(!settings.silent);
        assert_eq!(settings.grace, GracePolicy::default());
    }

    #[test]
    fn overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = SessionOverrides {
            work: Some(Duration::from_secs(1)),
            break_: Some(Duration::ZERO),
            silent: true,
            shuffle: true,
            collection: None,
        };
        let settings = SessionSettings::resolve(&config_in(dir.path()), overrides).unwrap();
        assert_eq!(settings.planned(PhaseKind::Work), Duration::from_secs(1));
        assert_eq!(settings.planned(PhaseKind::Break), Duration::ZERO);
        assert!(settings.silent);
        assert!(settings.shuffle);
    }

    #[test]
    fn collection_selects_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("collections/lofi")).unwrap();
        let overrides = SessionOverrides {
            collection: Some("lofi".into()),
            ..Default::default()
        };
        let settings = SessionSettings::resolve(&config_in(dir.path()), overrides).unwrap();
        assert_eq!(settings.work_dir, dir.path().join("collections/lofi/work"));
        assert_eq!(settings.break_dir, dir.path().join("collections/lofi/break"));
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = SessionOverrides {
            collection: Some("jazz".into()),
            ..Default::default()
        };
        let result = SessionSettings::resolve(&config_in(dir.path()), overrides);
        assert!(matches!(result, Err(CoreError::UnknownCollection { .. })));
    }

    #[test]
    fn bad_config_duration_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.timer.work = "soon".into();
        let result = SessionSettings::resolve(&config, SessionOverrides::default());
        assert!(matches!(result, Err(CoreError::Duration(_))));
    }

    #[test]
    fn silent_without_chime_needs_no_player() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = SessionOverrides {
            silent: true,
            ..Default::default()
        };
        let settings = SessionSettings::resolve(&config_in(dir.path()), overrides).unwrap();
        assert!(settings.chime_file().is_none());
        assert!(!settings.needs_player());

        std::fs::write(dir.path().join("chime.mp3"), b"").unwrap();
        assert!(settings.needs_player());
    }

    #[test]
    fn supervisor_roots_cover_all_sources() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            SessionSettings::resolve(&config_in(dir.path()), SessionOverrides::default()).unwrap();
        let roots = settings.supervisor_options().roots;
        assert_eq!(roots.len(), 3);
        assert!(roots.contains(&dir.path().join("chime.mp3")));
        assert_eq!(
            settings.supervisor_options().chime_timeout,
            crate::playback::CHIME_TIMEOUT
        );
    }
}
