use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "ogg", "oga", "flac", "wav", "m4a", "aac", "opus", "wma", "aiff",
];

/// Audio files found in a directory at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackList {
    tracks: Vec<PathBuf>,
}

impl TrackList {
    /// Resolve the playable files in `dir`, sorted by file name.
    ///
    /// A missing or unreadable directory yields an empty list.
    pub fn scan(dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Self::default();
        };

        let mut tracks: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_audio_file(path))
            .collect();
        tracks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Self { tracks }
    }

    /// Like [`TrackList::scan`], shuffled when `shuffle` is set.
    pub fn resolve(dir: &Path, shuffle: bool) -> Self {
        let mut list = Self::scan(dir);
        if shuffle {
            list.tracks.shuffle(&mut rand::thread_rng());
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

impl IntoIterator for TrackList {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
