//! Resource-root resolution and pre-playback existence validation.
//!
//! Every path a playlist references is relative to a single base directory.
//! For a packaged binary the base is the executable's own directory (the
//! bundle), detected by the playlist file sitting next to it; otherwise the
//! current working directory, unless the user overrides the root explicitly.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::playlist::PlaybackJob;

#[derive(Clone, Debug)]
pub struct ResourceRoot {
    base: PathBuf,
}

impl ResourceRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Pick the base directory: an explicit override wins; otherwise the
    /// executable's directory when the playlist is found next to it
    /// (bundled layout); otherwise the current working directory.
    pub fn locate(explicit: Option<PathBuf>, playlist: &Path) -> Self {
        if let Some(base) = explicit {
            return Self::new(base);
        }
        if playlist.is_relative()
            && let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
            && dir.join(playlist).exists()
        {
            return Self::new(dir);
        }
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.base.join(relative)
    }
}

/// A referenced path that does not exist under the resource root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissingResource {
    Video(PathBuf),
    Audio(PathBuf),
    GroupAudio(PathBuf),
}

impl fmt::Display for MissingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video(p) => write!(f, "video file not found: {}", p.display()),
            Self::Audio(p) => write!(f, "audio file not found: {}", p.display()),
            Self::GroupAudio(p) => {
                write!(f, "continuous audio file not found: {}", p.display())
            }
        }
    }
}

/// Scan every path the job sequence references and collect all that are
/// missing under `root`. Read-only; the scan does not stop at the first hit,
/// so the caller can report every problem at once.
pub fn missing_resources(jobs: &[PlaybackJob], root: &ResourceRoot) -> Vec<MissingResource> {
    let mut missing = Vec::new();
    let mut check = |path: &Path, make: fn(PathBuf) -> MissingResource| {
        if !root.resolve(path).exists() {
            missing.push(make(path.to_path_buf()));
        }
    };

    for job in jobs {
        match job {
            PlaybackJob::PerVideo { video, audio } => {
                check(video, MissingResource::Video);
                if let Some(audio) = audio {
                    check(audio, MissingResource::Audio);
                }
            }
            PlaybackJob::ContinuousGroup { audio, videos } => {
                if let Some(audio) = audio {
                    check(audio, MissingResource::GroupAudio);
                }
                for video in videos {
                    check(video, MissingResource::Video);
                }
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let root = ResourceRoot::new("/tmp/showreel");
        assert_eq!(
            root.resolve(Path::new("a/b.mp4")),
            PathBuf::from("/tmp/showreel/a/b.mp4")
        );
    }

    #[test]
    fn explicit_override_wins() {
        let root = ResourceRoot::locate(Some(PathBuf::from("/opt/show")), Path::new("list.txt"));
        assert_eq!(root.base(), Path::new("/opt/show"));
    }

    #[test]
    fn reports_every_missing_path_in_one_pass() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "have.mp4");
        touch(dir.path(), "have.mp3");

        let jobs = vec![
            PlaybackJob::PerVideo {
                video: PathBuf::from("have.mp4"),
                audio: Some(PathBuf::from("gone.mp3")),
            },
            PlaybackJob::PerVideo {
                video: PathBuf::from("gone.mp4"),
                audio: Some(PathBuf::from("have.mp3")),
            },
            PlaybackJob::ContinuousGroup {
                audio: Some(PathBuf::from("bg-gone.mp3")),
                videos: vec![PathBuf::from("have.mp4"), PathBuf::from("also-gone.mp4")],
            },
        ];

        let missing = missing_resources(&jobs, &ResourceRoot::new(dir.path()));
        assert_eq!(
            missing,
            vec![
                MissingResource::Audio(PathBuf::from("gone.mp3")),
                MissingResource::Video(PathBuf::from("gone.mp4")),
                MissingResource::GroupAudio(PathBuf::from("bg-gone.mp3")),
                MissingResource::Video(PathBuf::from("also-gone.mp4")),
            ]
        );
    }

    #[test]
    fn all_present_yields_no_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.mp4");
        touch(dir.path(), "bg.mp3");

        let jobs = vec![PlaybackJob::ContinuousGroup {
            audio: Some(PathBuf::from("bg.mp3")),
            videos: vec![PathBuf::from("a.mp4")],
        }];
        assert!(missing_resources(&jobs, &ResourceRoot::new(dir.path())).is_empty());
    }
}
