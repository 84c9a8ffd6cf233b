//! Playlist parsing.
//!
//! The playlist is a line-oriented UTF-8 text file:
//!
//! ```text
//! # comment
//! video.mp4                      silent clip
//! video.mp4,                     audio derived from the video name (.mp4 -> .mp3)
//! video.mp4,custom_audio.mp3     explicit audio track
//! CONTINUOUS_AUDIO_GROUP,bg.mp3
//! clipA.mp4
//! clipB.mp4
//! END_CONTINUOUS_AUDIO_GROUP
//! ```
//!
//! Parsing is pure: it never touches the filesystem beyond reading the
//! playlist itself, and the same text always yields the same job sequence.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ShowreelError, ShowreelResult};

const GROUP_OPEN: &str = "CONTINUOUS_AUDIO_GROUP";
const GROUP_CLOSE: &str = "END_CONTINUOUS_AUDIO_GROUP";

const VIDEO_EXT: &str = ".mp4";
const AUDIO_EXT: &str = ".mp3";

/// One unit of the ordered playback sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackJob {
    /// One clip with at most one independent audio track that starts and
    /// fades out with that clip alone.
    PerVideo {
        video: PathBuf,
        audio: Option<PathBuf>,
    },
    /// Clips played back-to-back under one audio track that starts at the
    /// group's first clip and fades out only at its last.
    ContinuousGroup {
        audio: Option<PathBuf>,
        videos: Vec<PathBuf>,
    },
}

struct PendingGroup {
    audio: Option<PathBuf>,
    videos: Vec<PathBuf>,
}

impl PendingGroup {
    fn into_job(self) -> PlaybackJob {
        PlaybackJob::ContinuousGroup {
            audio: self.audio,
            videos: self.videos,
        }
    }
}

/// Swap the recognized video extension for the audio extension.
///
/// The mapping is total: names not ending in `.mp4` map to themselves
/// unchanged, so a derived path always exists (the validator decides whether
/// it points at anything).
pub fn derive_audio_path(video: &str) -> String {
    match video.strip_suffix(VIDEO_EXT) {
        Some(stem) => format!("{stem}{AUDIO_EXT}"),
        None => video.to_string(),
    }
}

/// Load and parse a playlist file. A missing or unreadable file is an error;
/// the caller treats it as fatal.
pub fn parse_playlist_file(path: &Path) -> ShowreelResult<Vec<PlaybackJob>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ShowreelError::playlist(format!("cannot read playlist '{}': {e}", path.display()))
    })?;
    Ok(parse_lines(text.lines()))
}

/// Parse playlist lines into the ordered job sequence.
///
/// Malformed lines degrade per the rules below rather than failing:
/// - blank lines and `#` comments are skipped;
/// - a group opener without an audio field warns and leaves the parser in
///   per-video mode (after flushing any pending group);
/// - a group closer outside a group is a no-op;
/// - a group still open at end of input is emitted, never dropped.
pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<PlaybackJob> {
    let mut jobs = Vec::new();
    let mut pending: Option<PendingGroup> = None;

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (primary, remainder) = match line.split_once(',') {
            Some((a, b)) => (a.trim(), Some(b.trim())),
            None => (line, None),
        };

        if primary.eq_ignore_ascii_case(GROUP_OPEN) {
            if let Some(group) = pending.take() {
                jobs.push(group.into_job());
            }
            match remainder {
                Some(audio) if !audio.is_empty() => {
                    pending = Some(PendingGroup {
                        audio: Some(PathBuf::from(audio)),
                        videos: Vec::new(),
                    });
                }
                _ => warn!("{GROUP_OPEN} requires an audio file; staying in per-video mode"),
            }
            continue;
        }

        if primary.eq_ignore_ascii_case(GROUP_CLOSE) {
            if let Some(group) = pending.take() {
                jobs.push(group.into_job());
            }
            continue;
        }

        if let Some(group) = pending.as_mut() {
            group.videos.push(PathBuf::from(primary));
            continue;
        }

        let audio = match remainder {
            None => None,
            Some("") => Some(PathBuf::from(derive_audio_path(primary))),
            Some(audio) => Some(PathBuf::from(audio)),
        };
        jobs.push(PlaybackJob::PerVideo {
            video: PathBuf::from(primary),
            audio,
        });
    }

    if let Some(group) = pending {
        jobs.push(group.into_job());
    }

    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_video(video: &str, audio: Option<&str>) -> PlaybackJob {
        PlaybackJob::PerVideo {
            video: PathBuf::from(video),
            audio: audio.map(PathBuf::from),
        }
    }

    fn group(audio: &str, videos: &[&str]) -> PlaybackJob {
        PlaybackJob::ContinuousGroup {
            audio: Some(PathBuf::from(audio)),
            videos: videos.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let jobs = parse_lines(["# intro", "", "   ", "a.mp4"]);
        assert_eq!(jobs, vec![per_video("a.mp4", None)]);
    }

    #[test]
    fn per_video_audio_forms() {
        let jobs = parse_lines(["a.mp4", "b.mp4,", "c.mp4,track.mp3", "d.mp4,  spaced.mp3  "]);
        assert_eq!(
            jobs,
            vec![
                per_video("a.mp4", None),
                per_video("b.mp4", Some("b.mp3")),
                per_video("c.mp4", Some("track.mp3")),
                per_video("d.mp4", Some("spaced.mp3")),
            ]
        );
    }

    #[test]
    fn derived_audio_swaps_exact_suffix_only() {
        assert_eq!(derive_audio_path("a.mp4"), "a.mp3");
        assert_eq!(derive_audio_path("a.b.mp4"), "a.b.mp3");
        assert_eq!(derive_audio_path("a.mp4.mp4"), "a.mp4.mp3");
        // Not the recognized extension: unchanged rather than mangled.
        assert_eq!(derive_audio_path("a.avi"), "a.avi");
        assert_eq!(derive_audio_path(""), "");
    }

    #[test]
    fn group_with_audio_collects_clips_in_order() {
        let jobs = parse_lines([
            "CONTINUOUS_AUDIO_GROUP,bg.mp3",
            "x.mp4",
            "y.mp4",
            "END_CONTINUOUS_AUDIO_GROUP",
        ]);
        assert_eq!(jobs, vec![group("bg.mp3", &["x.mp4", "y.mp4"])]);
    }

    #[test]
    fn control_keywords_are_case_insensitive() {
        let jobs = parse_lines([
            "continuous_audio_group,bg.mp3",
            "x.mp4",
            "End_Continuous_Audio_Group",
        ]);
        assert_eq!(jobs, vec![group("bg.mp3", &["x.mp4"])]);
    }

    #[test]
    fn unterminated_group_is_emitted_at_end_of_input() {
        let jobs = parse_lines(["CONTINUOUS_AUDIO_GROUP,bg.mp3", "x.mp4"]);
        assert_eq!(jobs, vec![group("bg.mp3", &["x.mp4"])]);

        let jobs = parse_lines(["CONTINUOUS_AUDIO_GROUP,bg.mp3"]);
        assert_eq!(jobs, vec![group("bg.mp3", &[])]);
    }

    #[test]
    fn reopening_group_flushes_prior_group_intact() {
        let jobs = parse_lines([
            "CONTINUOUS_AUDIO_GROUP,one.mp3",
            "a.mp4",
            "b.mp4",
            "CONTINUOUS_AUDIO_GROUP,two.mp3",
            "c.mp4",
            "END_CONTINUOUS_AUDIO_GROUP",
        ]);
        assert_eq!(
            jobs,
            vec![group("one.mp3", &["a.mp4", "b.mp4"]), group("two.mp3", &["c.mp4"])]
        );
    }

    #[test]
    fn group_opener_without_audio_stays_per_video() {
        let jobs = parse_lines(["CONTINUOUS_AUDIO_GROUP", "a.mp4", "CONTINUOUS_AUDIO_GROUP,", "b.mp4,"]);
        assert_eq!(
            jobs,
            vec![per_video("a.mp4", None), per_video("b.mp4", Some("b.mp3"))]
        );
    }

    #[test]
    fn reopen_without_audio_flushes_and_returns_to_per_video() {
        let jobs = parse_lines([
            "CONTINUOUS_AUDIO_GROUP,bg.mp3",
            "a.mp4",
            "CONTINUOUS_AUDIO_GROUP",
            "b.mp4",
        ]);
        assert_eq!(
            jobs,
            vec![group("bg.mp3", &["a.mp4"]), per_video("b.mp4", None)]
        );
    }

    #[test]
    fn close_outside_group_is_a_no_op() {
        let jobs = parse_lines(["END_CONTINUOUS_AUDIO_GROUP", "a.mp4"]);
        assert_eq!(jobs, vec![per_video("a.mp4", None)]);
    }

    #[test]
    fn closed_group_may_be_empty() {
        let jobs = parse_lines([
            "CONTINUOUS_AUDIO_GROUP,bg.mp3",
            "END_CONTINUOUS_AUDIO_GROUP",
            "a.mp4",
        ]);
        assert_eq!(jobs, vec![group("bg.mp3", &[]), per_video("a.mp4", None)]);
    }

    #[test]
    fn bare_comma_line_does_not_crash() {
        // "a.mp4" then a line that is just a comma: an empty video whose
        // audio derives from the empty name.
        let jobs = parse_lines(["a.mp4", ","]);
        assert_eq!(
            jobs,
            vec![per_video("a.mp4", None), per_video("", Some(""))]
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = ["a.mp4,", "CONTINUOUS_AUDIO_GROUP,bg.mp3", "x.mp4"];
        assert_eq!(parse_lines(text), parse_lines(text));
    }
}
