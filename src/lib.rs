#![forbid(unsafe_code)]

pub mod audio;
pub mod display;
pub mod error;
pub mod geometry;
pub mod media;
pub mod playlist;
pub mod resources;
pub mod sequencer;

pub use audio::{AudioConfig, AudioPlayer, CpalAudioPlayer, NullAudioPlayer};
pub use display::{FltkWindow, FrameSink, PlayerControl};
pub use error::{ShowreelError, ShowreelResult};
pub use geometry::{Canvas, Placement, fit_to_canvas};
pub use media::{FfmpegVideoOpener, FrameRgb, VideoOpener, VideoSource};
pub use playlist::{PlaybackJob, parse_lines, parse_playlist_file};
pub use resources::{MissingResource, ResourceRoot, missing_resources};
pub use sequencer::{PlayerConfig, SequenceOutcome, Sequencer};
