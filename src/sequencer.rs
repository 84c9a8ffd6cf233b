//! The playback sequencer: consumes the validated job sequence in order,
//! coordinating the video decoder, the audio player, and the frame sink.
//!
//! Video and audio end asynchronously: the fade-out is issued from inside
//! the frame loop when few enough frames remain, and the loop's caller then
//! blocks until the audio tail has actually finished.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::audio::AudioPlayer;
use crate::display::{FrameSink, PlayerControl};
use crate::error::ShowreelResult;
use crate::geometry::{Canvas, fit_to_canvas};
use crate::media::{VideoOpener, VideoSource};
use crate::playlist::PlaybackJob;
use crate::resources::ResourceRoot;

#[derive(Clone, Copy, Debug)]
pub struct PlayerConfig {
    pub canvas: Canvas,
    /// Audio fade-in and fade-out duration.
    pub fade: Duration,
    /// Substitute rate for clips reporting no usable frame rate.
    pub default_fps: f64,
    /// Sleep between `is_busy` polls while draining the audio tail.
    pub drain_poll: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::new(1280, 720),
            fade: Duration::from_millis(1500),
            default_fps: 25.0,
            drain_poll: Duration::from_millis(10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Every job ran (some possibly skipped as recoverable failures).
    Completed,
    /// The user quit; remaining jobs were not played.
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClipOutcome {
    Finished,
    QuitRequested,
}

/// Fade bookkeeping for one clip or one whole continuous group. Owned by the
/// sequencer and passed explicitly into the frame loop, so the trigger fires
/// at most once per session no matter how many polls observe the threshold.
struct FadeState {
    triggered: bool,
}

impl FadeState {
    fn armed() -> Self {
        Self { triggered: false }
    }
}

pub struct Sequencer<'a> {
    config: PlayerConfig,
    root: ResourceRoot,
    opener: &'a dyn VideoOpener,
    audio: &'a mut dyn AudioPlayer,
    sink: &'a mut dyn FrameSink,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        config: PlayerConfig,
        root: ResourceRoot,
        opener: &'a dyn VideoOpener,
        audio: &'a mut dyn AudioPlayer,
        sink: &'a mut dyn FrameSink,
    ) -> Self {
        Self {
            config,
            root,
            opener,
            audio,
            sink,
        }
    }

    /// Play the whole job sequence in order. Per-job failures are skipped;
    /// only a user quit (or a dead sink) ends the sequence early.
    pub fn play_all(&mut self, jobs: &[PlaybackJob]) -> ShowreelResult<SequenceOutcome> {
        for job in jobs {
            let outcome = match job {
                PlaybackJob::PerVideo { video, audio } => {
                    self.play_per_video(video, audio.as_deref())?
                }
                PlaybackJob::ContinuousGroup { audio, videos } => {
                    self.play_group(audio.as_deref(), videos)?
                }
            };
            if outcome == ClipOutcome::QuitRequested {
                info!("quit requested, aborting sequence");
                return Ok(SequenceOutcome::Aborted);
            }
        }
        Ok(SequenceOutcome::Completed)
    }

    fn play_per_video(&mut self, video: &Path, audio: Option<&Path>) -> ShowreelResult<ClipOutcome> {
        match audio {
            Some(a) => info!("playing {} with {}", video.display(), a.display()),
            None => info!("playing {} (silent)", video.display()),
        }

        let Some(mut source) = self.open_clip(video) else {
            return Ok(ClipOutcome::Finished);
        };

        let audio_started = audio.is_some_and(|path| self.start_audio(path));
        let mut fade = FadeState::armed();
        let outcome = self.run_clip(source.as_mut(), audio_started, &mut fade)?;
        if outcome == ClipOutcome::QuitRequested {
            return Ok(outcome);
        }
        if audio_started {
            self.finish_audio(&mut fade);
        }
        Ok(ClipOutcome::Finished)
    }

    fn play_group(&mut self, audio: Option<&Path>, videos: &[PathBuf]) -> ShowreelResult<ClipOutcome> {
        if let Some(a) = audio {
            info!("starting continuous audio {}", a.display());
        }
        let audio_started = audio.is_some_and(|path| self.start_audio(path));

        // One fade state spans the whole group; the track is never reloaded
        // or re-faded between clips.
        let mut fade = FadeState::armed();
        let last = videos.len().checked_sub(1);
        for (idx, video) in videos.iter().enumerate() {
            info!("continuing with {}", video.display());
            let Some(mut source) = self.open_clip(video) else {
                continue;
            };
            let armed = audio_started && Some(idx) == last;
            let outcome = self.run_clip(source.as_mut(), armed, &mut fade)?;
            if outcome == ClipOutcome::QuitRequested {
                return Ok(outcome);
            }
        }

        if audio_started {
            self.finish_audio(&mut fade);
        }
        Ok(ClipOutcome::Finished)
    }

    fn open_clip(&mut self, video: &Path) -> Option<Box<dyn VideoSource>> {
        match self.opener.open(&self.root.resolve(video)) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!("cannot open video '{}', skipping: {e}", video.display());
                None
            }
        }
    }

    fn start_audio(&mut self, path: &Path) -> bool {
        let resolved = self.root.resolve(path);
        let started = self
            .audio
            .load(&resolved)
            .and_then(|()| self.audio.play(true, self.config.fade));
        match started {
            Ok(()) => {
                info!("audio '{}' started", path.display());
                true
            }
            Err(e) => {
                warn!("audio '{}' unavailable, continuing silent: {e}", path.display());
                false
            }
        }
    }

    /// Let a started track finish audibly after the last frame. If the fade
    /// was never triggered inside a frame loop (clip skipped, or the stream
    /// ended before the threshold was observed), trigger it here; a looped
    /// track would otherwise never report idle.
    fn finish_audio(&mut self, fade: &mut FadeState) {
        if !fade.triggered {
            self.audio.fade_out(self.config.fade);
            fade.triggered = true;
        }
        while self.audio.is_busy() {
            std::thread::sleep(self.config.drain_poll);
        }
    }

    /// The frame loop shared by both job kinds. Returns `QuitRequested` only
    /// for a user quit; end of stream and mid-stream decode failures end the
    /// clip normally.
    fn run_clip(
        &mut self,
        source: &mut dyn VideoSource,
        fade_armed: bool,
        fade: &mut FadeState,
    ) -> ShowreelResult<ClipOutcome> {
        let (src_w, src_h) = source.frame_size();
        let placement = match fit_to_canvas(src_w, src_h, self.config.canvas) {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping clip with unusable geometry: {e}");
                return Ok(ClipOutcome::Finished);
            }
        };

        let mut fps = source.frame_rate();
        if !fps.is_finite() || fps <= 0.0 {
            warn!(fallback = self.config.default_fps, "clip reports no usable frame rate");
            fps = self.config.default_fps;
        }
        let frame_interval = Duration::from_secs_f64(1.0 / fps);
        let fade_threshold_frames = (self.config.fade.as_secs_f64() * fps).ceil() as u64;

        let mut next_tick = Instant::now() + frame_interval;
        loop {
            if self.sink.poll_control() == PlayerControl::Quit {
                self.audio.stop();
                return Ok(ClipOutcome::QuitRequested);
            }

            if fade_armed
                && !fade.triggered
                && source.total_frames().saturating_sub(source.position()) <= fade_threshold_frames
            {
                self.audio.fade_out(self.config.fade);
                fade.triggered = true;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("decode failed mid-clip, ending clip early: {e}");
                    break;
                }
            };
            self.sink.present(&frame, placement)?;

            let now = Instant::now();
            if let Some(remaining) = next_tick.checked_duration_since(now) {
                spin_sleep::sleep(remaining);
            } else {
                // Fell behind; reschedule from now instead of racing to catch up.
                next_tick = now;
            }
            next_tick += frame_interval;
        }

        Ok(ClipOutcome::Finished)
    }
}
