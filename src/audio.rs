//! Realtime audio playback with fade-in/fade-out envelopes.
//!
//! One cpal output stream lives for the whole program; track state sits
//! behind a mutex shared with the audio callback. The callback never
//! allocates and never blocks beyond that lock. Fades are linear amplitude
//! ramps measured in output sample frames.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{ShowreelError, ShowreelResult};
use crate::media::decode_audio_f32_stereo;

/// Output stream parameters.
#[derive(Clone, Copy, Debug)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

/// Single-track audio playback capability consumed by the sequencer.
pub trait AudioPlayer {
    /// Replace the loaded track with the file at `path`.
    fn load(&mut self, path: &Path) -> ShowreelResult<()>;
    /// Start the loaded track from its beginning with a fade-in ramp.
    fn play(&mut self, looped: bool, fade_in: Duration) -> ShowreelResult<()>;
    /// Begin fading the playing track out; a second call is a no-op.
    fn fade_out(&mut self, fade: Duration);
    /// Whether a track is still audible (including a fade tail).
    fn is_busy(&self) -> bool;
    /// Silence immediately.
    fn stop(&mut self);
}

#[derive(Clone, Copy, Debug)]
struct FadeOut {
    start_frame: u64,
    frames: u64,
}

struct TrackState {
    /// Interleaved stereo samples at the output rate.
    pcm: Vec<f32>,
    /// Next sample index into `pcm`; wraps when looping.
    cursor: usize,
    /// Monotonic output frames since `play`; the fade clock. Never wraps
    /// with the loop, so the fade-in happens once per `play`.
    played_frames: u64,
    looped: bool,
    fade_in_frames: u64,
    fade_out: Option<FadeOut>,
    active: bool,
}

impl TrackState {
    fn idle() -> Self {
        Self {
            pcm: Vec::new(),
            cursor: 0,
            played_frames: 0,
            looped: false,
            fade_in_frames: 0,
            fade_out: None,
            active: false,
        }
    }
}

fn envelope_gain(played: u64, fade_in_frames: u64, fade_out: Option<FadeOut>) -> f32 {
    let mut gain = if fade_in_frames == 0 {
        1.0
    } else {
        (played as f32 / fade_in_frames as f32).clamp(0.0, 1.0)
    };
    if let Some(fade) = fade_out {
        let t = if fade.frames == 0 {
            1.0
        } else {
            (played.saturating_sub(fade.start_frame) as f32 / fade.frames as f32).clamp(0.0, 1.0)
        };
        gain *= 1.0 - t;
    }
    gain
}

/// Fill an output buffer from the track state. Runs on the audio thread:
/// no allocation, no I/O.
fn fill_output(state: &mut TrackState, data: &mut [f32], channels: usize) {
    data.fill(0.0);
    if !state.active || state.pcm.len() < 2 || channels == 0 {
        return;
    }

    for out_frame in data.chunks_exact_mut(channels) {
        if let Some(fade) = state.fade_out
            && state.played_frames >= fade.start_frame.saturating_add(fade.frames)
        {
            state.active = false;
            break;
        }
        if state.cursor + 1 >= state.pcm.len() {
            if state.looped {
                state.cursor = 0;
            } else {
                state.active = false;
                break;
            }
        }

        let gain = envelope_gain(state.played_frames, state.fade_in_frames, state.fade_out);
        out_frame[0] = state.pcm[state.cursor] * gain;
        if channels > 1 {
            out_frame[1] = state.pcm[state.cursor + 1] * gain;
        }

        state.cursor += 2;
        state.played_frames += 1;
    }
}

fn frames_for(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as u64
}

/// CPAL-backed [`AudioPlayer`].
pub struct CpalAudioPlayer {
    // Keeps the output stream (and its audio thread) alive; dropping the
    // player closes the stream.
    _stream: cpal::Stream,
    shared: Arc<Mutex<TrackState>>,
    config: AudioConfig,
}

impl CpalAudioPlayer {
    pub fn init(config: AudioConfig) -> ShowreelResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ShowreelError::audio("no audio output device found"))?;
        info!(
            device = device.name().unwrap_or_else(|_| "unknown".to_string()).as_str(),
            "using audio output device"
        );

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(Mutex::new(TrackState::idle()));
        let cb_shared = Arc::clone(&shared);
        let channels = usize::from(config.channels);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(&mut cb_shared.lock(), data, channels);
                },
                move |err| {
                    error!(error = %err, "audio output stream error");
                },
                None,
            )
            .map_err(|e| ShowreelError::audio(format!("failed to build audio stream: {e}")))?;
        stream
            .play()
            .map_err(|e| ShowreelError::audio(format!("failed to start audio stream: {e}")))?;

        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            "audio output stream built"
        );

        Ok(Self {
            _stream: stream,
            shared,
            config,
        })
    }
}

impl AudioPlayer for CpalAudioPlayer {
    fn load(&mut self, path: &Path) -> ShowreelResult<()> {
        let pcm = decode_audio_f32_stereo(path, self.config.sample_rate)?;
        if pcm.interleaved_f32.is_empty() {
            return Err(ShowreelError::audio(format!(
                "no audio samples decoded from '{}'",
                path.display()
            )));
        }

        let mut state = self.shared.lock();
        *state = TrackState::idle();
        state.pcm = pcm.interleaved_f32;
        Ok(())
    }

    fn play(&mut self, looped: bool, fade_in: Duration) -> ShowreelResult<()> {
        let mut state = self.shared.lock();
        if state.pcm.is_empty() {
            return Err(ShowreelError::audio("no track loaded"));
        }
        state.cursor = 0;
        state.played_frames = 0;
        state.looped = looped;
        state.fade_in_frames = frames_for(fade_in, self.config.sample_rate);
        state.fade_out = None;
        state.active = true;
        Ok(())
    }

    fn fade_out(&mut self, fade: Duration) {
        let mut state = self.shared.lock();
        if state.active && state.fade_out.is_none() {
            state.fade_out = Some(FadeOut {
                start_frame: state.played_frames,
                frames: frames_for(fade, self.config.sample_rate).max(1),
            });
        }
    }

    fn is_busy(&self) -> bool {
        self.shared.lock().active
    }

    fn stop(&mut self) {
        let mut state = self.shared.lock();
        state.active = false;
        state.fade_out = None;
        state.cursor = 0;
    }
}

/// Stand-in for when no audio output is available: every load fails, so the
/// sequencer plays the whole sequence silent.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudioPlayer;

impl AudioPlayer for NullAudioPlayer {
    fn load(&mut self, _path: &Path) -> ShowreelResult<()> {
        Err(ShowreelError::audio("audio subsystem unavailable"))
    }

    fn play(&mut self, _looped: bool, _fade_in: Duration) -> ShowreelResult<()> {
        Err(ShowreelError::audio("audio subsystem unavailable"))
    }

    fn fade_out(&mut self, _fade: Duration) {}

    fn is_busy(&self) -> bool {
        false
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(pcm_frames: usize) -> TrackState {
        let mut state = TrackState::idle();
        state.pcm = vec![0.5f32; pcm_frames * 2];
        state.active = true;
        state
    }

    fn drain(state: &mut TrackState, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        fill_output(state, &mut out, 2);
        out
    }

    #[test]
    fn fade_in_ramps_from_silence_to_full() {
        let mut state = state_with(100);
        state.fade_in_frames = 10;

        let out = drain(&mut state, 20);
        assert_eq!(out[0], 0.0);
        // Monotonic left-channel ramp until the fade-in completes.
        for i in 1..10 {
            assert!(out[2 * i] > out[2 * (i - 1)]);
        }
        assert!((out[2 * 10] - 0.5).abs() < 1e-6);
        assert!((out[2 * 19] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fade_out_reaches_silence_and_deactivates() {
        let mut state = state_with(1000);
        state.fade_out = Some(FadeOut {
            start_frame: 0,
            frames: 8,
        });

        let out = drain(&mut state, 16);
        assert!((out[0] - 0.5).abs() < 1e-6);
        for i in 1..8 {
            assert!(out[2 * i] < out[2 * (i - 1)]);
        }
        assert!(!state.active);
        // Everything past the fade tail is silence.
        assert!(out[2 * 9..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fade_out_only_scales_after_its_start_frame() {
        let mut state = state_with(1000);
        state.fade_out = Some(FadeOut {
            start_frame: 5,
            frames: 5,
        });

        let out = drain(&mut state, 12);
        for i in 0..5 {
            assert!((out[2 * i] - 0.5).abs() < 1e-6);
        }
        assert!(out[2 * 7] < out[2 * 5]);
        assert!(!state.active);
    }

    #[test]
    fn looped_track_wraps_without_restarting_the_fade_clock() {
        let mut state = state_with(4);
        state.looped = true;
        state.fade_in_frames = 2;

        let out = drain(&mut state, 10);
        // Past the fade-in, wrapped samples play at full gain.
        assert!((out[2 * 5] - 0.5).abs() < 1e-6);
        assert!((out[2 * 9] - 0.5).abs() < 1e-6);
        assert!(state.active);
        assert_eq!(state.played_frames, 10);
    }

    #[test]
    fn unlooped_track_ends_and_deactivates() {
        let mut state = state_with(4);
        let out = drain(&mut state, 8);
        assert!((out[2 * 3] - 0.5).abs() < 1e-6);
        assert!(out[2 * 4..].iter().all(|&s| s == 0.0));
        assert!(!state.active);
    }

    #[test]
    fn inactive_state_outputs_silence() {
        let mut state = state_with(100);
        state.active = false;
        let out = drain(&mut state, 4);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn envelope_combines_ramps() {
        assert_eq!(envelope_gain(0, 10, None), 0.0);
        assert_eq!(envelope_gain(5, 10, None), 0.5);
        assert_eq!(envelope_gain(10, 10, None), 1.0);
        assert_eq!(envelope_gain(50, 0, None), 1.0);

        let fade = Some(FadeOut {
            start_frame: 100,
            frames: 10,
        });
        assert_eq!(envelope_gain(100, 0, fade), 1.0);
        assert_eq!(envelope_gain(105, 0, fade), 0.5);
        assert_eq!(envelope_gain(110, 0, fade), 0.0);
    }
}
