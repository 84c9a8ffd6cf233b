//! Media probing and decoding via the system `ffprobe`/`ffmpeg` binaries.
//!
//! We intentionally shell out to the system tools rather than link FFmpeg to
//! avoid native dev header/lib requirements. Video frames stream out of a
//! long-lived child process as raw rgb24 over a pipe; audio tracks decode in
//! one shot to interleaved f32 PCM.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{ShowreelError, ShowreelResult};

/// Static stream properties reported by `ffprobe`.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
    pub frame_count: Option<u64>,
}

impl VideoSourceInfo {
    pub fn frame_rate(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    /// Container-reported frame count when available, otherwise an estimate
    /// from duration and rate. Only needs frame-scale accuracy: it feeds the
    /// fade-out threshold, not seeking.
    pub fn estimated_frames(&self) -> u64 {
        if let Some(n) = self.frame_count {
            return n;
        }
        (self.duration_sec * self.frame_rate()).round().max(0.0) as u64
    }
}

/// One decoded frame as tightly packed rgb24 rows.
#[derive(Clone, Debug)]
pub struct FrameRgb {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// An open, forward-only decoded video stream.
pub trait VideoSource {
    fn frame_rate(&self) -> f64;
    fn frame_size(&self) -> (u32, u32);
    /// Total frames in the stream (possibly estimated).
    fn total_frames(&self) -> u64;
    /// Frames already yielded by [`next_frame`](Self::next_frame).
    fn position(&self) -> u64;
    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> ShowreelResult<Option<FrameRgb>>;
}

/// Capability to open a video file for decoding.
pub trait VideoOpener {
    fn open(&self, path: &Path) -> ShowreelResult<Box<dyn VideoSource>>;
}

fn tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

pub fn probe_video(source_path: &Path) -> ShowreelResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| ShowreelError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ShowreelError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ShowreelError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            ShowreelError::media(format!("no video stream in '{}'", source_path.display()))
        })?;
    let width = video_stream
        .width
        .ok_or_else(|| ShowreelError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| ShowreelError::media("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| ShowreelError::media("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0);

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
        frame_count,
    })
}

/// Opens clips by probing them and spawning a decoding `ffmpeg` child.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegVideoOpener;

impl VideoOpener for FfmpegVideoOpener {
    fn open(&self, path: &Path) -> ShowreelResult<Box<dyn VideoSource>> {
        let info = probe_video(path)?;
        Ok(Box::new(FfmpegVideoSource::spawn(info)?))
    }
}

/// A spawned `ffmpeg` child streaming rgb24 rawvideo frames over stdout.
pub struct FfmpegVideoSource {
    info: VideoSourceInfo,
    total_frames: u64,
    frame_len: usize,
    frames_read: u64,
    finished: bool,
    child: Child,
    stdout: ChildStdout,
}

impl FfmpegVideoSource {
    pub fn spawn(info: VideoSourceInfo) -> ShowreelResult<Self> {
        let frame_len = info.width as usize * info.height as usize * 3;
        if frame_len == 0 {
            return Err(ShowreelError::media(format!(
                "invalid source dimensions {}x{} for '{}'",
                info.width,
                info.height,
                info.source_path.display()
            )));
        }

        // stderr goes to the void: with -v error it stays quiet, and piping
        // it without a drain could wedge the child on a full pipe.
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&info.source_path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-an", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ShowreelError::media(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShowreelError::media("failed to open ffmpeg stdout (unexpected)"))?;

        debug!(
            source = %info.source_path.display(),
            width = info.width,
            height = info.height,
            "started video decode"
        );

        Ok(Self {
            total_frames: info.estimated_frames(),
            frame_len,
            frames_read: 0,
            finished: false,
            info,
            child,
            stdout,
        })
    }

    fn reap(&mut self) {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if !status.success() => {
                warn!(
                    source = %self.info.source_path.display(),
                    %status,
                    "ffmpeg decoder exited abnormally"
                );
            }
            Ok(_) => {}
            Err(e) => warn!("failed to reap ffmpeg decoder: {e}"),
        }
    }
}

impl VideoSource for FfmpegVideoSource {
    fn frame_rate(&self) -> f64 {
        self.info.frame_rate()
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.frames_read
    }

    fn next_frame(&mut self) -> ShowreelResult<Option<FrameRgb>> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(Some(FrameRgb {
                    width: self.info.width,
                    height: self.info.height,
                    data,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.reap();
                Ok(None)
            }
            Err(e) => {
                self.reap();
                Err(ShowreelError::media(format!(
                    "reading decoded frame from '{}': {e}",
                    self.info.source_path.display()
                )))
            }
        }
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// A whole audio track decoded to interleaved stereo f32 at `sample_rate`.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> ShowreelResult<AudioPcm> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| ShowreelError::media(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a source without any audio stream as an error;
        // surface that as empty PCM and let the caller decide.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate,
                channels: 2,
                interleaved_f32: Vec::new(),
            });
        }
        return Err(ShowreelError::media(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if out.stdout.len() % 4 != 0 {
        return Err(ShowreelError::media(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: pcm,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}
