//! Streaming encoder backed by the system `ffmpeg` binary.
//!
//! Raw premultiplied RGBA8 frames are flattened over an opaque background and
//! piped to stdin; the scheduled narration track is supplied as an `f32le`
//! side input. Using the system binary avoids native FFmpeg dev header/lib
//! requirements.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{mul_div255_u16, Fps, FrameIndex};
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::render::FrameRGBA;

/// Supported container/codec combinations, in the order the original export
/// path probes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    /// H.264 + AAC in MP4.
    Mp4H264,
    /// VP9 + Opus in WebM.
    WebmVp9,
}

impl VideoFormat {
    pub fn video_encoder(self) -> &'static str {
        match self {
            VideoFormat::Mp4H264 => "libx264",
            VideoFormat::WebmVp9 => "libvpx-vp9",
        }
    }

    pub fn audio_encoder(self) -> &'static str {
        match self {
            VideoFormat::Mp4H264 => "aac",
            VideoFormat::WebmVp9 => "libopus",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Mp4H264 => "mp4",
            VideoFormat::WebmVp9 => "webm",
        }
    }
}

/// Options for [`FfmpegSink`] output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output file path. The extension is replaced to match the selected
    /// format.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Container/codec preference order. The first combination the runtime
    /// ffmpeg supports wins; none supported fails `begin` before any frame is
    /// rendered.
    pub formats: Vec<VideoFormat>,
    /// Optional target video bitrate.
    pub video_bitrate_kbps: Option<u32>,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
            formats: vec![VideoFormat::Mp4H264, VideoFormat::WebmVp9],
            video_bitrate_kbps: None,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to stdin.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    final_path: Option<PathBuf>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            final_path: None,
            last_idx: None,
        }
    }

    /// The resolved output path (extension matches the selected format).
    /// Available after `begin`.
    pub fn output_path(&self) -> Option<&Path> {
        self.final_path.as_deref()
    }

    fn discard_partial_output(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        if let Some(path) = self.final_path.take() {
            let _ = std::fs::remove_file(&path);
        }
        self.cfg = None;
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> SlidecastResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(SlidecastError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(SlidecastError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(SlidecastError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p output)",
            ));
        }

        if !is_ffmpeg_on_path() {
            return Err(SlidecastError::encode(
                "ffmpeg is required for encoding, but was not found on PATH",
            ));
        }

        // Codec support is resolved before anything is recorded; discovering
        // an unsupported combination mid-stream is not acceptable.
        let format = pick_format(&self.opts.formats, &probe_encoders()?)?;
        let out_path = self.opts.out_path.with_extension(format.extension());
        tracing::debug!(?format, out = %out_path.display(), "ffmpeg sink selected output format");

        ensure_parent_dir(&out_path)?;
        if !self.opts.overwrite && out_path.exists() {
            return Err(SlidecastError::validation(format!(
                "output file '{}' already exists",
                out_path.display()
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if self.opts.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        // Input: raw RGBA8 frames, already flattened to opaque in push_frame.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);

        if let Some(audio) = cfg.audio.as_ref() {
            if audio.sample_rate == 0 {
                return Err(SlidecastError::validation(
                    "audio sample_rate must be non-zero when audio is enabled",
                ));
            }
            if audio.channels == 0 {
                return Err(SlidecastError::validation(
                    "audio channels must be non-zero when audio is enabled",
                ));
            }
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args([
                "-c:v",
                format.video_encoder(),
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                format.audio_encoder(),
                "-shortest",
            ]);
        } else {
            cmd.args(["-an", "-c:v", format.video_encoder(), "-pix_fmt", "yuv420p"]);
        }
        if let Some(kbps) = self.opts.video_bitrate_kbps {
            cmd.args(["-b:v", &format!("{kbps}k")]);
        }
        if format == VideoFormat::Mp4H264 {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg(&out_path);

        let mut child = cmd.spawn().map_err(|e| {
            SlidecastError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlidecastError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SlidecastError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.final_path = Some(out_path);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> SlidecastResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| SlidecastError::encode("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(SlidecastError::encode(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(SlidecastError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(SlidecastError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.opts.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SlidecastError::encode("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            SlidecastError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> SlidecastResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| SlidecastError::encode("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            SlidecastError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SlidecastError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| SlidecastError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(SlidecastError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.cfg = None;
        Ok(())
    }

    fn abort(&mut self) {
        tracing::debug!("ffmpeg sink aborted, discarding partial output");
        self.discard_partial_output();
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // A sink dropped while recording never leaves a half-written file
        // behind.
        if self.child.is_some() {
            self.discard_partial_output();
        }
    }
}

/// Pick the first preferred format whose video and audio encoders both appear
/// in `ffmpeg -encoders` output.
pub(crate) fn pick_format(
    prefs: &[VideoFormat],
    encoders_output: &str,
) -> SlidecastResult<VideoFormat> {
    for &format in prefs {
        if encoders_output.contains(format.video_encoder())
            && encoders_output.contains(format.audio_encoder())
        {
            return Ok(format);
        }
    }
    let wanted: Vec<&str> = prefs.iter().map(|f| f.video_encoder()).collect();
    Err(SlidecastError::encoder_unsupported(format!(
        "ffmpeg supports none of the requested codecs: {}",
        wanted.join(", ")
    )))
}

fn probe_encoders() -> SlidecastResult<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| SlidecastError::encode(format!("failed to probe ffmpeg encoders: {e}")))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate. Rational
    // FPS is passed as `num/den`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Flatten RGBA8 (premultiplied or straight) over an opaque background.
fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> SlidecastResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(SlidecastError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255_u16(bg_r, inv),
                s[1] as u16 + mul_div255_u16(bg_g, inv),
                s[2] as u16 + mul_div255_u16(bg_b, inv),
            )
        } else {
            (
                mul_div255_u16(s[0] as u16, a) + mul_div255_u16(bg_r, inv),
                mul_div255_u16(s[1] as u16, a) + mul_div255_u16(bg_g, inv),
                mul_div255_u16(s[2] as u16, a) + mul_div255_u16(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
fn ensure_parent_dir(path: &Path) -> SlidecastResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
