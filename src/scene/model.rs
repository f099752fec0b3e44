use std::path::PathBuf;
use std::sync::Arc;

use crate::encode::ffmpeg::VideoFormat;
use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{SlidecastError, SlidecastResult};

/// Decoded PCM waveform as returned by the speech synthesizer.
///
/// Samples are interleaved `f32` in `[-1, 1]`.
#[derive(Clone, Debug)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<Vec<f32>>,
}

impl PcmAudio {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> SlidecastResult<Self> {
        if sample_rate == 0 {
            return Err(SlidecastError::validation("pcm sample_rate must be > 0"));
        }
        if channels == 0 {
            return Err(SlidecastError::validation("pcm channels must be > 0"));
        }
        if !samples.len().is_multiple_of(usize::from(channels)) {
            return Err(SlidecastError::validation(
                "pcm sample count must be a multiple of the channel count",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        })
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// One unit of the presentation. Read-only input for the duration of one
/// export pass; the compositor never mutates it.
#[derive(Clone, Debug)]
pub struct Slide {
    /// Opaque stable identifier.
    pub id: String,
    /// Encoded raster bytes (png/jpeg/...). `None` renders the letterbox
    /// background only.
    pub image: Option<Vec<u8>>,
    /// Narration text. Embedded line breaks denote caption-segment boundaries.
    pub script: String,
    /// Synthesized narration. Absence is a precondition failure for export.
    pub audio: Option<PcmAudio>,
}

impl Slide {
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: None,
            script: script.into(),
            audio: None,
        }
    }

    /// Narration duration in seconds, scaled by the playback-rate divisor.
    /// `None` until audio has been synthesized.
    pub fn duration_secs(&self, playback_rate: f64) -> Option<f64> {
        self.audio
            .as_ref()
            .map(|pcm| pcm.duration_secs() / playback_rate)
    }
}

/// Vertical placement of the burn-in subtitle panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Middle,
    Bottom,
}

/// Global subtitle style, authored against a 1080px-high reference canvas.
///
/// Resolution-independent: every consumer rescales pixel values by
/// `output_height / 1080` before use.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_size_px: f32,
    pub text_color: Rgba8,
    pub background_color: Rgba8,
    pub background_opacity: f32,
    pub position: SubtitlePosition,
    /// Display name only, carried for UIs and config round-trips. Burn-in
    /// rendering shapes with the font file from
    /// [`ExportConfig::subtitle_font`], whose primary family is resolved from
    /// the file itself.
    pub font_family: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_size_px: 48.0,
            text_color: Rgba8::opaque(255, 255, 255),
            background_color: Rgba8::opaque(0, 0, 0),
            background_opacity: 0.6,
            position: SubtitlePosition::Bottom,
            font_family: "Pretendard".to_string(),
        }
    }
}

impl SubtitleStyle {
    pub fn validate(&self) -> SlidecastResult<()> {
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(SlidecastError::validation(
                "subtitle font_size_px must be finite and > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.background_opacity) {
            return Err(SlidecastError::validation(
                "subtitle background_opacity must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Supported output resolutions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
}

impl Resolution {
    pub fn canvas(self) -> Canvas {
        match self {
            Resolution::Hd1080 => Canvas {
                width: 1920,
                height: 1080,
            },
            Resolution::Hd720 => Canvas {
                width: 1280,
                height: 720,
            },
        }
    }
}

/// Per-run export parameters.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub resolution: Resolution,
    /// Output frame rate (frames per second).
    pub fps: u32,
    /// Burn subtitles into the video frame pixels.
    pub burn_subtitles: bool,
    /// Narration playback-rate divisor; 1.0 plays audio as synthesized.
    pub playback_rate: f64,
    /// Container/codec preference order. The first runtime-supported entry
    /// wins; none supported is a pre-flight error.
    pub formats: Vec<VideoFormat>,
    /// Optional target video bitrate.
    pub video_bitrate_kbps: Option<u32>,
    /// Voice passed through to the speech synthesizer.
    pub voice_id: String,
    /// Font file used for burn-in subtitle shaping. Required when
    /// `burn_subtitles` is set.
    pub subtitle_font: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::Hd1080,
            fps: 30,
            burn_subtitles: true,
            playback_rate: 1.0,
            formats: vec![VideoFormat::Mp4H264, VideoFormat::WebmVp9],
            video_bitrate_kbps: None,
            voice_id: "Kore".to_string(),
            subtitle_font: None,
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> SlidecastResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| SlidecastError::validation(format!("invalid export config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SlidecastResult<()> {
        if self.fps == 0 {
            return Err(SlidecastError::validation("export fps must be > 0"));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(SlidecastError::validation(
                "playback_rate must be finite and > 0",
            ));
        }
        if self.formats.is_empty() {
            return Err(SlidecastError::validation(
                "at least one output format must be requested",
            ));
        }
        Ok(())
    }
}
