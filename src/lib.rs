//! Slidecast turns an ordered set of (slide image, narration script, synthesized
//! speech waveform) triples plus a subtitle style into a single continuous
//! audio/video artifact.
//!
//! The pipeline is deliberately small and deterministic:
//!
//! - [`timeline::build_timeline`] derives the master timeline from per-slide
//!   audio durations
//! - [`subtitle`] allocates narration text to time windows with a
//!   character-proportional heuristic
//! - [`render::FrameCompositor`] draws letterboxed slides and burn-in subtitle
//!   panels into premultiplied RGBA8 frames
//! - [`session::ExportSession`] drives the cooperative render loop against a
//!   single injected [`session::PlaybackClock`] so audio scheduling and slide
//!   switching can never diverge
//! - [`encode::FfmpegSink`] streams frames plus the scheduled PCM track into
//!   the system `ffmpeg`
#![forbid(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod encode;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod session;
pub mod subtitle;
pub mod synth;
pub mod text;
pub mod timeline;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{SlidecastError, SlidecastResult};

pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, VideoFormat};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::render::compositor::FrameCompositor;
pub use crate::render::FrameRGBA;
pub use crate::scene::model::{
    ExportConfig, PcmAudio, Resolution, Slide, SubtitlePosition, SubtitleStyle,
};
pub use crate::session::clock::{EncoderClock, PlaybackClock};
pub use crate::session::export_session::{
    CancelHandle, ExportPhase, ExportProgress, ExportSession, ExportState, ExportStats,
};
pub use crate::synth::{ScriptGenerator, ScriptLength, SpeechSynthesizer};
pub use crate::timeline::{build_timeline, Timeline, TimelineEntry};
