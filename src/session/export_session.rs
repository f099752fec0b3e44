//! Export orchestration: sequential narration synthesis followed by the
//! clock-driven render/encode loop.
//!
//! One session owns one export at a time. The loop is cooperative: it renders
//! one frame per clock tick, checks the cancel flag between frames, and pushes
//! frames to the sink in strictly increasing order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::assets::decode::decode_image;
use crate::audio::track::{build_export_track, write_f32le_file, EXPORT_CHANNELS, EXPORT_SAMPLE_RATE};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::render::compositor::{FrameCompositor, SlideImage};
use crate::scene::model::{ExportConfig, Slide, SubtitleStyle};
use crate::session::clock::PlaybackClock;
use crate::subtitle::segment::{active_segment, segments_for, Segment};
use crate::synth::SpeechSynthesizer;
use crate::timeline::build_timeline;

/// Coarse lifecycle of a session, observable between exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    /// No export running. Also the state after a failed or cancelled export.
    Idle,
    /// Synthesizing missing narration audio, slide by slide.
    Preparing,
    /// Rendering and encoding frames.
    Recording,
    /// The last export completed successfully.
    Finished,
}

/// Which phase a progress report belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportPhase {
    Preparing,
    Recording,
}

/// One progress report. `slide_index` is 1-based for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportProgress {
    pub phase: ExportPhase,
    pub slide_index: usize,
    pub total_slides: usize,
}

/// Summary of a completed export.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExportStats {
    pub frames_pushed: u64,
    pub duration_secs: f64,
    pub slides: usize,
}

/// Shared cancellation flag. Cloning hands the flag to another thread; any
/// clone can request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Drives one export end to end against injected collaborators.
pub struct ExportSession<S: SpeechSynthesizer> {
    synth: S,
    clock: Box<dyn PlaybackClock>,
    state: ExportState,
    cancel: CancelHandle,
}

impl<S: SpeechSynthesizer> ExportSession<S> {
    pub fn new(synth: S, clock: Box<dyn PlaybackClock>) -> Self {
        Self {
            synth,
            clock,
            state: ExportState::Idle,
            cancel: CancelHandle::new(),
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Handle for cancelling the running export from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one export to completion.
    ///
    /// Slides without audio are synthesized first, in order. Any error or
    /// cancellation discards partial sink output and returns the session to
    /// `Idle`; on success the state is `Finished`.
    pub fn start_export(
        &mut self,
        slides: Vec<Slide>,
        style: &SubtitleStyle,
        config: &ExportConfig,
        sink: &mut dyn FrameSink,
        on_progress: &mut dyn FnMut(ExportProgress),
    ) -> SlidecastResult<ExportStats> {
        self.cancel.reset();
        match self.run_export(slides, style, config, sink, on_progress) {
            Ok(stats) => {
                self.state = ExportState::Finished;
                Ok(stats)
            }
            Err(err) => {
                self.state = ExportState::Idle;
                sink.abort();
                Err(err)
            }
        }
    }

    fn run_export(
        &mut self,
        mut slides: Vec<Slide>,
        style: &SubtitleStyle,
        config: &ExportConfig,
        sink: &mut dyn FrameSink,
        on_progress: &mut dyn FnMut(ExportProgress),
    ) -> SlidecastResult<ExportStats> {
        config.validate()?;
        style.validate()?;
        if slides.is_empty() {
            return Err(SlidecastError::validation(
                "export requires at least one slide",
            ));
        }

        let total_slides = slides.len();

        // Phase 1: synthesize narration for slides that lack it.
        self.state = ExportState::Preparing;
        for (i, slide) in slides.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SlidecastError::Cancelled);
            }
            // One report per slide even when its audio is already present, so
            // observers see a contiguous 1..=n sweep.
            on_progress(ExportProgress {
                phase: ExportPhase::Preparing,
                slide_index: i + 1,
                total_slides,
            });
            if slide.audio.is_some() {
                continue;
            }
            tracing::debug!(slide = %slide.id, "synthesizing narration");
            let pcm = self.synth.synthesize(&slide.script, &config.voice_id)?;
            slide.audio = Some(pcm);
        }

        let timeline = build_timeline(&slides, config.playback_rate)?;

        // The scheduled narration track is written once, up front; the sink
        // muxes it against the frame stream.
        let track = build_export_track(
            &slides,
            &timeline,
            config.playback_rate,
            EXPORT_SAMPLE_RATE,
            EXPORT_CHANNELS,
        )?;
        let audio_path = temp_track_path();
        write_f32le_file(&track.samples, &audio_path)?;
        let _audio_tmp = TempFileGuard(Some(audio_path.clone()));

        let canvas = config.resolution.canvas();
        let font_bytes = if config.burn_subtitles {
            let path = config.subtitle_font.as_ref().ok_or_else(|| {
                SlidecastError::validation(
                    "burn_subtitles requires a subtitle_font file in the export config",
                )
            })?;
            Some(std::fs::read(path).map_err(|e| {
                SlidecastError::validation(format!(
                    "failed to read subtitle font '{}': {e}",
                    path.display()
                ))
            })?)
        } else {
            None
        };
        let mut compositor = FrameCompositor::new(canvas, font_bytes)?;

        let fps = Fps::new(config.fps, 1)?;
        sink.begin(SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps,
            audio: Some(AudioInputConfig {
                path: audio_path,
                sample_rate: track.sample_rate,
                channels: track.channels,
            }),
        })?;

        // Phase 2: the render loop.
        self.state = ExportState::Recording;
        let frame_dur = fps.frame_duration_secs();
        let total_frames = fps.secs_to_frames_floor(timeline.total_secs());

        let mut slide_idx = 0usize;
        let mut slide_start = self.clock.now_secs();
        let mut visual = self.load_slide_visual(&mut compositor, &slides[0]);
        let mut segments = self.slide_segments(config, &slides[0]);
        on_progress(ExportProgress {
            phase: ExportPhase::Recording,
            slide_index: 1,
            total_slides,
        });

        let mut frames_pushed = 0u64;
        for n in 0..total_frames {
            if self.cancel.is_cancelled() {
                return Err(SlidecastError::Cancelled);
            }

            let mut elapsed = self.clock.now_secs() - slide_start;
            while slide_idx + 1 < slides.len()
                && elapsed >= timeline.entries()[slide_idx].duration_secs
            {
                slide_idx += 1;
                // The new slide's elapsed time restarts at the clock's current
                // value, not at an idealized boundary.
                slide_start = self.clock.now_secs();
                elapsed = 0.0;
                visual = self.load_slide_visual(&mut compositor, &slides[slide_idx]);
                segments = self.slide_segments(config, &slides[slide_idx]);
                on_progress(ExportProgress {
                    phase: ExportPhase::Recording,
                    slide_index: slide_idx + 1,
                    total_slides,
                });
            }

            let active_line = if config.burn_subtitles {
                active_segment(
                    &segments,
                    elapsed,
                    timeline.entries()[slide_idx].duration_secs,
                )
            } else {
                None
            };

            let frame = compositor.render_frame(visual.as_ref(), active_line, style)?;
            sink.push_frame(FrameIndex(n), &frame)?;
            frames_pushed += 1;
            self.clock.tick(frame_dur);
        }

        sink.end()?;
        tracing::info!(
            frames = frames_pushed,
            duration_secs = timeline.total_secs(),
            slides = total_slides,
            "export finished"
        );

        Ok(ExportStats {
            frames_pushed,
            duration_secs: timeline.total_secs(),
            slides: total_slides,
        })
    }

    /// Decode and upload one slide's raster. Decode failures are not fatal:
    /// the slide renders as letterbox background for its full duration.
    fn load_slide_visual(
        &self,
        compositor: &mut FrameCompositor,
        slide: &Slide,
    ) -> Option<SlideImage> {
        let bytes = slide.image.as_deref()?;
        match decode_image(bytes).and_then(|img| compositor.prepare_image(&img)) {
            Ok(visual) => Some(visual),
            Err(err) => {
                tracing::warn!(slide = %slide.id, %err, "slide image unusable, rendering background only");
                None
            }
        }
    }

    fn slide_segments(&self, config: &ExportConfig, slide: &Slide) -> Vec<Segment> {
        if config.burn_subtitles {
            segments_for(&slide.script)
        } else {
            Vec::new()
        }
    }
}

fn temp_track_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "slidecast_track_{}_{}.f32le",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::InMemorySink;
    use crate::scene::model::PcmAudio;
    use crate::session::clock::EncoderClock;

    struct NoopSynth;

    impl SpeechSynthesizer for NoopSynth {
        fn synthesize(&mut self, _text: &str, _voice_id: &str) -> SlidecastResult<PcmAudio> {
            PcmAudio::new(24_000, 1, vec![0.0; 24_000])
        }
    }

    fn session() -> ExportSession<NoopSynth> {
        ExportSession::new(NoopSynth, Box::new(EncoderClock::new()))
    }

    fn config() -> ExportConfig {
        ExportConfig {
            burn_subtitles: false,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn empty_slide_deck_is_rejected() {
        let mut s = session();
        let mut sink = InMemorySink::new();
        let err = s
            .start_export(
                Vec::new(),
                &SubtitleStyle::default(),
                &config(),
                &mut sink,
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Validation(_)));
        assert_eq!(s.state(), ExportState::Idle);
    }

    #[test]
    fn burn_subtitles_without_font_fails_before_recording() {
        let mut s = session();
        let mut sink = InMemorySink::new();
        let cfg = ExportConfig {
            burn_subtitles: true,
            subtitle_font: None,
            ..ExportConfig::default()
        };
        let err = s
            .start_export(
                vec![Slide::new("a", "text")],
                &SubtitleStyle::default(),
                &cfg,
                &mut sink,
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Validation(_)));
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn pre_cancelled_handle_has_no_effect_on_next_export() {
        let mut s = session();
        s.cancel_handle().cancel();
        // start_export resets the flag; the export must run to completion.
        let mut sink = InMemorySink::new();
        let stats = s
            .start_export(
                vec![Slide::new("a", "text")],
                &SubtitleStyle::default(),
                &config(),
                &mut sink,
                &mut |_| {},
            )
            .unwrap();
        assert!(stats.frames_pushed > 0);
        assert_eq!(s.state(), ExportState::Finished);
    }

    #[test]
    fn cancellation_during_preparing_discards_output() {
        struct CancellingSynth(CancelHandle);
        impl SpeechSynthesizer for CancellingSynth {
            fn synthesize(&mut self, _t: &str, _v: &str) -> SlidecastResult<PcmAudio> {
                self.0.cancel();
                PcmAudio::new(24_000, 1, vec![0.0; 24_000])
            }
        }

        let handle = CancelHandle::new();
        let mut s = ExportSession::new(
            CancellingSynth(handle.clone()),
            Box::new(EncoderClock::new()),
        );
        // The session resets its own handle, so wire the shared one in.
        s.cancel = handle;
        let mut sink = InMemorySink::new();
        let err = s
            .run_export(
                vec![Slide::new("a", "one"), Slide::new("b", "two")],
                &SubtitleStyle::default(),
                &config(),
                &mut sink,
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Cancelled));
    }
}
