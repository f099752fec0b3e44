//! End-to-end export runs against an in-memory sink: synthesis, timeline
//! derivation, the clock-driven render loop and cancellation.

use std::io::Cursor;
use std::path::PathBuf;

use slidecast::{
    CancelHandle, EncoderClock, ExportConfig, ExportPhase, ExportProgress, ExportSession,
    ExportState, InMemorySink, PcmAudio, Resolution, Rgba8, Slide, SlidecastError,
    SlidecastResult, SpeechSynthesizer, SubtitlePosition, SubtitleStyle,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Deterministic synthesizer: one second of silence per 10 characters of
/// script, minimum one second.
struct StubSynth;

impl SpeechSynthesizer for StubSynth {
    fn synthesize(&mut self, text: &str, _voice_id: &str) -> SlidecastResult<PcmAudio> {
        let secs = (text.chars().count() / 10).max(1);
        PcmAudio::new(24_000, 1, vec![0.0; secs * 24_000])
    }
}

fn silence(secs: f64) -> PcmAudio {
    PcmAudio::new(24_000, 1, vec![0.0; (secs * 24_000.0) as usize]).unwrap()
}

fn uniform_png(rgba: [u8; 4], width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn config_720p() -> ExportConfig {
    ExportConfig {
        resolution: Resolution::Hd720,
        fps: 30,
        burn_subtitles: false,
        ..ExportConfig::default()
    }
}

fn center_pixel(frame: &slidecast::FrameRGBA) -> [u8; 4] {
    let idx = ((frame.height / 2) * frame.width + frame.width / 2) as usize * 4;
    frame.data[idx..idx + 4].try_into().unwrap()
}

#[test]
fn two_slide_export_switches_visuals_at_the_audio_boundary() {
    init_tracing();
    // 3s of red, then 5s of blue, both exactly 16:9 so the image fills the
    // canvas and the center pixel is the slide color.
    let mut a = Slide::new("red", "first slide");
    a.image = Some(uniform_png([255, 0, 0, 255], 192, 108));
    a.audio = Some(silence(3.0));
    let mut b = Slide::new("blue", "second slide");
    b.image = Some(uniform_png([0, 0, 255, 255], 192, 108));
    b.audio = Some(silence(5.0));

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    let stats = session
        .start_export(
            vec![a, b],
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |_| {},
        )
        .unwrap();

    assert_eq!(stats.frames_pushed, 240);
    assert!((stats.duration_secs - 8.0).abs() < 1e-9);
    assert_eq!(session.state(), ExportState::Finished);
    assert!(sink.is_finished());
    assert_eq!(sink.frames().len(), 240);

    // Frame indices are strictly increasing from zero.
    for (n, (idx, _)) in sink.frames().iter().enumerate() {
        assert_eq!(idx.0, n as u64);
    }

    // t = 1.0s is inside slide 0; t = 4.0s is inside slide 1.
    let (_, early) = &sink.frames()[30];
    assert_eq!(center_pixel(early), [255, 0, 0, 255]);
    let (_, late) = &sink.frames()[120];
    assert_eq!(center_pixel(late), [0, 0, 255, 255]);

    // The switch happens exactly at frame 90 (3.0s at 30fps).
    let (_, before) = &sink.frames()[89];
    assert_eq!(center_pixel(before), [255, 0, 0, 255]);
    let (_, at) = &sink.frames()[90];
    assert_eq!(center_pixel(at), [0, 0, 255, 255]);

    // The muxed audio track covers the whole timeline.
    let audio = sink.config().unwrap().audio.clone().unwrap();
    assert_eq!(audio.sample_rate, 48_000);
    assert_eq!(audio.channels, 2);
}

#[test]
fn square_image_is_letterboxed_with_black_bars() {
    init_tracing();
    let mut slide = Slide::new("square", "s");
    slide.image = Some(uniform_png([0, 255, 0, 255], 100, 100));
    slide.audio = Some(silence(1.0));

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    session
        .start_export(
            vec![slide],
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |_| {},
        )
        .unwrap();

    // A 1:1 image on a 16:9 canvas scales to 720x720 centered at x=280..1000.
    let (_, frame) = &sink.frames()[0];
    assert_eq!(center_pixel(frame), [0, 255, 0, 255]);
    let left_bar = ((frame.height / 2) * frame.width + 10) as usize * 4;
    assert_eq!(&frame.data[left_bar..left_bar + 4], &[0, 0, 0, 255]);
}

#[test]
fn undecodable_image_renders_background_for_the_full_duration() {
    init_tracing();
    let mut slide = Slide::new("broken", "narration still plays");
    slide.image = Some(b"not an image at all".to_vec());
    slide.audio = Some(silence(1.0));

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    let stats = session
        .start_export(
            vec![slide],
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |_| {},
        )
        .unwrap();

    // The slide keeps its audio-derived slot; every frame is the background.
    assert_eq!(stats.frames_pushed, 30);
    for (_, frame) in sink.frames() {
        assert_eq!(center_pixel(frame), [0, 0, 0, 255]);
    }
}

#[test]
fn missing_audio_cannot_happen_after_preparation_synthesizes_it() {
    init_tracing();
    // No pre-attached audio: the preparing phase fills it in via the
    // synthesizer, so the timeline build cannot fail on missing audio.
    let slides = vec![
        Slide::new("a", "0123456789012345678901234567890"),
        Slide::new("b", "short"),
    ];

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    let stats = session
        .start_export(
            slides,
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |_| {},
        )
        .unwrap();

    // 31 chars -> 3s, 5 chars -> 1s.
    assert!((stats.duration_secs - 4.0).abs() < 1e-9);
    assert_eq!(stats.frames_pushed, 120);
}

#[test]
fn progress_reports_preparing_then_recording_with_one_based_indices() {
    init_tracing();
    let slides = vec![Slide::new("a", "first text"), Slide::new("b", "second")];

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    let mut reports: Vec<ExportProgress> = Vec::new();
    session
        .start_export(
            slides,
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |p| reports.push(p),
        )
        .unwrap();

    let preparing: Vec<usize> = reports
        .iter()
        .filter(|p| p.phase == ExportPhase::Preparing)
        .map(|p| p.slide_index)
        .collect();
    let recording: Vec<usize> = reports
        .iter()
        .filter(|p| p.phase == ExportPhase::Recording)
        .map(|p| p.slide_index)
        .collect();

    assert_eq!(preparing, vec![1, 2]);
    assert_eq!(recording, vec![1, 2]);
    assert!(reports.iter().all(|p| p.total_slides == 2));
    // All preparing reports precede all recording reports.
    let first_recording = reports
        .iter()
        .position(|p| p.phase == ExportPhase::Recording)
        .unwrap();
    assert!(reports[..first_recording]
        .iter()
        .all(|p| p.phase == ExportPhase::Preparing));
}

#[test]
fn cancelling_mid_recording_discards_partial_output() {
    init_tracing();
    let mut a = Slide::new("a", "first");
    a.audio = Some(silence(2.0));
    let mut b = Slide::new("b", "second");
    b.audio = Some(silence(2.0));

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let handle: CancelHandle = session.cancel_handle();
    let mut sink = InMemorySink::new();
    let err = session
        .start_export(
            vec![a, b],
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |p| {
                // Cancel as soon as recording starts; the loop notices before
                // pushing the first frame.
                if p.phase == ExportPhase::Recording {
                    handle.cancel();
                }
            },
        )
        .unwrap_err();

    assert!(matches!(err, SlidecastError::Cancelled));
    assert_eq!(session.state(), ExportState::Idle);
    assert!(sink.is_aborted());
    assert!(sink.frames().is_empty());
}

fn band_has(frame: &slidecast::FrameRGBA, y0: u32, y1: u32, pred: impl Fn([u8; 4]) -> bool) -> bool {
    for y in y0..y1 {
        for x in 0..frame.width {
            let idx = (y * frame.width + x) as usize * 4;
            if pred(frame.data[idx..idx + 4].try_into().unwrap()) {
                return true;
            }
        }
    }
    false
}

#[test]
fn burned_subtitles_draw_panel_and_glyphs_in_the_bottom_band() {
    init_tracing();
    let mut slide = Slide::new("captioned", "HELLO WORLD");
    slide.audio = Some(silence(1.0));

    // White panel with red text over the black background so panel fill and
    // glyph coverage are separable in the output pixels.
    let style = SubtitleStyle {
        background_color: Rgba8::opaque(255, 255, 255),
        background_opacity: 1.0,
        text_color: Rgba8::opaque(255, 0, 0),
        position: SubtitlePosition::Bottom,
        ..SubtitleStyle::default()
    };
    let config = ExportConfig {
        burn_subtitles: true,
        subtitle_font: Some(PathBuf::from("tests/data/fonts/DejaVuSans.ttf")),
        ..config_720p()
    };

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    session
        .start_export(vec![slide], &style, &config, &mut sink, &mut |_| {})
        .unwrap();

    let (_, frame) = &sink.frames()[0];
    // The area above the panel stays background-only.
    assert_eq!(center_pixel(frame), [0, 0, 0, 255]);

    // Bottom band: the panel is centered 100px (1080-scaled) above the edge.
    let white = |p: [u8; 4]| p == [255, 255, 255, 255];
    let red = |p: [u8; 4]| p[0] >= 200 && p[1] <= 80 && p[2] <= 80;
    assert!(band_has(frame, 600, 720, white));
    assert!(band_has(frame, 600, 720, red));
    assert!(!band_has(frame, 0, 300, white));
}

#[test]
fn subtitle_position_top_moves_the_panel_to_the_top_band() {
    init_tracing();
    let mut slide = Slide::new("captioned", "HELLO WORLD");
    slide.audio = Some(silence(1.0));

    let style = SubtitleStyle {
        background_color: Rgba8::opaque(255, 255, 255),
        background_opacity: 1.0,
        position: SubtitlePosition::Top,
        ..SubtitleStyle::default()
    };
    let config = ExportConfig {
        burn_subtitles: true,
        subtitle_font: Some(PathBuf::from("tests/data/fonts/DejaVuSans.ttf")),
        ..config_720p()
    };

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    session
        .start_export(vec![slide], &style, &config, &mut sink, &mut |_| {})
        .unwrap();

    let (_, frame) = &sink.frames()[0];
    let white = |p: [u8; 4]| p == [255, 255, 255, 255];
    assert!(band_has(frame, 0, 150, white));
    assert!(!band_has(frame, 500, 720, white));
}

#[test]
fn caption_segments_switch_with_the_narration_windows() {
    init_tracing();
    // Two equally weighted lines over 2s: the active caption changes at 1s.
    // Distinct panel colors are not observable, but glyph coverage differs
    // between "iiii" (sparse) and "WWWW" (dense), so compare red pixel counts.
    let mut slide = Slide::new("two-lines", "iiii\nWWWW");
    slide.audio = Some(silence(2.0));

    let style = SubtitleStyle {
        background_color: Rgba8::opaque(255, 255, 255),
        background_opacity: 1.0,
        text_color: Rgba8::opaque(255, 0, 0),
        ..SubtitleStyle::default()
    };
    let config = ExportConfig {
        burn_subtitles: true,
        subtitle_font: Some(PathBuf::from("tests/data/fonts/DejaVuSans.ttf")),
        ..config_720p()
    };

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    session
        .start_export(vec![slide], &style, &config, &mut sink, &mut |_| {})
        .unwrap();

    let red_count = |frame: &slidecast::FrameRGBA| {
        frame
            .data
            .chunks_exact(4)
            .filter(|p| p[0] >= 200 && p[1] <= 80 && p[2] <= 80)
            .count()
    };
    let (_, first_half) = &sink.frames()[15];
    let (_, second_half) = &sink.frames()[45];
    assert!(red_count(first_half) > 0);
    // "WWWW" covers noticeably more pixels than "iiii" at the same size.
    assert!(red_count(second_half) > red_count(first_half));
}

#[test]
fn preparing_progress_covers_slides_with_pre_synthesized_audio() {
    init_tracing();
    // Slide "a" already carries audio; the preparing sweep must still report
    // it so indices stay contiguous.
    let mut a = Slide::new("a", "already synthesized");
    a.audio = Some(silence(1.0));
    let b = Slide::new("b", "needs synthesis");

    let mut session = ExportSession::new(StubSynth, Box::new(EncoderClock::new()));
    let mut sink = InMemorySink::new();
    let mut preparing: Vec<usize> = Vec::new();
    session
        .start_export(
            vec![a, b],
            &SubtitleStyle::default(),
            &config_720p(),
            &mut sink,
            &mut |p| {
                if p.phase == ExportPhase::Preparing {
                    preparing.push(p.slide_index);
                }
            },
        )
        .unwrap();

    assert_eq!(preparing, vec![1, 2]);
}
