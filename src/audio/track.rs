//! Export audio scheduling: every slide's narration is placed back-to-back at
//! its absolute timeline offset, up front, before recording starts. The render
//! loop derives slide switching from the same timeline, so audio can never
//! drift from video by more than one frame of boundary rounding.

use std::path::Path;

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::scene::model::Slide;
use crate::timeline::Timeline;

/// Output sample rate of the scheduled narration track.
pub const EXPORT_SAMPLE_RATE: u32 = 48_000;
/// Output channel count of the scheduled narration track.
pub const EXPORT_CHANNELS: u16 = 2;

/// The fully scheduled narration track for one export run.
#[derive(Clone, Debug)]
pub struct ExportTrack {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples covering the whole timeline, silence-padded.
    pub samples: Vec<f32>,
}

impl ExportTrack {
    pub fn sample_frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }
}

/// Schedule each slide's PCM at its timeline offset into one interleaved
/// track.
///
/// Sources are resampled by linear interpolation to `sample_rate` and sped up
/// by `playback_rate` (the same divisor that scaled the timeline durations,
/// so each slide's audio ends exactly at its slot boundary). Mono sources are
/// duplicated across output channels.
pub fn build_export_track(
    slides: &[Slide],
    timeline: &Timeline,
    playback_rate: f64,
    sample_rate: u32,
    channels: u16,
) -> SlidecastResult<ExportTrack> {
    if sample_rate == 0 || channels == 0 {
        return Err(SlidecastError::validation(
            "export track sample_rate/channels must be non-zero",
        ));
    }

    let total_frames = (timeline.total_secs() * f64::from(sample_rate)).round() as u64;
    let mut out = vec![0.0f32; total_frames as usize * usize::from(channels)];

    for entry in timeline.entries() {
        let slide = &slides[entry.slide_index];
        let pcm = slide.audio.as_ref().ok_or(SlidecastError::MissingAudio {
            index: entry.slide_index,
        })?;
        let src = pcm.samples.as_ref();
        let src_frames = src.len() / usize::from(pcm.channels);
        if src_frames == 0 {
            continue;
        }

        let start_sample = (entry.start_secs * f64::from(sample_rate)).round() as u64;
        let end_sample = (((entry.start_secs + entry.duration_secs) * f64::from(sample_rate))
            .round() as u64)
            .min(total_frames);

        for dst_sample in start_sample..end_sample {
            let rel_sec = (dst_sample - start_sample) as f64 / f64::from(sample_rate);
            let src_pos = rel_sec * playback_rate * f64::from(pcm.sample_rate);
            if !src_pos.is_finite() || src_pos < 0.0 {
                break;
            }
            let src_frame0 = src_pos.floor() as usize;
            if src_frame0 >= src_frames {
                break;
            }
            let src_frame1 = (src_frame0 + 1).min(src_frames - 1);
            let frac = (src_pos - src_frame0 as f64) as f32;

            let (l, r) = if pcm.channels == 1 {
                let v0 = src[src_frame0];
                let v1 = src[src_frame1];
                let v = v0 + (v1 - v0) * frac;
                (v, v)
            } else {
                let i0 = src_frame0 * usize::from(pcm.channels);
                let i1 = src_frame1 * usize::from(pcm.channels);
                let l0 = src[i0];
                let l1 = src[i1];
                let r0 = src[i0 + 1];
                let r1 = src[i1 + 1];
                (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
            };

            let dst_idx = dst_sample as usize * usize::from(channels);
            out[dst_idx] += l;
            if channels > 1 {
                out[dst_idx + 1] += r;
            }
        }
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }

    Ok(ExportTrack {
        sample_rate,
        channels,
        samples: out,
    })
}

/// Write interleaved `f32` samples as raw little-endian `.f32le`, the side
/// input format the ffmpeg sink consumes.
pub fn write_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> SlidecastResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            SlidecastError::encode(format!(
                "failed to create audio track output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        SlidecastError::encode(format!(
            "failed to write audio track file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::model::{PcmAudio, Slide};
    use crate::timeline::build_timeline;

    fn slide_with_constant(id: &str, secs: f64, value: f32) -> Slide {
        let mut slide = Slide::new(id, "script");
        let frames = (secs * 48_000.0).round() as usize;
        slide.audio = Some(PcmAudio::new(48_000, 1, vec![value; frames]).unwrap());
        slide
    }

    #[test]
    fn slides_are_scheduled_back_to_back() {
        let slides = vec![
            slide_with_constant("a", 1.0, 0.25),
            slide_with_constant("b", 0.5, -0.5),
        ];
        let tl = build_timeline(&slides, 1.0).unwrap();
        let track = build_export_track(&slides, &tl, 1.0, 48_000, 2).unwrap();

        assert_eq!(track.sample_frames(), 72_000);
        // Mid-slide samples carry each slide's value on both channels.
        let mid_a = 24_000usize * 2;
        assert!((track.samples[mid_a] - 0.25).abs() < 1e-6);
        assert!((track.samples[mid_a + 1] - 0.25).abs() < 1e-6);
        let mid_b = 60_000usize * 2;
        assert!((track.samples[mid_b] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn playback_rate_consumes_source_faster() {
        let slides = vec![slide_with_constant("a", 2.0, 0.5)];
        let tl = build_timeline(&slides, 2.0).unwrap();
        assert!((tl.total_secs() - 1.0).abs() < 1e-12);

        let track = build_export_track(&slides, &tl, 2.0, 48_000, 2).unwrap();
        assert_eq!(track.sample_frames(), 48_000);
        // The final output sample still maps inside the 2s source.
        let last = (48_000 - 1) * 2;
        assert!((track.samples[last] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn resampling_interpolates_between_source_rates() {
        let mut slide = Slide::new("a", "s");
        // 1 second of 24kHz mono ramp.
        let src: Vec<f32> = (0..24_000).map(|i| i as f32 / 24_000.0).collect();
        slide.audio = Some(PcmAudio::new(24_000, 1, src).unwrap());
        let slides = vec![slide];
        let tl = build_timeline(&slides, 1.0).unwrap();
        let track = build_export_track(&slides, &tl, 1.0, 48_000, 2).unwrap();

        // Halfway through, the ramp is at ~0.5 regardless of resampling.
        let mid = 24_000usize * 2;
        assert!((track.samples[mid] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn output_is_clamped_to_unit_range() {
        let mut slide = Slide::new("a", "s");
        slide.audio = Some(PcmAudio::new(48_000, 1, vec![1.5; 4_800]).unwrap());
        let slides = vec![slide];
        let tl = build_timeline(&slides, 1.0).unwrap();
        let track = build_export_track(&slides, &tl, 1.0, 48_000, 2).unwrap();
        assert!(track.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn f32le_file_round_trips_bytes() {
        let dir = std::env::temp_dir().join(format!("slidecast_track_{}", std::process::id()));
        let path = dir.join("mix.f32le");
        write_f32le_file(&[0.5, -1.0], &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(f32::from_le_bytes(bytes[0..4].try_into().unwrap()), 0.5);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
