//! Master timeline: cumulative start offsets derived from per-slide audio
//! durations, consumed by both the audio scheduler and the render loop.

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::scene::model::Slide;

/// One slide's slot in the export timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineEntry {
    pub slide_index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Ordered, gap-free mapping from slide index to absolute start time.
///
/// Invariant: `entries[0].start_secs == 0` and
/// `entries[i].start_secs + entries[i].duration_secs == entries[i+1].start_secs`
/// for every `i`. Read-only for the remainder of the run once built.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    total_secs: f64,
}

impl Timeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    /// The entry active at `elapsed_secs` plus the slide-relative elapsed time.
    ///
    /// Entries are half-open `[start, start + duration)`. Elapsed times past
    /// the timeline tail resolve to the last entry with its elapsed clamped to
    /// the slide duration, so callers polling a drifting clock never observe
    /// "no active slide".
    pub fn entry_at(&self, elapsed_secs: f64) -> Option<(&TimelineEntry, f64)> {
        let last = self.entries.last()?;
        for entry in &self.entries {
            if elapsed_secs < entry.start_secs + entry.duration_secs {
                return Some((entry, (elapsed_secs - entry.start_secs).max(0.0)));
            }
        }
        Some((last, last.duration_secs))
    }
}

/// Build the master timeline from an ordered slide list.
///
/// Fails with [`SlidecastError::MissingAudio`] when any slide lacks
/// synthesized audio; this is caught before rendering starts, never
/// mid-stream. Pure, O(n).
pub fn build_timeline(slides: &[Slide], playback_rate: f64) -> SlidecastResult<Timeline> {
    if !playback_rate.is_finite() || playback_rate <= 0.0 {
        return Err(SlidecastError::validation(
            "playback_rate must be finite and > 0",
        ));
    }

    let mut entries = Vec::with_capacity(slides.len());
    let mut cursor = 0.0f64;
    for (index, slide) in slides.iter().enumerate() {
        let duration_secs = slide
            .duration_secs(playback_rate)
            .ok_or(SlidecastError::MissingAudio { index })?;
        entries.push(TimelineEntry {
            slide_index: index,
            start_secs: cursor,
            duration_secs,
        });
        cursor += duration_secs;
    }

    Ok(Timeline {
        entries,
        total_secs: cursor,
    })
}
