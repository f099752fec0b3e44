//! Character-proportional narration segmentation.
//!
//! A slide's script is split on explicit line breaks; each non-empty line
//! becomes one caption segment whose time window is proportional to its
//! character count. This is a heuristic, not forced alignment: it ignores
//! speech pauses and punctuation cadence.

/// One caption segment with its share of the slide's narration duration.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub text: String,
    /// Fraction of the slide duration, in `(0, 1]`. Weights sum to 1.
    pub weight: f64,
}

/// Split a script into ordered caption segments.
///
/// Blank lines are dropped before weighting so consecutive line breaks do not
/// skew the proportions. A script without line breaks is a single segment. A
/// script with zero non-empty lines yields no segments; the compositor then
/// skips the subtitle panel entirely.
pub fn segments_for(script: &str) -> Vec<Segment> {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let total_chars: usize = lines.iter().map(|line| line.chars().count()).sum();
    if total_chars == 0 {
        return Vec::new();
    }

    lines
        .into_iter()
        .map(|line| Segment {
            text: line.to_string(),
            weight: line.chars().count() as f64 / total_chars as f64,
        })
        .collect()
}

/// Slide-relative `(window_start, window_end)` seconds for each segment.
///
/// Windows partition `[0, duration_secs]` exactly: the final window is
/// extended to cover any floating-point remainder.
pub fn segment_windows(segments: &[Segment], duration_secs: f64) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(segments.len());
    let mut cursor = 0.0f64;
    for (i, seg) in segments.iter().enumerate() {
        let end = if i + 1 == segments.len() {
            duration_secs
        } else {
            cursor + seg.weight * duration_secs
        };
        out.push((cursor, end));
        cursor = end;
    }
    out
}

/// The segment active at `slide_elapsed_secs` within a slide of
/// `slide_duration_secs`.
///
/// Returns the first segment whose cumulative window end exceeds the elapsed
/// time. Elapsed times past the slide duration (tail clock drift) resolve to
/// the last segment: a non-empty script never yields an empty subtitle due to
/// rounding.
pub fn active_segment<'a>(
    segments: &'a [Segment],
    slide_elapsed_secs: f64,
    slide_duration_secs: f64,
) -> Option<&'a str> {
    if segments.is_empty() {
        return None;
    }
    let mut cumulative_end = 0.0f64;
    for seg in segments {
        cumulative_end += seg.weight * slide_duration_secs;
        if slide_elapsed_secs < cumulative_end {
            return Some(&seg.text);
        }
    }
    segments.last().map(|seg| seg.text.as_str())
}
