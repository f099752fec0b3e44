//! Greedy subtitle word wrapping over an abstract width measurement.

use crate::foundation::error::SlidecastResult;

/// Width measurement for a single line of text at a given font size.
///
/// The production implementation shapes through Parley
/// ([`crate::text::ParleyTextEngine`]); tests use [`FixedAdvanceMeasurer`].
pub trait TextMeasurer {
    fn measure(&mut self, text: &str, size_px: f32) -> SlidecastResult<f32>;
}

/// Greedy word wrap: accumulate words onto the current line while the measured
/// width stays within `max_width_px`, then start a new line with the
/// overflowing word.
///
/// A single word wider than `max_width_px` is kept on its own line; there is
/// no hyphenation or truncation. Deterministic for identical inputs.
pub fn wrap_greedy(
    measurer: &mut dyn TextMeasurer,
    text: &str,
    size_px: f32,
    max_width_px: f32,
) -> SlidecastResult<Vec<String>> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measurer.measure(&candidate, size_px)? <= max_width_px {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    Ok(lines)
}

/// Deterministic measurer with a fixed per-character advance, for tests and
/// headless geometry checks: `width = chars * size_px * advance_em`.
#[derive(Clone, Copy, Debug)]
pub struct FixedAdvanceMeasurer {
    pub advance_em: f32,
}

impl Default for FixedAdvanceMeasurer {
    fn default() -> Self {
        Self { advance_em: 0.5 }
    }
}

impl TextMeasurer for FixedAdvanceMeasurer {
    fn measure(&mut self, text: &str, size_px: f32) -> SlidecastResult<f32> {
        Ok(text.chars().count() as f32 * size_px * self.advance_em)
    }
}
