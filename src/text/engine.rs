use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::text::wrap::TextMeasurer;
use crate::text::TextBrush;

/// Stateful Parley shaping engine bound to one font file.
///
/// Shared measurement context: the same engine both measures lines during
/// wrapping and produces the glyph layouts the compositor rasterizes, so
/// measured and drawn widths can never disagree.
pub struct ParleyTextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    font_data: vello_cpu::peniko::FontData,
    family_name: String,
}

impl ParleyTextEngine {
    /// Register `font_bytes` and resolve its primary family.
    pub fn new(font_bytes: Vec<u8>) -> SlidecastResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            SlidecastError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| SlidecastError::validation("registered font family has no name"))?
            .to_string();

        let font_data =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            font_data,
            family_name,
        })
    }

    /// The font handle glyph runs from [`Self::layout_line`] are drawn with.
    pub(crate) fn font_data(&self) -> &vello_cpu::peniko::FontData {
        &self.font_data
    }

    /// Shape one already-wrapped line. No further line breaking is applied.
    pub fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrush,
    ) -> SlidecastResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(SlidecastError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

impl TextMeasurer for ParleyTextEngine {
    fn measure(&mut self, text: &str, size_px: f32) -> SlidecastResult<f32> {
        Ok(self.layout_line(text, size_px, TextBrush::default())?.width())
    }
}
