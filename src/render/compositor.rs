//! Single-frame composition: letterboxed slide image plus the burn-in
//! subtitle panel, rasterized with `vello_cpu`.

use std::sync::Arc;

use kurbo::Shape as _;

use crate::assets::decode::PreparedImage;
use crate::foundation::core::{Affine, Canvas, Rect, REFERENCE_HEIGHT};
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::render::FrameRGBA;
use crate::scene::model::{SubtitlePosition, SubtitleStyle};
use crate::text::wrap::{wrap_greedy, TextMeasurer};
use crate::text::{ParleyTextEngine, TextBrush};

/// Fraction of the output width the wrapped subtitle block may occupy.
const SUBTITLE_WIDTH_BUDGET: f64 = 0.85;
/// Shrink-to-fit floor at the 1080 reference resolution.
const MIN_FONT_SIZE_PX: f64 = 10.0;
/// Shrink-to-fit decrement at the 1080 reference resolution.
const FONT_SHRINK_STEP_PX: f64 = 2.0;
/// Subtitle line height as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.3;
/// Panel paddings and corner radius at the 1080 reference resolution.
/// Horizontal padding exceeds vertical padding to approximate caption
/// aesthetics.
const PANEL_PAD_X_PX: f64 = 40.0;
const PANEL_PAD_Y_PX: f64 = 20.0;
const PANEL_RADIUS_PX: f64 = 12.0;
/// Distance from the canvas edge to the text block center for the top and
/// bottom positions, at the 1080 reference resolution.
const PANEL_MARGIN_PX: f64 = 100.0;

/// A slide raster prepared for repeated per-frame drawing.
#[derive(Clone)]
pub struct SlideImage {
    paint: vello_cpu::Image,
    width: u32,
    height: u32,
}

/// Renders one video frame: black letterbox background, "contain"-scaled
/// slide image, and (when a line is active) the subtitle panel and text.
///
/// Mutates only its internal render context between calls; the active line is
/// threaded through by the caller and changes only when the segment changes.
pub struct FrameCompositor {
    canvas: Canvas,
    ctx: Option<vello_cpu::RenderContext>,
    text: Option<ParleyTextEngine>,
}

impl FrameCompositor {
    /// Create a compositor for `canvas`. `font_bytes` is required only when
    /// subtitles will be burned in.
    pub fn new(canvas: Canvas, font_bytes: Option<Vec<u8>>) -> SlidecastResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(SlidecastError::validation(
                "compositor canvas width/height must be non-zero",
            ));
        }
        u16::try_from(canvas.width)
            .and(u16::try_from(canvas.height))
            .map_err(|_| SlidecastError::validation("compositor canvas exceeds u16 dimensions"))?;

        let text = font_bytes.map(ParleyTextEngine::new).transpose()?;
        Ok(Self {
            canvas,
            ctx: None,
            text,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Convert a decoded raster into a reusable paint. Called once per slide,
    /// at the slide's first frame.
    pub fn prepare_image(&self, prepared: &PreparedImage) -> SlidecastResult<SlideImage> {
        let pixmap =
            pixmap_from_premul_bytes(&prepared.rgba8_premul, prepared.width, prepared.height)?;
        Ok(SlideImage {
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
            width: prepared.width,
            height: prepared.height,
        })
    }

    /// Render one frame.
    ///
    /// `image == None` draws the letterbox background only (the policy for
    /// slides whose raster failed to decode). `active_line == None` skips the
    /// subtitle panel entirely; no empty background box is drawn.
    pub fn render_frame(
        &mut self,
        image: Option<&SlideImage>,
        active_line: Option<&str>,
        style: &SubtitleStyle,
    ) -> SlidecastResult<FrameRGBA> {
        let width_u16 = self.canvas.width as u16;
        let height_u16 = self.canvas.height as u16;

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width_u16 && ctx.height() == height_u16 => ctx,
            _ => vello_cpu::RenderContext::new(width_u16, height_u16),
        };
        ctx.reset();
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        // Opaque letterbox fill.
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 255));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.canvas.width),
            f64::from(self.canvas.height),
        ));

        if let Some(img) = image {
            let (scale, dx, dy) = letterbox(self.canvas, img.width, img.height);
            ctx.set_transform(affine_to_cpu(
                Affine::translate((dx, dy)) * Affine::scale(scale),
            ));
            ctx.set_paint(img.paint.clone());
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(img.width),
                f64::from(img.height),
            ));
        }

        if let Some(line) = active_line {
            self.draw_subtitle(&mut ctx, line, style)?;
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);

        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_subtitle(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        style: &SubtitleStyle,
    ) -> SlidecastResult<()> {
        let engine = self.text.as_mut().ok_or_else(|| {
            SlidecastError::validation("burn-in subtitles require a loaded font")
        })?;

        let scale = f64::from(self.canvas.height) / REFERENCE_HEIGHT;
        let max_width = (f64::from(self.canvas.width) * SUBTITLE_WIDTH_BUDGET) as f32;
        let (font_size, lines) = fit_font_size(
            engine,
            text,
            (f64::from(style.font_size_px) * scale) as f32,
            (MIN_FONT_SIZE_PX * scale) as f32,
            (FONT_SHRINK_STEP_PX * scale) as f32,
            max_width,
        )?;
        if lines.is_empty() {
            return Ok(());
        }

        let mut widths = Vec::with_capacity(lines.len());
        for line in &lines {
            widths.push(engine.measure(line, font_size)?);
        }
        let panel = panel_layout(self.canvas, style.position, scale, font_size, &widths);

        // Panel.
        let bg = style.background_color.with_opacity(style.background_opacity);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));
        let rounded = kurbo::RoundedRect::from_rect(panel.rect, panel.radius);
        ctx.fill_path(&bezpath_to_cpu(&rounded.to_path(0.1)));

        // Lines, centered horizontally, stacked top to bottom.
        let brush = TextBrush {
            r: style.text_color.r,
            g: style.text_color.g,
            b: style.text_color.b,
            a: style.text_color.a,
        };
        for (i, line) in lines.iter().enumerate() {
            let layout = engine.layout_line(line, font_size, brush)?;
            let line_w = f64::from(layout.width());
            let line_h = f64::from(layout.height());
            let x = (f64::from(self.canvas.width) - line_w) / 2.0;
            let y =
                panel.text_top + i as f64 * panel.line_height + (panel.line_height - line_h) / 2.0;

            ctx.set_transform(affine_to_cpu(Affine::translate((x, y))));
            for layout_line in layout.lines() {
                for item in layout_line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let b = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(b.r, b.g, b.b, b.a));
                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(engine.font_data())
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        Ok(())
    }
}

/// Uniform "contain" scaling: `(scale, dx, dy)` such that the image fits
/// entirely within the canvas, aspect ratio preserved, centered.
pub(crate) fn letterbox(canvas: Canvas, image_w: u32, image_h: u32) -> (f64, f64, f64) {
    let h_ratio = f64::from(canvas.width) / f64::from(image_w.max(1));
    let v_ratio = f64::from(canvas.height) / f64::from(image_h.max(1));
    let scale = h_ratio.min(v_ratio);
    let dx = (f64::from(canvas.width) - f64::from(image_w) * scale) / 2.0;
    let dy = (f64::from(canvas.height) - f64::from(image_h) * scale) / 2.0;
    (scale, dx, dy)
}

/// Shrink-to-fit: the largest size `<= start_px` (stepping down by `step_px`,
/// floored at `floor_px`) whose widest wrapped line fits `max_width_px`.
///
/// Linear search, matching the observable result of a binary search over the
/// same step grid.
pub(crate) fn fit_font_size(
    measurer: &mut dyn TextMeasurer,
    text: &str,
    start_px: f32,
    floor_px: f32,
    step_px: f32,
    max_width_px: f32,
) -> SlidecastResult<(f32, Vec<String>)> {
    if !(step_px > 0.0) || !(floor_px > 0.0) {
        return Err(SlidecastError::validation(
            "font shrink step and floor must be > 0",
        ));
    }

    let mut size = start_px.max(floor_px);
    loop {
        let lines = wrap_greedy(measurer, text, size, max_width_px)?;
        let mut widest = 0.0f32;
        for line in &lines {
            widest = widest.max(measurer.measure(line, size)?);
        }
        if widest <= max_width_px || size <= floor_px {
            return Ok((size, lines));
        }
        size = (size - step_px).max(floor_px);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PanelLayout {
    /// Panel background rectangle, paddings included.
    pub rect: Rect,
    pub radius: f64,
    pub line_height: f64,
    /// Top of the first text line's slot.
    pub text_top: f64,
}

/// Panel geometry for a wrapped subtitle block.
pub(crate) fn panel_layout(
    canvas: Canvas,
    position: SubtitlePosition,
    scale: f64,
    font_size: f32,
    line_widths: &[f32],
) -> PanelLayout {
    let widest = f64::from(line_widths.iter().copied().fold(0.0f32, f32::max));
    let line_height = LINE_HEIGHT_FACTOR * f64::from(font_size);
    let block_h = line_height * line_widths.len() as f64;

    let pad_x = PANEL_PAD_X_PX * scale;
    let pad_y = PANEL_PAD_Y_PX * scale;
    let margin = PANEL_MARGIN_PX * scale;

    let center_x = f64::from(canvas.width) / 2.0;
    let center_y = match position {
        SubtitlePosition::Top => margin,
        SubtitlePosition::Middle => f64::from(canvas.height) / 2.0,
        SubtitlePosition::Bottom => f64::from(canvas.height) - margin,
    };

    PanelLayout {
        rect: Rect::new(
            center_x - widest / 2.0 - pad_x,
            center_y - block_h / 2.0 - pad_y,
            center_x + widest / 2.0 + pad_x,
            center_y + block_h / 2.0 + pad_y,
        ),
        radius: PANEL_RADIUS_PX * scale,
        line_height,
        text_top: center_y - block_h / 2.0,
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> SlidecastResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| SlidecastError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| SlidecastError::validation("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(SlidecastError::validation("pixmap byte len mismatch"));
    }
    // Pixmap stores PremulRgba8; our bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::FixedAdvanceMeasurer;

    const CANVAS_1080: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn square_image_in_wide_canvas_has_equal_side_margins() {
        let (scale, dx, dy) = letterbox(CANVAS_1080, 100, 100);
        assert_eq!(scale, 10.8);
        assert_eq!(dx, (1920.0 - 1080.0) / 2.0);
        assert_eq!(dy, 0.0);

        // Any resolution: a 500x500 source into 1280x720.
        let (_, dx, dy) = letterbox(
            Canvas {
                width: 1280,
                height: 720,
            },
            500,
            500,
        );
        assert_eq!(dy, 0.0);
        assert_eq!(dx, (1280.0 - 720.0) / 2.0);
    }

    #[test]
    fn wide_image_letterboxes_top_and_bottom() {
        let (scale, dx, dy) = letterbox(CANVAS_1080, 4000, 1000);
        assert_eq!(scale, 1920.0 / 4000.0);
        assert_eq!(dx, 0.0);
        assert_eq!(dy, (1080.0 - 1000.0 * scale) / 2.0);
    }

    #[test]
    fn exact_fit_has_zero_margins() {
        let (scale, dx, dy) = letterbox(CANVAS_1080, 1920, 1080);
        assert_eq!((scale, dx, dy), (1.0, 0.0, 0.0));
    }

    #[test]
    fn fit_font_size_keeps_size_when_text_fits() {
        let mut m = FixedAdvanceMeasurer::default();
        let (size, lines) = fit_font_size(&mut m, "hi", 48.0, 10.0, 2.0, 1000.0).unwrap();
        assert_eq!(size, 48.0);
        assert_eq!(lines, vec!["hi"]);
    }

    #[test]
    fn fit_font_size_shrinks_overwide_single_words_to_floor() {
        // One unbreakable 40-char word: at 10px floor it is 200px wide, still
        // over budget, so the floor size is returned rather than looping.
        let word = "a".repeat(40);
        let mut m = FixedAdvanceMeasurer::default();
        let (size, lines) = fit_font_size(&mut m, &word, 48.0, 10.0, 2.0, 100.0).unwrap();
        assert_eq!(size, 10.0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn fit_font_size_prefers_wrapping_over_shrinking() {
        // Two words that wrap into two fitting lines at the start size.
        let mut m = FixedAdvanceMeasurer::default();
        let (size, lines) = fit_font_size(&mut m, "aaaa bbbb", 10.0, 5.0, 2.0, 25.0).unwrap();
        assert_eq!(size, 10.0);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn panel_positions_follow_style() {
        let widths = [500.0f32];
        let bottom = panel_layout(CANVAS_1080, SubtitlePosition::Bottom, 1.0, 48.0, &widths);
        let middle = panel_layout(CANVAS_1080, SubtitlePosition::Middle, 1.0, 48.0, &widths);
        let top = panel_layout(CANVAS_1080, SubtitlePosition::Top, 1.0, 48.0, &widths);

        let block_h = 1.3 * 48.0;
        assert!((bottom.rect.center().y - (1080.0 - 100.0)).abs() < 1e-9);
        assert!((middle.rect.center().y - 540.0).abs() < 1e-9);
        assert!((top.rect.center().y - 100.0).abs() < 1e-9);

        // Horizontal padding exceeds vertical padding.
        assert!((bottom.rect.width() - (500.0 + 2.0 * 40.0)).abs() < 1e-9);
        assert!((bottom.rect.height() - (block_h + 2.0 * 20.0)).abs() < 1e-9);
        assert!((bottom.rect.center().x - 960.0).abs() < 1e-9);
        assert_eq!(bottom.radius, 12.0);
    }

    #[test]
    fn panel_geometry_rescales_with_output_height() {
        let canvas = Canvas {
            width: 1280,
            height: 720,
        };
        let scale = 720.0 / 1080.0;
        let panel = panel_layout(canvas, SubtitlePosition::Bottom, scale, 32.0, &[300.0]);
        assert!((panel.rect.center().y - (720.0 - 100.0 * scale)).abs() < 1e-9);
        assert!((panel.radius - 12.0 * scale).abs() < 1e-9);
    }

    #[test]
    fn multi_line_blocks_stack_with_line_height() {
        let panel = panel_layout(
            CANVAS_1080,
            SubtitlePosition::Middle,
            1.0,
            40.0,
            &[400.0, 200.0],
        );
        assert!((panel.line_height - 52.0).abs() < 1e-9);
        assert!((panel.rect.height() - (2.0 * 52.0 + 40.0)).abs() < 1e-9);
        // Widest line drives the panel width.
        assert!((panel.rect.width() - (400.0 + 80.0)).abs() < 1e-9);
        assert!((panel.text_top - (540.0 - 52.0)).abs() < 1e-9);
    }
}
