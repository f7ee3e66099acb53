//! Overlay text layout and glyph rasterization.
//!
//! Messages are laid out top to bottom in page space starting at the configured top offset,
//! wrapped to the viewport width minus the side margins. Only blocks that intersect the visible
//! part of the page are drawn.

use crate::renderer::{TextStyle, skia_color};
use kurbo::Rect;
use parley::fontique::Blob;
use parley::layout::PositionedLayoutItem;
use parley::{Alignment, AlignmentOptions, FontContext, FontFamily, FontStack, LayoutContext, StyleProperty};
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

/// Placeholder advance per character when no font is loaded, as a fraction of the font size.
const PLACEHOLDER_ADVANCE: f64 = 0.5;

/// A glyph positioned relative to the top-left corner of its block.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlacedGlyph {
    id: u16,
    x: f32,
    /// Baseline.
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
enum BlockContent {
    Glyphs { font_size: f32, glyphs: Vec<PlacedGlyph> },
    /// Bar widths drawn in place of each line when no font is loaded.
    Placeholder { line_widths: Vec<f64> },
}

/// One message laid out in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: usize,
    /// Page-space extent of the block across the full viewport width.
    pub bounds: Rect,
    content: BlockContent,
}

/// Shapes and breaks overlay text with parley.
///
/// Without a font, lines are estimated from the character count and drawn as bars.
pub struct TextLayouter {
    font_cx: FontContext,
    layout_cx: LayoutContext<()>,
    family: Option<String>,
}

impl TextLayouter {
    pub fn new(font: Option<Arc<Vec<u8>>>) -> Self {
        let mut font_cx = FontContext::new();
        let family = font.and_then(|data| {
            let families = font_cx.collection.register_fonts(Blob::new(data), None);
            let name = families
                .first()
                .and_then(|(id, _)| font_cx.collection.family_name(*id))
                .map(str::to_owned);
            if name.is_none() {
                log::warn!("Overlay font registered no family, drawing placeholder text");
            }
            name
        });
        Self {
            font_cx,
            layout_cx: LayoutContext::new(),
            family,
        }
    }

    pub fn has_font(&self) -> bool {
        self.family.is_some()
    }

    /// Lay out display lines as stacked blocks.
    pub fn layout_messages(&mut self, messages: &[String], style: &TextStyle, viewport_width: f64) -> Vec<TextBlock> {
        let max_width = (viewport_width - 2.0 * style.left_margin).max(style.font_size).max(1.0);
        let gap = style.line_height_px() * style.message_spacing;
        let mut y = style.top_offset;
        let mut blocks = Vec::with_capacity(messages.len());

        for message in messages {
            let (lines, height, content) = match &self.family {
                Some(family) => shape(&mut self.font_cx, &mut self.layout_cx, family, message, style, max_width),
                None => placeholder(message, style, max_width),
            };
            blocks.push(TextBlock {
                lines,
                bounds: Rect::new(0.0, y, viewport_width, y + height),
                content,
            });
            y += height + gap;
        }
        blocks
    }
}

fn shape(
    font_cx: &mut FontContext,
    layout_cx: &mut LayoutContext<()>,
    family: &str,
    text: &str,
    style: &TextStyle,
    max_width: f64,
) -> (usize, f64, BlockContent) {
    let font_size = style.font_size as f32;
    let mut builder = layout_cx.ranged_builder(font_cx, text, 1.0, false);
    builder.push_default(StyleProperty::FontSize(font_size));
    builder.push_default(StyleProperty::FontStack(FontStack::Single(FontFamily::Named(family.into()))));
    let mut layout = builder.build(text);
    layout.break_all_lines(Some(max_width as f32));
    layout.align(None, Alignment::Start, AlignmentOptions::default());

    let mut glyphs = Vec::new();
    let mut lines = 0;
    for line in layout.lines() {
        lines += 1;
        for item in line.items() {
            let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                continue;
            };
            let mut x = glyph_run.offset();
            let baseline = glyph_run.baseline();
            for glyph in glyph_run.glyphs() {
                if let Ok(id) = u16::try_from(glyph.id) {
                    glyphs.push(PlacedGlyph {
                        id,
                        x: x + glyph.x,
                        y: baseline - glyph.y,
                    });
                }
                x += glyph.advance;
            }
        }
    }
    let height = f64::from(layout.height()).max(style.line_height_px());
    (lines.max(1), height, BlockContent::Glyphs { font_size, glyphs })
}

fn placeholder(text: &str, style: &TextStyle, max_width: f64) -> (usize, f64, BlockContent) {
    let advance = style.font_size * PLACEHOLDER_ADVANCE;
    let mut line_widths = Vec::new();
    for paragraph in text.split('\n') {
        let mut remaining = paragraph.chars().count() as f64 * advance;
        while remaining > max_width {
            line_widths.push(max_width);
            remaining -= max_width;
        }
        line_widths.push(remaining);
    }
    let lines = line_widths.len();
    (lines, lines as f64 * style.line_height_px(), BlockContent::Placeholder { line_widths })
}

/// Blocks that intersect the page-space `visible` rectangle.
pub fn visible_blocks(blocks: &[TextBlock], visible: Rect) -> impl Iterator<Item = &TextBlock> {
    blocks.iter().filter(move |block| {
        block.bounds.y1 > visible.y0 && block.bounds.y0 < visible.y1 && block.bounds.x1 > visible.x0
    })
}

/// Forwards glyph outlines in font units into a path.
struct OutlinePath(PathBuilder);

impl ttf_parser::OutlineBuilder for OutlinePath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Glyph outlines of one face, parsed at most once per glyph.
struct GlyphOutlines<'a> {
    face: Option<ttf_parser::Face<'a>>,
    paths: HashMap<u16, Option<tiny_skia::Path>>,
}

impl<'a> GlyphOutlines<'a> {
    fn new(font: Option<&'a [u8]>) -> Self {
        let face = font.and_then(|data| ttf_parser::Face::parse(data, 0).ok());
        Self {
            face,
            paths: HashMap::new(),
        }
    }

    fn fill(&mut self, pixmap: &mut Pixmap, glyph: PlacedGlyph, font_size: f32, origin: (f32, f32), paint: &Paint) {
        let Some(face) = &self.face else {
            return;
        };
        let path = self.paths.entry(glyph.id).or_insert_with(|| {
            let mut outline = OutlinePath(PathBuilder::new());
            face.outline_glyph(ttf_parser::GlyphId(glyph.id), &mut outline)?;
            outline.0.finish()
        });
        if let Some(path) = path {
            let scale = font_size / f32::from(face.units_per_em());
            // Font units are y-up
            let transform = Transform::from_row(scale, 0.0, 0.0, -scale, origin.0 + glyph.x, origin.1 + glyph.y);
            pixmap.fill_path(path, paint, FillRule::Winding, transform, None);
        }
    }
}

/// Draw `blocks` into a frame whose top edge is at page y `scroll`.
pub(crate) fn draw_blocks<'b>(
    pixmap: &mut Pixmap,
    blocks: impl Iterator<Item = &'b TextBlock>,
    scroll: f64,
    style: &TextStyle,
    font: Option<&[u8]>,
) {
    let mut paint = Paint::default();
    paint.set_color(skia_color(style.color));
    paint.anti_alias = true;

    let mut outlines = GlyphOutlines::new(font);
    let line_height = style.line_height_px();
    for block in blocks {
        let top = block.bounds.y0 - scroll;
        match &block.content {
            BlockContent::Glyphs { font_size, glyphs } => {
                let origin = (style.left_margin as f32, top as f32);
                for glyph in glyphs {
                    outlines.fill(pixmap, *glyph, *font_size, origin, &paint);
                }
            }
            BlockContent::Placeholder { line_widths } => {
                for (i, width) in line_widths.iter().enumerate() {
                    let y = top + i as f64 * line_height + line_height * 0.25;
                    let bar = tiny_skia::Rect::from_xywh(
                        style.left_margin as f32,
                        y as f32,
                        *width as f32,
                        (line_height * 0.5) as f32,
                    );
                    if let Some(bar) = bar {
                        pixmap.fill_rect(bar, &paint, Transform::identity(), None);
                    }
                }
            }
        }
    }
}
