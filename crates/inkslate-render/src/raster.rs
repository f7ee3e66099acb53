//! CPU rasterization of strokes and overlays with tiny-skia.

use crate::renderer::{RenderSettings, skia_color};
use crate::surface::PixelRect;
use inkslate_core::{Page, PenType, PressureCurve, Stroke};
use kurbo::{Point, Rect};
use peniko::Color;
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, StrokeDash, Transform,
};

/// Extra pixels around a dirty region to cover anti-aliasing.
pub(crate) const DIRTY_PAD: i32 = 2;

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color));
    paint.anti_alias = true;
    paint
}

fn to_skia_rect(rect: PixelRect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32)
}

/// Mask that limits drawing to `region`.
pub(crate) fn clip_mask(width: u32, height: u32, region: PixelRect) -> Option<Mask> {
    let mut mask = Mask::new(width, height)?;
    let path = PathBuilder::from_rect(to_skia_rect(region)?);
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Some(mask)
}

/// Reset `region` (or the whole pixmap) to the background color.
pub(crate) fn clear(pixmap: &mut Pixmap, region: Option<PixelRect>, background: Color) {
    match region.and_then(to_skia_rect) {
        Some(rect) => {
            let mut paint = solid_paint(background);
            paint.blend_mode = BlendMode::Source;
            paint.anti_alias = false;
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        None => pixmap.fill(skia_color(background)),
    }
}

/// Rasterize every stroke that can touch `region` of the current viewport.
///
/// `region` is in screen pixels; `None` redraws the whole viewport.
pub(crate) fn draw_strokes(pixmap: &mut Pixmap, page: &Page, region: Option<PixelRect>, settings: &RenderSettings) {
    let (width, height) = (pixmap.width(), pixmap.height());
    let scroll = f64::from(page.scroll_offset());
    let screen = region.unwrap_or_else(|| PixelRect::full(width, height)).to_rect();
    let page_region = Rect::new(screen.x0, screen.y0 + scroll, screen.x1, screen.y1 + scroll);

    let mask = region.and_then(|r| clip_mask(width, height, r));
    let transform = Transform::from_translate(0.0, -scroll as f32);

    let candidates = page.strokes.query_region(page_region);
    log::trace!("Rasterizing {} of {} strokes", candidates.len(), page.strokes.len());
    for stroke in candidates {
        draw_stroke(pixmap, stroke, &settings.pressure, transform, mask.as_ref());
    }
}

/// Rasterize one stroke in page space.
///
/// Pressure-insensitive pens are drawn as a single polyline. Other pens draw each segment
/// with the mean width of its two samples.
pub(crate) fn draw_stroke(
    pixmap: &mut Pixmap,
    stroke: &Stroke,
    curve: &PressureCurve,
    transform: Transform,
    mask: Option<&Mask>,
) {
    let paint = solid_paint(stroke.color.into());
    let positions: Vec<Point> = stroke.positions().collect();
    let Some(&first) = positions.first() else {
        return;
    };

    if positions.iter().all(|p| *p == first) {
        // Pen tapped in place: a dot
        let radius = (curve.width(stroke.pen, stroke.base_width, stroke.points[0].pressure) / 2.0).max(0.5);
        if let Some(dot) = PathBuilder::from_circle(first.x as f32, first.y as f32, radius as f32) {
            pixmap.fill_path(&dot, &paint, FillRule::Winding, transform, mask);
        }
        return;
    }

    match stroke.pen {
        PenType::Ballpen | PenType::Marker => {
            let mut pb = PathBuilder::new();
            pb.move_to(first.x as f32, first.y as f32);
            for p in &positions[1..] {
                pb.line_to(p.x as f32, p.y as f32);
            }
            if let Some(path) = pb.finish() {
                let line = line_style(curve.width(stroke.pen, stroke.base_width, 0.0));
                pixmap.stroke_path(&path, &paint, &line, transform, mask);
            }
        }
        PenType::Pencil | PenType::Fountain | PenType::Brush => {
            for pair in stroke.points.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let width = (curve.width(stroke.pen, stroke.base_width, a.pressure)
                    + curve.width(stroke.pen, stroke.base_width, b.pressure))
                    / 2.0;
                let mut pb = PathBuilder::new();
                pb.move_to(a.x as f32, a.y as f32);
                pb.line_to(b.x as f32, b.y as f32);
                if let Some(path) = pb.finish() {
                    pixmap.stroke_path(&path, &paint, &line_style(width), transform, mask);
                }
            }
        }
    }
}

fn line_style(width: f64) -> tiny_skia::Stroke {
    tiny_skia::Stroke {
        width: width.max(0.5) as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

/// Dashed outline of the lasso boundary, given in page space.
pub(crate) fn draw_selection(pixmap: &mut Pixmap, boundary: &[Point], scroll: f64, settings: &RenderSettings) {
    let Some((first, rest)) = boundary.split_first() else {
        return;
    };
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, (first.y - scroll) as f32);
    for p in rest {
        pb.line_to(p.x as f32, (p.y - scroll) as f32);
    }
    pb.close();
    let Some(path) = pb.finish() else {
        return;
    };
    let outline = tiny_skia::Stroke {
        width: settings.selection_width as f32,
        dash: StrokeDash::new(vec![10.0, 10.0], 0.0),
        ..Default::default()
    };
    pixmap.stroke_path(
        &path,
        &solid_paint(settings.selection_color),
        &outline,
        Transform::identity(),
        None,
    );
}

/// Loading spinner: an open arc centered in the frame, rotated by `angle` degrees.
pub(crate) fn draw_spinner(pixmap: &mut Pixmap, angle: f64, settings: &RenderSettings) {
    let spinner = &settings.spinner;
    let cx = f64::from(pixmap.width()) / 2.0;
    let cy = f64::from(pixmap.height()) / 2.0;

    // One vertex every five degrees is smooth at spinner sizes
    let steps = (spinner.sweep / 5.0).ceil().max(1.0) as usize;
    let mut pb = PathBuilder::new();
    for i in 0..=steps {
        let theta = (angle + spinner.sweep * i as f64 / steps as f64).to_radians();
        let x = (cx + spinner.radius * theta.cos()) as f32;
        let y = (cy + spinner.radius * theta.sin()) as f32;
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    let Some(path) = pb.finish() else {
        return;
    };
    let arc = tiny_skia::Stroke {
        width: spinner.stroke_width as f32,
        line_join: LineJoin::Round,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &solid_paint(spinner.color), &arc, Transform::identity(), None);
}

/// Copy `region` of `src` into an RGBA8 buffer of the same dimensions. `None` copies everything.
pub(crate) fn blit(src: &Pixmap, dst: &mut [u8], region: Option<PixelRect>) {
    let data = src.data();
    let Some(region) = region else {
        let len = data.len().min(dst.len());
        dst[..len].copy_from_slice(&data[..len]);
        return;
    };
    let Some(region) = region.clamp(src.width(), src.height()) else {
        return;
    };

    let stride = src.width() as usize * 4;
    let x0 = region.x as usize * 4;
    let x1 = region.right() as usize * 4;
    for row in region.y as usize..region.bottom() as usize {
        let start = row * stride + x0;
        let end = row * stride + x1;
        if end > dst.len() {
            break;
        }
        dst[start..end].copy_from_slice(&data[start..end]);
    }
}
