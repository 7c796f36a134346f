//! Stroking tile-local paths onto a pixmap.

use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use tile_common::Rgba;
use vector_tile::Point;

/// Narrowest stroke drawn, in pixels.
pub const MIN_STROKE_WIDTH: f32 = 1.0;

/// Color and pixel width of one stroke pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: f32,
}

impl StrokeStyle {
    pub fn new(color: Rgba, width: f64) -> Self {
        Self {
            color,
            width: (width as f32).max(MIN_STROKE_WIDTH),
        }
    }
}

/// Stroke every path, mapping tile-local coordinates to pixels by `scale`.
///
/// Paths with fewer than two points are skipped.
pub fn stroke_paths<'a>(
    pixmap: &mut Pixmap,
    paths: impl IntoIterator<Item = &'a [Point]>,
    scale: f32,
    style: &StrokeStyle,
) -> usize {
    let mut paint = Paint::default();
    paint.set_color_rgba8(style.color.r, style.color.g, style.color.b, style.color.a);
    paint.anti_alias = true;

    let mut stroke = Stroke::default();
    stroke.width = style.width;
    stroke.line_cap = LineCap::Round;
    stroke.line_join = LineJoin::Round;

    let mut drawn = 0;
    for path in paths {
        let Some((first, rest)) = path.split_first() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(first.0 as f32 * scale, first.1 as f32 * scale);
        for point in rest {
            pb.line_to(point.0 as f32 * scale, point.1 as f32 * scale);
        }

        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            drawn += 1;
        }
    }
    drawn
}
