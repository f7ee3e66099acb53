//! Point and path primitives used by the hit-testing handlers.

use kurbo::{BezPath, Point, Rect, Vec2};

/// Distance from `point` to the segment `start..end`.
pub fn distance_to_segment(point: Point, start: Point, end: Point) -> f64 {
    let line_vec = Vec2::new(end.x - start.x, end.y - start.y);
    let point_vec = Vec2::new(point.x - start.x, point.y - start.y);

    let line_len_sq = line_vec.hypot2();
    if line_len_sq < f64::EPSILON {
        // Degenerate segment
        return point_vec.hypot();
    }

    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = Point::new(start.x + t * line_vec.x, start.y + t * line_vec.y);
    point.distance(projection)
}

/// Check whether the segments `a0..a1` and `b0..b1` cross or touch.
pub fn segments_intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    fn orient(p: Point, q: Point, r: Point) -> f64 {
        (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
    }
    fn on_segment(p: Point, q: Point, r: Point) -> bool {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    }

    let d1 = orient(b0, b1, a0);
    let d2 = orient(b0, b1, a1);
    let d3 = orient(a0, a1, b0);
    let d4 = orient(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b0, b1, a0))
        || (d2 == 0.0 && on_segment(b0, b1, a1))
        || (d3 == 0.0 && on_segment(a0, a1, b0))
        || (d4 == 0.0 && on_segment(a0, a1, b1))
}

/// Minimum distance between two segments.
pub fn segment_distance(a0: Point, a1: Point, b0: Point, b1: Point) -> f64 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.0;
    }
    distance_to_segment(a0, b0, b1)
        .min(distance_to_segment(a1, b0, b1))
        .min(distance_to_segment(b0, a0, a1))
        .min(distance_to_segment(b1, a0, a1))
}

/// Minimum distance from `point` to a polyline. A single-point polyline is treated as a dot.
pub fn distance_to_polyline(point: Point, polyline: &[Point]) -> f64 {
    match polyline {
        [] => f64::INFINITY,
        [only] => point.distance(*only),
        _ => polyline
            .windows(2)
            .map(|w| distance_to_segment(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Even-odd point-in-polygon test. The polygon is implicitly closed.
pub fn polygon_contains(polygon: &[Point], point: Point) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = polygon[i];
        let pj = polygon[j];
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Axis-aligned bounds of a point set, or `None` when empty.
pub fn bounds_of(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let mut rect = Rect::from_points(first, first);
    for p in iter {
        rect = rect.union_pt(p);
    }
    Some(rect)
}

/// Union of two optional rectangles.
pub fn union_rects(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Convert an ordered point sequence to a path, optionally closing it into a region.
pub fn points_to_path(points: &[Point], close: bool) -> BezPath {
    let mut path = BezPath::new();
    let Some((first, rest)) = points.split_first() else {
        return path;
    };

    path.move_to(*first);
    for point in rest {
        path.line_to(*point);
    }
    if close && points.len() > 2 {
        path.close_path();
    }
    path
}

/// Close an open lasso by appending the first point when it isn't already last.
pub fn close_polygon(points: &[Point]) -> Vec<Point> {
    let mut closed = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if first != last {
            closed.push(*first);
        }
    }
    closed
}
