//! Minimal planar geometry for product footprints and extents.
//! Footprint simplification is an explicit post-processing step with a
//! tolerance scaled by pixel size, keeping downstream geometry cheap.

/// Georeferenced bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// Projection of the coordinates (WKT or EPSG code).
    pub projection: String,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Simple polygon, closed exterior ring (first point == last point).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
}

impl Polygon {
    /// Axis-aligned rectangle as a closed ring.
    pub fn from_extent(extent: &Extent) -> Self {
        Self {
            exterior: vec![
                (extent.min_x, extent.min_y),
                (extent.max_x, extent.min_y),
                (extent.max_x, extent.max_y),
                (extent.min_x, extent.max_y),
                (extent.min_x, extent.min_y),
            ],
        }
    }

    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in &self.exterior {
            if x < min_x {
                min_x = x;
            }
            if y < min_y {
                min_y = y;
            }
            if x > max_x {
                max_x = x;
            }
            if y > max_y {
                max_y = y;
            }
        }
        (min_x, min_y, max_x, max_y)
    }
}

/// Perpendicular distance from `point` to the segment `a`-`b`.
fn segment_distance(point: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (px, py) = point;
    let (ax, ay) = a;
    let (bx, by) = b;
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

fn douglas_peucker(points: &[(f64, f64)], tolerance: f64) -> Vec<(f64, f64)> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let first = points[0];
    let last = points[points.len() - 1];
    let mut max_dist = 0.0;
    let mut index = 0;
    for (i, &p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let d = segment_distance(p, first, last);
        if d > max_dist {
            max_dist = d;
            index = i;
        }
    }
    if max_dist > tolerance {
        let mut left = douglas_peucker(&points[..=index], tolerance);
        let right = douglas_peucker(&points[index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Simplify a footprint with a tolerance proportional to pixel size.
///
/// Called explicitly after the raw footprint is computed; two pixels of
/// tolerance keeps vertex counts low without visibly moving the outline.
pub fn simplify_footprint(footprint: &Polygon, pixel_size: f64) -> Polygon {
    let tolerance = 2.0 * pixel_size.abs();
    if footprint.exterior.len() < 4 {
        return footprint.clone();
    }
    let mut simplified = douglas_peucker(&footprint.exterior, tolerance);
    // Keep the ring closed
    if simplified.first() != simplified.last() {
        if let Some(&first) = simplified.first() {
            simplified.push(first);
        }
    }
    Polygon {
        exterior: simplified,
    }
}
