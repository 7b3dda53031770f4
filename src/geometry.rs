// ============================================================================
// SHAPE GEOMETRY — containment tests and pixel ↔ shape-space mapping
// ============================================================================

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Default, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Point::new(x, y)
    }
}

/// A closed outline in shape space.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Polygon { points: Vec<Point> },
    Circle { center: Point, radius: f32 },
    Ellipse { center: Point, rx: f32, ry: f32 },
    Rect { min: Point, max: Point },
}

impl Shape {
    /// Checks that the outline can enclose anything at all.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Shape::Polygon { points } if points.len() < 3 => {
                Err(format!("polygon has {} vertices, need at least 3", points.len()))
            }
            Shape::Polygon { points } if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) => {
                Err("polygon has a non-finite vertex".to_string())
            }
            Shape::Circle { radius, .. } if !(*radius > 0.0) => {
                Err(format!("circle radius {} is not positive", radius))
            }
            Shape::Ellipse { rx, ry, .. } if !(*rx > 0.0 && *ry > 0.0) => {
                Err(format!("ellipse radii {}×{} are not positive", rx, ry))
            }
            Shape::Rect { min, max } if !(max.x > min.x && max.y > min.y) => {
                Err("rect max must exceed min on both axes".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        match self {
            Shape::Polygon { points } => polygon_contains(points, p),
            Shape::Circle { center, radius } => {
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                dx * dx + dy * dy <= radius * radius
            }
            Shape::Ellipse { center, rx, ry } => {
                if *rx <= 0.0 || *ry <= 0.0 {
                    return false;
                }
                let dx = (p.x - center.x) / rx;
                let dy = (p.y - center.y) / ry;
                dx * dx + dy * dy <= 1.0
            }
            Shape::Rect { min, max } => p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y,
        }
    }
}

/// Even-odd crossing test: count polygon edges crossed by a ray going +x.
fn polygon_contains(points: &[Point], p: Point) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let t = (p.y - pi.y) / (pj.y - pi.y);
            let x = pi.x + t * (pj.x - pi.x);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Axis-aligned placement of the drawable rectangle in shape space.
///
/// Pixel `(px, py)` of a `w × h` buffer maps to
/// `origin + (px / w, py / h) * size`; a normalized pointer position
/// `(nx, ny)` maps to `origin + (nx, ny) * size`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ShapeFrame {
    pub origin: Point,
    pub size: Point,
}

impl ShapeFrame {
    /// Shape space equal to the pixel grid of a `width × height` image.
    pub fn pixel_space(width: u32, height: u32) -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            size: Point::new(width as f32, height as f32),
        }
    }

    #[inline]
    pub fn pixel_to_shape(&self, px: u32, py: u32, width: u32, height: u32) -> Point {
        self.normalized_to_shape(px as f32 / width as f32, py as f32 / height as f32)
    }

    #[inline]
    pub fn normalized_to_shape(&self, nx: f32, ny: f32) -> Point {
        Point::new(
            self.origin.x + nx * self.size.x,
            self.origin.y + ny * self.size.y,
        )
    }
}
