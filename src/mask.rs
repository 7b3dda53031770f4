// ============================================================================
// BOUNDARY MASK — precomputed per-pixel "inside the outline" test
// ============================================================================

use image::GrayImage;
use rayon::prelude::*;

use crate::geometry::{Shape, ShapeFrame};

/// Binary admissibility mask, same size as the canvas: 255 = inside the
/// drawable outline, 0 = outside.  Built once per artwork activation and
/// never mutated afterwards.
#[derive(Clone, Debug)]
pub struct BoundaryMask {
    mask: GrayImage,
}

impl BoundaryMask {
    /// Evaluate `inside(x, y)` for every pixel.  Rows are evaluated in
    /// parallel; the test must therefore be `Sync`.
    pub fn build<F>(width: u32, height: u32, inside: F) -> Self
    where
        F: Fn(u32, u32) -> bool + Sync,
    {
        let mut mask = GrayImage::new(width, height);
        if width > 0 {
            mask.par_chunks_mut(width as usize)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, px) in row.iter_mut().enumerate() {
                        *px = if inside(x as u32, y as u32) { 255 } else { 0 };
                    }
                });
        }
        Self { mask }
    }

    /// Rasterise `shape` through `frame` at the given canvas size.
    pub fn from_shape(shape: &Shape, frame: &ShapeFrame, width: u32, height: u32) -> Self {
        Self::build(width, height, |x, y| {
            shape.contains(frame.pixel_to_shape(x, y, width, height))
        })
    }

    /// Out-of-bounds coordinates are never inside.
    #[inline]
    pub fn is_inside(&self, x: u32, y: u32) -> bool {
        x < self.mask.width() && y < self.mask.height() && self.mask.get_pixel(x, y).0[0] >= 128
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Number of admissible pixels.
    pub fn inside_count(&self) -> usize {
        self.mask.as_raw().par_iter().filter(|&&v| v >= 128).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn build_from_closure() {
        let m = BoundaryMask::build(4, 3, |x, y| x == y);
        assert!(m.is_inside(0, 0));
        assert!(m.is_inside(2, 2));
        assert!(!m.is_inside(1, 0));
        assert_eq!(m.inside_count(), 3);
    }

    #[test]
    fn out_of_bounds_is_outside() {
        let m = BoundaryMask::build(2, 2, |_, _| true);
        assert!(!m.is_inside(2, 0));
        assert!(!m.is_inside(0, 5));
    }

    #[test]
    fn rect_shape_through_pixel_frame() {
        let shape = Shape::Rect { min: Point::new(2.0, 2.0), max: Point::new(5.0, 5.0) };
        let m = BoundaryMask::from_shape(&shape, &ShapeFrame::pixel_space(10, 10), 10, 10);
        assert!(m.is_inside(2, 2));
        assert!(m.is_inside(5, 5));
        assert!(!m.is_inside(6, 5));
        assert_eq!(m.inside_count(), 16);
    }
}
