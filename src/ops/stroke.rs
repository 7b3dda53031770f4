// ============================================================================
// STROKE MODE — pointer path sampling and brush stamping
// ============================================================================

use crate::brush::BrushKind;
use crate::canvas::PixelCanvas;
use crate::geometry::Point;
use crate::mask::BoundaryMask;
use crate::rng::BrushRng;

/// How many interpolation steps a pointer move of `d` pixels may produce.
///
/// Both variants use `ceil(2·d)` steps; `Capped(n)` limits it to `n`, which
/// keeps the per-tick cost of a very fast flick bounded at the price of
/// visible gaps on long jumps.  A cap of 0 behaves as 1 so a move always
/// reaches the current position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationPolicy {
    Capped(u32),
    Uncapped,
}

impl Default for InterpolationPolicy {
    fn default() -> Self {
        InterpolationPolicy::Capped(10)
    }
}

impl InterpolationPolicy {
    pub fn steps(&self, distance: f32) -> u32 {
        let raw = (distance * 2.0).ceil().max(0.0) as u32;
        match self {
            InterpolationPolicy::Capped(cap) => raw.min((*cap).max(1)),
            InterpolationPolicy::Uncapped => raw,
        }
    }
}

/// Map a normalized position in the drawable rect to a pixel centre.
#[inline]
pub fn to_pixel(normalized: Point, width: u32, height: u32) -> (i64, i64) {
    (
        (normalized.x * width as f32).round() as i64,
        (normalized.y * height as f32).round() as i64,
    )
}

/// Largest radius that still changes anything on a `width`×`height`
/// canvas: every pixel lies within the diagonal of any on-canvas centre.
pub fn limit_radius(radius: u32, width: u32, height: u32) -> u32 {
    let diagonal = (width as f64).hypot(height as f64).ceil() as u32;
    radius.min(diagonal)
}

/// Turns successive pointer samples into brush centres with no gaps.
#[derive(Clone, Debug, Default)]
pub struct StrokeSampler {
    last: Option<(i64, i64)>,
    policy: InterpolationPolicy,
}

impl StrokeSampler {
    pub fn new(policy: InterpolationPolicy) -> Self {
        Self { last: None, policy }
    }

    pub fn set_policy(&mut self, policy: InterpolationPolicy) {
        self.policy = policy;
    }

    /// True while a stroke is in progress.
    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }

    /// Forget the previous position.  Returns whether a stroke was active.
    pub fn reset(&mut self) -> bool {
        self.last.take().is_some()
    }

    /// Feed the current pixel position and get the brush centres to stamp,
    /// previous → current inclusive.
    pub fn sample(&mut self, current: (i64, i64)) -> Vec<(i64, i64)> {
        let Some(prev) = self.last.replace(current) else {
            return vec![current];
        };

        let p0 = Point::new(prev.0 as f32, prev.1 as f32);
        let p1 = Point::new(current.0 as f32, current.1 as f32);
        let steps = self.policy.steps(p0.distance(p1));
        if steps == 0 {
            return vec![prev];
        }

        (0..=steps)
            .map(|i| {
                let p = p0.lerp(p1, i as f32 / steps as f32);
                (p.x.round() as i64, p.y.round() as i64)
            })
            .collect()
    }
}

/// Stamp one brush application centred at `center`.
///
/// Footprint coordinates are clamped onto the canvas before use; pixels the
/// mask rejects are never read or written.  Returns the number of writes.
pub fn stamp(
    canvas: &mut PixelCanvas,
    mask: Option<&BoundaryMask>,
    kind: BrushKind,
    ink: image::Rgba<u8>,
    center: (i64, i64),
    radius: u32,
    spray_scatter: u32,
    rng: &mut BrushRng,
) -> usize {
    if !kind.paints() || canvas.width() == 0 || canvas.height() == 0 {
        return 0;
    }
    let admissible = |x: u32, y: u32| mask.is_none_or(|m| m.is_inside(x, y));
    let (cx, cy) = center;
    let r = radius as i64;
    let mut writes = 0;

    if kind.is_scatter() {
        let count = radius.saturating_mul(spray_scatter);
        for _ in 0..count {
            let (ux, uy) = rng.inside_unit_circle();
            let ox = (ux * radius as f32).round() as i64;
            let oy = (uy * radius as f32).round() as i64;
            let (px, py) = canvas.clamp(cx + ox, cy + oy);
            if !admissible(px, py) {
                continue;
            }
            let existing = canvas.get(px, py);
            canvas.set(px, py, kind.spray_pixel(existing, ink, rng));
            writes += 1;
        }
        return writes;
    }

    for dx in -r..=r {
        for dy in -r..=r {
            let (px, py) = canvas.clamp(cx.saturating_add(dx), cy.saturating_add(dy));
            if !admissible(px, py) {
                continue;
            }
            let existing = canvas.get(px, py);
            if let Some(color) = kind.stamp_pixel(existing, ink, dx, dy, r, rng) {
                canvas.set(px, py, color);
                writes += 1;
            }
        }
    }
    writes
}
