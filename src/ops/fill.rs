// ============================================================================
// FILL MODE — whole-region fills driven by a single tap
// ============================================================================

use image::Rgba;

use crate::brush::{BrushConfig, BrushKind};
use crate::canvas::PixelCanvas;
use crate::geometry::{Point, ShapeFrame};
use crate::mask::BoundaryMask;
use crate::region::{FillOutcome, FillTracker, Region, RegionSet};
use crate::rng::BrushRng;

/// Result of one fill tap that hit a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillReport {
    pub region: usize,
    /// Pixels the fill rule actually wrote.
    pub written: usize,
    pub outcome: FillOutcome,
}

/// First region (in set order) containing the tap at normalized `(nx, ny)`.
pub fn resolve_region(regions: &RegionSet, frame: &ShapeFrame, tap: Point) -> Option<usize> {
    regions.find(frame.normalized_to_shape(tap.x, tap.y))
}

/// Apply the fill rule of `kind` to every canvas pixel inside `region`.
///
/// Membership is evaluated for the whole canvas (rows in parallel); the
/// colour pass then runs in row-major order so the random stream, and
/// therefore the result, is reproducible for a given seed.
pub fn fill_region(
    canvas: &mut PixelCanvas,
    region: &Region,
    frame: &ShapeFrame,
    kind: BrushKind,
    ink: Rgba<u8>,
    background: Rgba<u8>,
    rng: &mut BrushRng,
) -> usize {
    if !kind.paints() {
        return 0;
    }
    let (w, h) = (canvas.width(), canvas.height());
    let membership = BoundaryMask::from_shape(&region.shape, frame, w, h);

    let mut written = 0;
    for y in 0..h {
        for x in 0..w {
            if !membership.is_inside(x, y) {
                continue;
            }
            let existing = canvas.get(x, y);
            if let Some(color) = kind.fill_pixel(existing, ink, background, x, y, rng) {
                canvas.set(x, y, color);
                written += 1;
            }
        }
    }
    written
}

/// Handle one fill tap: resolve, fill, flush, then update the tracker.
///
/// Returns `None` when painting is disabled or the tap misses every region;
/// the canvas and tracker are untouched in that case.
pub fn dispatch(
    canvas: &mut PixelCanvas,
    regions: &RegionSet,
    frame: &ShapeFrame,
    tracker: &mut FillTracker,
    brush: &BrushConfig,
    background: Rgba<u8>,
    tap: Point,
    rng: &mut BrushRng,
) -> Option<FillReport> {
    if !brush.kind.paints() {
        return None;
    }
    let index = resolve_region(regions, frame, tap)?;
    let region = regions.get(index)?;

    let written = fill_region(
        canvas,
        region,
        frame,
        brush.kind,
        brush.ink(background),
        background,
        rng,
    );
    canvas.flush_if_dirty();

    let erased = brush.kind == BrushKind::Eraser;
    let outcome = tracker.record(index, erased, regions.len());
    Some(FillReport { region: index, written, outcome })
}
