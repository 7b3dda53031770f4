// ============================================================================
// BRUSH KERNELS — per-pixel colour rules shared by stroke and fill modes
// ============================================================================

use image::Rgba;

use crate::rng::BrushRng;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// Stroke-mode tuning
const CRAYON_KEEP: f32 = 0.5;
const CRAYON_OPACITY: f32 = 0.35;
const CRAYON_OPACITY_JITTER: f32 = 0.10;
const CRAYON_VALUE_JITTER: f32 = 0.05;
const MARKER_OPACITY: f32 = 0.35;
const MARKER_SOFT_EDGE: f32 = 0.4;
const PENCIL_SKIP: f32 = 0.6;
const PENCIL_OPACITY: f32 = 0.08;
const PENCIL_EDGE_JITTER: i64 = 2;
const SPRAY_OPACITY: f32 = 0.15;
const SPRAY_OPACITY_JITTER: f32 = 0.05;

// Fill-mode tuning
const FILL_CRAYON_PERIOD: u32 = 5;
const FILL_CRAYON_INKED: u32 = 3;
const FILL_MARKER_OPACITY: f32 = 0.6;
const FILL_SPRAY_SKIP: f32 = 0.9;

/// Brush style.  One tagged enum drives both the stroke stamp rules and the
/// whole-region fill rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BrushKind {
    #[default]
    Solid,
    Crayon,
    Marker,
    Pencil,
    Spray,
    Eraser,
    /// Painting disabled.
    None,
}

impl BrushKind {
    pub fn all() -> &'static [BrushKind] {
        &[
            BrushKind::Solid,
            BrushKind::Crayon,
            BrushKind::Marker,
            BrushKind::Pencil,
            BrushKind::Spray,
            BrushKind::Eraser,
            BrushKind::None,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrushKind::Solid => "solid",
            BrushKind::Crayon => "crayon",
            BrushKind::Marker => "marker",
            BrushKind::Pencil => "pencil",
            BrushKind::Spray => "spray",
            BrushKind::Eraser => "eraser",
            BrushKind::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        BrushKind::all().iter().copied().find(|k| k.name() == lower)
    }

    /// Colour the brush picker assigns when this brush is chosen.
    pub fn preset_color(&self) -> Rgba<u8> {
        match self {
            BrushKind::Solid => Rgba([255, 0, 0, 255]),
            BrushKind::Crayon => Rgba([0, 255, 255, 255]),
            BrushKind::Marker => Rgba([255, 102, 179, 255]),
            BrushKind::Spray => Rgba([0, 255, 0, 255]),
            BrushKind::Pencil => Rgba([255, 235, 4, 255]),
            BrushKind::Eraser | BrushKind::None => Rgba([0, 0, 0, 255]),
        }
    }

    /// Spray scatters points instead of covering a circular footprint.
    pub fn is_scatter(&self) -> bool {
        matches!(self, BrushKind::Spray)
    }

    pub fn paints(&self) -> bool {
        !matches!(self, BrushKind::None)
    }

    /// Stroke-mode rule for one footprint pixel at offset `(dx, dy)` from the
    /// brush centre.  `None` means "leave the pixel alone".
    ///
    /// Spray is not footprint based; it is routed through [`Self::spray_pixel`].
    pub fn stamp_pixel(
        &self,
        existing: Rgba<u8>,
        target: Rgba<u8>,
        dx: i64,
        dy: i64,
        radius: i64,
        rng: &mut BrushRng,
    ) -> Option<Rgba<u8>> {
        let dist_sq = dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy));
        let r_sq = radius.saturating_mul(radius);

        match self {
            BrushKind::None => None,
            BrushKind::Solid | BrushKind::Eraser => (dist_sq <= r_sq).then_some(target),
            BrushKind::Crayon => {
                if dist_sq > r_sq || rng.next_f32() > CRAYON_KEEP {
                    return None;
                }
                let alpha = CRAYON_OPACITY + rng.range_f32(-CRAYON_OPACITY_JITTER, CRAYON_OPACITY_JITTER);
                let blended = lerp_color(existing, target, alpha);
                let jitter = rng.range_f32(-CRAYON_VALUE_JITTER, CRAYON_VALUE_JITTER);
                Some(shift_value(blended, jitter))
            }
            BrushKind::Marker => {
                if dist_sq > r_sq {
                    return None;
                }
                let r = radius as f32;
                let dist = (dist_sq as f32).sqrt();
                let inner = r * (1.0 - MARKER_SOFT_EDGE);
                let mut t = MARKER_OPACITY;
                if dist > inner {
                    t *= 1.0 - (dist - inner) / (r * MARKER_SOFT_EDGE);
                }
                Some(lerp_color(existing, target, t.clamp(0.0, 1.0)))
            }
            BrushKind::Pencil => {
                let cutoff = r_sq.saturating_add(rng.range_i64(-PENCIL_EDGE_JITTER, PENCIL_EDGE_JITTER));
                if dist_sq > cutoff || rng.next_f32() < PENCIL_SKIP {
                    return None;
                }
                Some(lerp_color(existing, target, PENCIL_OPACITY))
            }
            BrushKind::Spray => Some(self.spray_pixel(existing, target, rng)),
        }
    }

    /// One spray droplet landing on `existing`.
    pub fn spray_pixel(&self, existing: Rgba<u8>, target: Rgba<u8>, rng: &mut BrushRng) -> Rgba<u8> {
        let t = SPRAY_OPACITY + rng.range_f32(-SPRAY_OPACITY_JITTER, SPRAY_OPACITY_JITTER);
        lerp_color(existing, target, t)
    }

    /// Fill-mode rule for one pixel inside the tapped region: same colour
    /// semantics as the stroke rules but with no spatial falloff.
    pub fn fill_pixel(
        &self,
        existing: Rgba<u8>,
        target: Rgba<u8>,
        background: Rgba<u8>,
        x: u32,
        y: u32,
        rng: &mut BrushRng,
    ) -> Option<Rgba<u8>> {
        match self {
            BrushKind::None => None,
            BrushKind::Solid => Some(target),
            BrushKind::Eraser => Some(background),
            BrushKind::Crayon => ((x + y) % FILL_CRAYON_PERIOD < FILL_CRAYON_INKED).then_some(target),
            BrushKind::Marker => Some(lerp_color(existing, target, FILL_MARKER_OPACITY)),
            BrushKind::Spray => (rng.next_f32() > FILL_SPRAY_SKIP).then_some(target),
            BrushKind::Pencil => Some(grayscale(target)),
        }
    }
}

/// Current brush selection.  Survives artwork switches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushConfig {
    pub kind: BrushKind,
    pub color: Rgba<u8>,
    /// Radius in working-texture pixels.
    pub radius: u32,
}

impl BrushConfig {
    pub fn new(kind: BrushKind, color: Rgba<u8>, radius: u32) -> Self {
        Self { kind, color, radius }
    }

    /// Brush with the picker's default colour for `kind`.
    pub fn preset(kind: BrushKind, radius: u32) -> Self {
        Self::new(kind, kind.preset_color(), radius)
    }

    /// Colour actually laid down: the eraser paints the canvas background.
    pub fn ink(&self, background: Rgba<u8>) -> Rgba<u8> {
        match self.kind {
            BrushKind::Eraser => background,
            _ => self.color,
        }
    }
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self::new(BrushKind::Solid, Rgba([0, 0, 0, 255]), 10)
    }
}

// ============================================================================
// COLOUR HELPERS
// ============================================================================

/// Per-channel linear interpolation, `t` clamped to `[0, 1]`.
pub fn lerp_color(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = a.0[i] as f32;
        let bv = b.0[i] as f32;
        out[i] = (av + t * (bv - av)).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Channel average, opaque.
pub fn grayscale(c: Rgba<u8>) -> Rgba<u8> {
    let g = ((c.0[0] as u32 + c.0[1] as u32 + c.0[2] as u32) as f32 / 3.0).round() as u8;
    Rgba([g, g, g, 255])
}

/// Move the HSV value of `c` by `delta` (in `[0, 1]` units), keeping hue,
/// saturation and alpha.
pub fn shift_value(c: Rgba<u8>, delta: f32) -> Rgba<u8> {
    let r = c.0[0] as f32 / 255.0;
    let g = c.0[1] as f32 / 255.0;
    let b = c.0[2] as f32 / 255.0;
    let (h, s, v) = rgb_to_hsv(r, g, b);
    let (r, g, b) = hsv_to_rgb(h, s, (v + delta).clamp(0.0, 1.0));
    let q = |f: f32| (f * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([q(r), q(g), q(b), c.0[3]])
}

/// RGB (0..1) → HSV (H: 0..360, S: 0..1, V: 0..1)
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (h, s, max)
}

/// HSV (H: 0..360, S: 0..1, V: 0..1) → RGB (0..1)
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = if h < 60.0 { (c, x, 0.0) }
        else if h < 120.0 { (x, c, 0.0) }
        else if h < 180.0 { (0.0, c, x) }
        else if h < 240.0 { (0.0, x, c) }
        else if h < 300.0 { (x, 0.0, c) }
        else { (c, 0.0, x) };
    (r + m, g + m, b + m)
}

/// Parse `#rrggbb`, `#rrggbbaa`, or the same without `#`.
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let a = if hex.len() == 8 { byte(6)? } else { 255 };
    Some(Rgba([byte(0)?, byte(2)?, byte(4)?, a]))
}
