use image::{Rgba, RgbaImage};

/// Returned for reads outside the buffer.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// DISPLAY SURFACE — where a flush uploads the CPU buffer
// ============================================================================

/// The user-visible side of the canvas (a GPU texture, a window framebuffer,
/// a test mirror).  Receives the full buffer once per flush.
pub trait DisplaySurface: Send {
    fn upload(&mut self, pixels: &RgbaImage);
}

/// In-memory display that keeps a copy of the last uploaded frame.
#[derive(Clone, Debug, Default)]
pub struct ImageSurface {
    pub frame: Option<RgbaImage>,
    pub uploads: u64,
}

impl DisplaySurface for ImageSurface {
    fn upload(&mut self, pixels: &RgbaImage) {
        match self.frame.as_mut() {
            Some(frame) if frame.dimensions() == pixels.dimensions() => {
                frame.copy_from_slice(pixels.as_raw());
            }
            _ => self.frame = Some(pixels.clone()),
        }
        self.uploads += 1;
    }
}

/// Display surface that only counts uploads.  Used when no presentation
/// target exists (headless replay).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSurface {
    pub uploads: u64,
}

impl DisplaySurface for NullSurface {
    fn upload(&mut self, _pixels: &RgbaImage) {
        self.uploads += 1;
    }
}

// ============================================================================
// PIXEL CANVAS
// ============================================================================

/// The mutable RGBA buffer for the active artwork plus its display side.
///
/// Brush kernels write only to the CPU buffer; the display sees changes
/// only through [`PixelCanvas::flush_if_dirty`].
pub struct PixelCanvas {
    pixels: RgbaImage,
    display: Box<dyn DisplaySurface>,
    dirty: bool,
    /// Bumped on every flush that actually uploaded.
    pub generation: u64,
}

impl PixelCanvas {
    pub fn new(pixels: RgbaImage, display: Box<dyn DisplaySurface>) -> Self {
        Self {
            pixels,
            display,
            dirty: true,
            generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.pixels.width() as i64 && y < self.pixels.height() as i64
    }

    /// Clamp an arbitrary coordinate onto the buffer.
    #[inline]
    pub fn clamp(&self, x: i64, y: i64) -> (u32, u32) {
        let max_x = self.pixels.width().saturating_sub(1) as i64;
        let max_y = self.pixels.height().saturating_sub(1) as i64;
        (x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return TRANSPARENT_PIXEL;
        }
        *self.pixels.get_pixel(x, y)
    }

    /// Write a pixel.  Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x >= self.pixels.width() || y >= self.pixels.height() {
            return;
        }
        self.pixels.put_pixel(x, y, color);
        self.dirty = true;
    }

    pub fn clear_to(&mut self, color: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
        self.dirty = true;
    }

    /// Swap in a whole new buffer (loaded progress, new artwork).
    pub fn replace(&mut self, pixels: RgbaImage) {
        self.pixels = pixels;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Upload to the display once if anything changed since the last flush.
    /// Returns whether an upload happened.
    pub fn flush_if_dirty(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.display.upload(&self.pixels);
        self.dirty = false;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    /// Immutable copy of the buffer for background consumers.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }
}

// ============================================================================
// SYNC SCHEDULER — at most one flush per tick
// ============================================================================

/// Tick bookkeeping for the buffer → display upload.
///
/// Input handling for a tick may run any number of kernel applications;
/// [`SyncScheduler::end_tick`] is the single place that flushes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncScheduler {
    tick: u64,
    in_tick: bool,
    pub flushes: u64,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick number (starts at 0, incremented by `end_tick`).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn begin_tick(&mut self) {
        self.in_tick = true;
    }

    pub fn in_tick(&self) -> bool {
        self.in_tick
    }

    /// End-of-tick hook: flush the canvas if dirty, advance the tick.
    pub fn end_tick(&mut self, canvas: Option<&mut PixelCanvas>) -> bool {
        let flushed = canvas.map(|c| c.flush_if_dirty()).unwrap_or(false);
        if flushed {
            self.flushes += 1;
        }
        self.in_tick = false;
        self.tick += 1;
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Surface that shares its upload count with the test.
    struct Counting(Arc<Mutex<u64>>);

    impl DisplaySurface for Counting {
        fn upload(&mut self, _pixels: &RgbaImage) {
            if let Ok(mut n) = self.0.lock() {
                *n += 1;
            }
        }
    }

    fn canvas(w: u32, h: u32) -> (PixelCanvas, Arc<Mutex<u64>>) {
        let count = Arc::new(Mutex::new(0));
        let img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        (PixelCanvas::new(img, Box::new(Counting(count.clone()))), count)
    }

    #[test]
    fn out_of_bounds_set_is_noop() {
        let (mut c, _) = canvas(4, 4);
        c.flush_if_dirty();
        c.set(4, 0, Rgba([1, 2, 3, 4]));
        c.set(0, 9, Rgba([1, 2, 3, 4]));
        assert!(!c.is_dirty());
        assert_eq!(c.get(9, 9), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn flush_is_idempotent_when_clean() {
        let (mut c, count) = canvas(2, 2);
        assert!(c.flush_if_dirty());
        assert!(!c.flush_if_dirty());
        c.set(1, 1, Rgba([0, 0, 0, 255]));
        c.set(0, 1, Rgba([0, 0, 0, 255]));
        assert!(c.flush_if_dirty());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn one_flush_per_tick_regardless_of_writes() {
        let (mut c, count) = canvas(8, 8);
        let mut sync = SyncScheduler::new();
        sync.end_tick(Some(&mut c));
        sync.begin_tick();
        for x in 0..8 {
            for y in 0..8 {
                c.set(x, y, Rgba([x as u8, y as u8, 0, 255]));
            }
        }
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(sync.end_tick(Some(&mut c)));
        assert_eq!(*count.lock().unwrap(), 2);
        // quiet tick
        sync.begin_tick();
        assert!(!sync.end_tick(Some(&mut c)));
        assert_eq!(sync.flushes, 2);
        assert_eq!(sync.tick(), 3);
    }

    #[test]
    fn clear_to_overwrites_everything() {
        let (mut c, _) = canvas(3, 3);
        c.set(1, 1, Rgba([0, 0, 0, 255]));
        c.clear_to(Rgba([9, 9, 9, 255]));
        assert!(c.pixels().pixels().all(|p| *p == Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn clamp_pins_to_edges() {
        let (c, _) = canvas(5, 4);
        assert_eq!(c.clamp(-3, 10), (0, 3));
        assert_eq!(c.clamp(2, 2), (2, 2));
    }

    #[test]
    fn image_surface_mirrors_last_frame() {
        let mut s = ImageSurface::default();
        let img = RgbaImage::from_pixel(2, 1, Rgba([1, 2, 3, 4]));
        s.upload(&img);
        s.upload(&img);
        assert_eq!(s.uploads, 2);
        assert_eq!(s.frame.as_ref(), Some(&img));
    }
}
