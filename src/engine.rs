// ============================================================================
// PAINT ENGINE — artwork lifecycle, input handling and the tick loop
// ============================================================================

use std::sync::{Arc, Mutex};

use image::Rgba;

use crate::artwork::{ArtworkHandle, ArtworkKind, ArtworkShapes};
use crate::brush::BrushConfig;
use crate::canvas::{DisplaySurface, NullSurface, PixelCanvas, SyncScheduler};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::geometry::{Point, ShapeFrame};
use crate::mask::BoundaryMask;
use crate::ops::stroke::{self, StrokeSampler};
use crate::ops::fill;
use crate::persist::{KeyValueStore, PersistenceCodec, SaveScheduler};
use crate::region::{FillTracker, RegionSet};
use crate::rng::BrushRng;

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Side-effect hooks for the host (sounds, celebration UI).  All default to
/// doing nothing.
pub trait PaintEvents: Send {
    fn on_stroke_start(&mut self) {}
    fn on_stroke_end(&mut self) {}
    fn on_region_filled(&mut self, _region: usize) {}
    fn on_all_regions_filled(&mut self) {}
}

/// Sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEvents;

impl PaintEvents for NoEvents {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintEvent {
    StrokeStart,
    StrokeEnd,
    RegionFilled(usize),
    AllRegionsFilled,
}

/// Sink that records every notification.  Clones share the same log, so a
/// caller can keep one and hand the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct RecordingEvents {
    log: Arc<Mutex<Vec<PaintEvent>>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PaintEvent> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: PaintEvent) -> usize {
        self.log
            .lock()
            .map(|l| l.iter().filter(|e| **e == event).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut l) = self.log.lock() {
            l.clear();
        }
    }

    fn push(&self, event: PaintEvent) {
        if let Ok(mut l) = self.log.lock() {
            l.push(event);
        }
    }
}

impl PaintEvents for RecordingEvents {
    fn on_stroke_start(&mut self) {
        self.push(PaintEvent::StrokeStart);
    }
    fn on_stroke_end(&mut self) {
        self.push(PaintEvent::StrokeEnd);
    }
    fn on_region_filled(&mut self, region: usize) {
        self.push(PaintEvent::RegionFilled(region));
    }
    fn on_all_regions_filled(&mut self) {
        self.push(PaintEvent::AllRegionsFilled);
    }
}

// ============================================================================
// ACTIVE ARTWORK
// ============================================================================

/// Shape data in the form painting needs it.
enum Clip {
    Mask(BoundaryMask),
    Regions { set: RegionSet, tracker: FillTracker },
    Unbounded,
}

/// Canvas and shape state of the current artwork, created and dropped as
/// one unit.
struct ActiveArtwork {
    id: u32,
    kind: ArtworkKind,
    key: String,
    frame: ShapeFrame,
    canvas: PixelCanvas,
    clip: Clip,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct PaintEngine {
    config: EngineConfig,
    brush: BrushConfig,
    rng: BrushRng,
    sampler: StrokeSampler,
    sync: SyncScheduler,
    saves: SaveScheduler,
    events: Box<dyn PaintEvents>,
    active: Option<ActiveArtwork>,
    pointer_down: bool,
    /// A stamp has landed since the pointer went down.
    stroke_painted: bool,
    /// Suppresses repeated "not initialised" warnings.
    idle_warned: bool,
}

impl PaintEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn KeyValueStore>, events: Box<dyn PaintEvents>) -> Self {
        let rng = BrushRng::new(config.seed);
        let sampler = StrokeSampler::new(config.interpolation);
        Self {
            config,
            brush: BrushConfig::default(),
            rng,
            sampler,
            sync: SyncScheduler::new(),
            saves: SaveScheduler::new(PersistenceCodec::new(store)),
            events,
            active: None,
            pointer_down: false,
            stroke_painted: false,
            idle_warned: false,
        }
    }

    // --- Accessors ---------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn brush(&self) -> BrushConfig {
        self.brush
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn canvas(&self) -> Option<&PixelCanvas> {
        self.active.as_ref().map(|a| &a.canvas)
    }

    pub fn active_id(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn active_kind(&self) -> Option<ArtworkKind> {
        self.active.as_ref().map(|a| a.kind)
    }

    /// Persistence key of the active artwork.
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }

    /// Filled-region tracker, for fill artworks only.
    pub fn fill_tracker(&self) -> Option<&FillTracker> {
        match self.active.as_ref().map(|a| &a.clip) {
            Some(Clip::Regions { tracker, .. }) => Some(tracker),
            _ => None,
        }
    }

    pub fn boundary_mask(&self) -> Option<&BoundaryMask> {
        match self.active.as_ref().map(|a| &a.clip) {
            Some(Clip::Mask(mask)) => Some(mask),
            _ => None,
        }
    }

    pub fn sync(&self) -> &SyncScheduler {
        &self.sync
    }

    pub fn saves(&self) -> &SaveScheduler {
        &self.saves
    }

    // --- Configuration -----------------------------------------------------

    /// Replace the configuration.  The RNG is re-seeded only when the seed
    /// changes.
    pub fn set_config(&mut self, config: EngineConfig) {
        if config.seed != self.config.seed {
            self.rng = BrushRng::new(config.seed);
        }
        self.sampler.set_policy(config.interpolation);
        self.config = config;
    }

    pub fn set_brush_config(&mut self, brush: BrushConfig) {
        self.brush = brush;
    }

    // --- Lifecycle ---------------------------------------------------------

    /// Make `handle` the active artwork, with a headless display.
    pub fn activate(&mut self, handle: &ArtworkHandle) -> Result<()> {
        self.activate_with_display(handle, Box::new(NullSurface::default()))
    }

    /// Make `handle` the active artwork.  On failure the engine is left
    /// uninitialised and every interaction call becomes a no-op.
    pub fn activate_with_display(
        &mut self,
        handle: &ArtworkHandle,
        display: Box<dyn DisplaySurface>,
    ) -> Result<()> {
        // Leaving the old artwork: its stroke is abandoned, its waiting save
        // still goes out with the snapshot it already holds.
        self.sampler.reset();
        self.pointer_down = false;
        self.stroke_painted = false;
        self.saves.dispatch_pending();
        self.active = None;
        self.idle_warned = false;

        if let Err(e) = handle.validate() {
            log_err!("Artwork activation failed: {}", e);
            return Err(e);
        }

        let platform = self.config.platform;
        let mut pixels = handle.working_image(platform.texture_scale(), self.config.background);
        let (w, h) = pixels.dimensions();
        let key = handle.save_key();
        self.saves.settle(&key);
        if let Some(saved) = self.saves.codec().load(&key, w, h) {
            pixels = saved;
        }

        let clip = match &handle.shapes {
            ArtworkShapes::Boundary(shape) if handle.kind == ArtworkKind::Outline => {
                Clip::Mask(BoundaryMask::from_shape(shape, &handle.frame, w, h))
            }
            ArtworkShapes::Regions(set) if handle.kind == ArtworkKind::Regions => Clip::Regions {
                set: set.clone(),
                tracker: FillTracker::new(),
            },
            _ => Clip::Unbounded,
        };

        let region_count = match &clip {
            Clip::Regions { set, .. } => set.len(),
            _ => 0,
        };
        log_info!(
            "Activated {} artwork {} ({}x{}, {} regions, key '{}')",
            handle.kind.name(),
            handle.id,
            w,
            h,
            region_count,
            key
        );

        self.active = Some(ActiveArtwork {
            id: handle.id,
            kind: handle.kind,
            key,
            frame: handle.frame,
            canvas: PixelCanvas::new(pixels, display),
            clip,
        });
        Ok(())
    }

    /// Active artwork, or `None` with a one-time warning.
    fn active_or_warn(&mut self) -> Option<&mut ActiveArtwork> {
        if self.active.is_none() {
            if !self.idle_warned {
                log_warn!("Paint engine has no active artwork; ignoring input");
                self.idle_warned = true;
            }
            return None;
        }
        self.active.as_mut()
    }

    /// Reset the canvas to the background colour and forget filled regions.
    /// The display is updated immediately; nothing is saved.
    pub fn clear_canvas(&mut self) {
        let background = self.config.background;
        let Some(active) = self.active_or_warn() else { return };
        active.canvas.clear_to(background);
        active.canvas.flush_if_dirty();
        if let Clip::Regions { tracker, .. } = &mut active.clip {
            tracker.clear();
        }
        log_info!("Cleared canvas of '{}'", active.key);
        self.sampler.reset();
    }

    // --- Stroke input ------------------------------------------------------

    /// Pointer pressed at normalized `(nx, ny)` within the drawable rect.
    pub fn pointer_down(&mut self, nx: f32, ny: f32) {
        if self.active_or_warn().is_none() {
            return;
        }
        self.pointer_down = true;
        self.stroke_painted = false;
        self.sampler.reset();
        self.pointer_move(nx, ny);
    }

    /// Pointer moved.  Ignored unless the pointer is down; leaving the
    /// drawable rect ends the stroke.
    pub fn pointer_move(&mut self, nx: f32, ny: f32) {
        if !self.pointer_down || self.active_or_warn().is_none() {
            return;
        }
        if !is_inside_rect(nx, ny) {
            self.end_stroke();
            return;
        }
        self.paint_at(nx, ny);
    }

    pub fn pointer_up(&mut self) {
        if self.active_or_warn().is_none() {
            return;
        }
        self.end_stroke();
    }

    /// Pointer left the drawable rect.
    pub fn pointer_exit(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.end_stroke();
    }

    fn paint_at(&mut self, nx: f32, ny: f32) {
        if !self.brush.kind.paints() {
            return;
        }
        let brush = self.brush;
        let ink = brush.ink(self.config.background);
        let radius = self.config.effective_radius(brush.radius);
        let scatter = self.config.platform.spray_scatter();

        let Some(active) = self.active.as_mut() else { return };
        let mask = match &active.clip {
            Clip::Mask(mask) => Some(mask),
            Clip::Unbounded => None,
            // fill artworks take taps, not strokes
            Clip::Regions { .. } => return,
        };
        let (w, h) = (active.canvas.width(), active.canvas.height());
        let radius = stroke::limit_radius(radius, w, h);
        let centre = stroke::to_pixel(Point::new(nx, ny), w, h);
        for c in self.sampler.sample(centre) {
            stroke::stamp(&mut active.canvas, mask, brush.kind, ink, c, radius, scatter, &mut self.rng);
        }

        if !self.stroke_painted {
            self.stroke_painted = true;
            self.events.on_stroke_start();
        }
    }

    fn end_stroke(&mut self) {
        self.sampler.reset();
        self.pointer_down = false;
        if !self.stroke_painted {
            return;
        }
        self.stroke_painted = false;
        self.events.on_stroke_end();
        self.schedule_save();
    }

    // --- Fill input --------------------------------------------------------

    /// A tap at normalized `(nx, ny)`.  Fills a region on fill artworks; on
    /// stroke artworks it paints a single dab.
    pub fn tap(&mut self, nx: f32, ny: f32) {
        let Some(active) = self.active_or_warn() else { return };
        if !matches!(active.clip, Clip::Regions { .. }) {
            self.pointer_down(nx, ny);
            self.pointer_up();
            return;
        }

        let brush = self.brush;
        let background = self.config.background;
        let Some(active) = self.active.as_mut() else { return };
        let Clip::Regions { set, tracker } = &mut active.clip else { return };
        let Some(report) = fill::dispatch(
            &mut active.canvas,
            set,
            &active.frame,
            tracker,
            &brush,
            background,
            Point::new(nx, ny),
            &mut self.rng,
        ) else {
            return;
        };

        if report.outcome.newly_filled {
            self.events.on_region_filled(report.region);
        }
        if report.outcome.completed {
            log_info!("All regions of '{}' filled", active.key);
            self.events.on_all_regions_filled();
        }
        self.schedule_save();
    }

    // --- Tick loop ---------------------------------------------------------

    pub fn begin_tick(&mut self) {
        self.sync.begin_tick();
    }

    /// Flush the canvas once if anything changed and fire saves that are
    /// due.  Returns whether the display was updated.
    pub fn end_tick(&mut self) -> bool {
        let ended = self.sync.tick();
        let flushed = self.sync.end_tick(self.active.as_mut().map(|a| &mut a.canvas));
        self.saves.poll(ended);
        flushed
    }

    fn schedule_save(&mut self) {
        let delay = self.config.save_delay_ticks;
        let now = self.sync.tick();
        if let Some(active) = self.active.as_ref() {
            self.saves.schedule(&active.key, active.canvas.snapshot(), now, delay);
        }
    }

    /// Application pause: show and save the current canvas, blocking until
    /// every save has been written.
    pub fn suspend(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.canvas.flush_if_dirty();
            let snapshot = active.canvas.snapshot();
            self.saves.schedule(&active.key, snapshot, self.sync.tick(), 0);
        }
        self.saves.flush_now();
    }

    /// Application quit.  Same guarantees as [`Self::suspend`].
    pub fn shutdown(&mut self) {
        self.end_stroke();
        self.suspend();
        log_info!(
            "Paint engine shut down ({} saves written, {} failed)",
            self.saves.saved,
            self.saves.failed
        );
    }

    /// Background colour currently in use.
    pub fn background(&self) -> Rgba<u8> {
        self.config.background
    }
}

/// Normalized coordinates inside the drawable rect, edges included.
fn is_inside_rect(nx: f32, ny: f32) -> bool {
    (0.0..=1.0).contains(&nx) && (0.0..=1.0).contains(&ny)
}
