//! Whole-engine behaviour: clipping, fills, completion, persistence and the
//! once-per-tick display sync.

use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use colorbook::artwork::ArtworkHandle;
use colorbook::brush::{BrushConfig, BrushKind, WHITE};
use colorbook::canvas::DisplaySurface;
use colorbook::config::EngineConfig;
use colorbook::engine::{PaintEngine, PaintEvent, RecordingEvents};
use colorbook::geometry::{Point, Shape, ShapeFrame};
use colorbook::ops::stroke::{InterpolationPolicy, StrokeSampler};
use colorbook::persist::MemoryStore;
use colorbook::region::Region;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn engine_with(store: Arc<MemoryStore>) -> (PaintEngine, RecordingEvents) {
    let events = RecordingEvents::new();
    let engine = PaintEngine::new(EngineConfig::default(), store, Box::new(events.clone()));
    (engine, events)
}

fn engine() -> (PaintEngine, RecordingEvents, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let (engine, events) = engine_with(store.clone());
    (engine, events, store)
}

fn circle_outline(id: u32) -> ArtworkHandle {
    ArtworkHandle::outline(
        id,
        RgbaImage::from_pixel(64, 64, WHITE),
        Shape::Circle { center: Point::new(32.0, 32.0), radius: 20.0 },
    )
}

fn three_stripes() -> ArtworkHandle {
    let stripe = |x0: f32, x1: f32| Shape::Rect { min: Point::new(x0, 0.0), max: Point::new(x1, 1.0) };
    ArtworkHandle::regions(
        11,
        RgbaImage::from_pixel(30, 10, WHITE),
        vec![
            Region::new("a", stripe(0.0, 0.3)),
            Region::new("b", stripe(0.34, 0.63)),
            Region::new("c", stripe(0.67, 1.0)),
        ],
    )
    .with_frame(ShapeFrame { origin: Point::new(0.0, 0.0), size: Point::new(1.0, 1.0) })
}

struct CountingSurface(Arc<Mutex<u64>>);

impl DisplaySurface for CountingSurface {
    fn upload(&mut self, _pixels: &RgbaImage) {
        *self.0.lock().unwrap() += 1;
    }
}

// ----------------------------------------------------------------------------
// Stroke mode
// ----------------------------------------------------------------------------

#[test]
fn strokes_never_touch_pixels_outside_the_boundary() {
    let (mut e, _, _) = engine();
    e.activate(&circle_outline(1)).unwrap();
    let before = e.canvas().unwrap().snapshot();

    for (i, kind) in [
        BrushKind::Solid,
        BrushKind::Crayon,
        BrushKind::Marker,
        BrushKind::Pencil,
        BrushKind::Spray,
        BrushKind::Eraser,
    ]
    .into_iter()
    .enumerate()
    {
        e.set_brush_config(BrushConfig::new(kind, BLUE, 6));
        e.begin_tick();
        // sweep straight across the outline, past both edges
        let y = 0.2 + 0.1 * i as f32;
        e.pointer_down(0.0, y);
        for step in 1..=20 {
            e.pointer_move(step as f32 / 20.0, y);
        }
        e.pointer_up();
        e.end_tick();
    }

    let mask = e.boundary_mask().unwrap();
    let after = e.canvas().unwrap().pixels();
    let mut painted_inside = 0;
    for (x, y, px) in after.enumerate_pixels() {
        if !mask.is_inside(x, y) {
            assert_eq!(px, before.get_pixel(x, y), "outside pixel ({x}, {y}) changed");
        } else if px != before.get_pixel(x, y) {
            painted_inside += 1;
        }
    }
    assert!(painted_inside > 0);
}

#[test]
fn radius_beyond_slider_range_floods_only_the_outline() {
    let (mut e, _, _) = engine();
    e.activate(&circle_outline(2)).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 1_000_000));
    e.begin_tick();
    e.pointer_down(0.5, 0.5);
    e.pointer_up();
    e.end_tick();

    let mask = e.boundary_mask().unwrap();
    for (x, y, px) in e.canvas().unwrap().pixels().enumerate_pixels() {
        let expected = if mask.is_inside(x, y) { RED } else { WHITE };
        assert_eq!(*px, expected, "pixel ({x}, {y})");
    }
}

#[test]
fn interpolation_count_follows_capped_policy() {
    for (dx, dy) in [(0, 0), (1, 0), (3, 4), (2, 2), (40, 9)] {
        let mut s = StrokeSampler::new(InterpolationPolicy::Capped(10));
        s.sample((10, 10));
        let centres = s.sample((10 + dx, 10 + dy));
        let d = ((dx * dx + dy * dy) as f32).sqrt();
        let expected = if d == 0.0 { 1 } else { ((2.0 * d).ceil() as usize).min(10) + 1 };
        assert_eq!(centres.len(), expected, "distance {d}");
        if d == 0.0 {
            assert_eq!(centres, vec![(10, 10)]);
        }
    }
}

#[test]
fn uncapped_policy_closes_long_gaps() {
    let mut s = StrokeSampler::new(InterpolationPolicy::Uncapped);
    s.sample((0, 0));
    let centres = s.sample((30, 0));
    assert_eq!(centres.len(), 61);
    for w in centres.windows(2) {
        assert!((w[1].0 - w[0].0).abs() <= 1);
    }
}

#[test]
fn display_is_flushed_at_most_once_per_tick() {
    let (mut e, _, _) = engine();
    let uploads = Arc::new(Mutex::new(0));
    e.activate_with_display(&circle_outline(2), Box::new(CountingSurface(uploads.clone())))
        .unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 3));

    e.begin_tick();
    assert!(e.end_tick());
    assert_eq!(*uploads.lock().unwrap(), 1);

    e.begin_tick();
    e.pointer_down(0.4, 0.4);
    for i in 0..30 {
        e.pointer_move(0.4 + i as f32 * 0.005, 0.5);
    }
    assert_eq!(*uploads.lock().unwrap(), 1);
    assert!(e.end_tick());
    assert_eq!(*uploads.lock().unwrap(), 2);

    // nothing painted → nothing uploaded
    e.begin_tick();
    assert!(!e.end_tick());
    assert_eq!(*uploads.lock().unwrap(), 2);
}

#[test]
fn same_seed_gives_identical_textured_strokes() {
    let run = || {
        let (mut e, _, _) = engine();
        e.activate(&ArtworkHandle::freehand(4, None)).unwrap();
        e.set_brush_config(BrushConfig::new(BrushKind::Crayon, RED, 8));
        e.pointer_down(0.2, 0.2);
        e.pointer_move(0.6, 0.7);
        e.pointer_up();
        e.set_brush_config(BrushConfig::new(BrushKind::Spray, BLUE, 8));
        e.pointer_down(0.5, 0.2);
        e.pointer_up();
        e.canvas().unwrap().snapshot()
    };
    assert_eq!(run(), run());
}

#[test]
fn switching_artwork_mid_stroke_starts_fresh() {
    let (mut e, events, _) = engine();
    e.activate(&ArtworkHandle::freehand(5, None)).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 2));
    e.pointer_down(0.1, 0.1);
    e.activate(&ArtworkHandle::freehand(6, None)).unwrap();
    // a move without a new press must not draw a line from the old stroke
    e.pointer_move(0.9, 0.9);
    assert!(e.canvas().unwrap().pixels().pixels().all(|p| *p == WHITE));
    assert_eq!(events.count(PaintEvent::StrokeStart), 1);
}

// ----------------------------------------------------------------------------
// Fill mode
// ----------------------------------------------------------------------------

#[test]
fn solid_fill_matches_region_containment_exactly() {
    let (mut e, _, _) = engine();
    let handle = ArtworkHandle::regions(
        3,
        RgbaImage::from_pixel(40, 40, WHITE),
        vec![Region::new(
            "triangle",
            Shape::Polygon {
                points: vec![Point::new(5.0, 5.0), Point::new(35.0, 8.0), Point::new(12.0, 33.0)],
            },
        )],
    );
    e.activate(&handle).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 1));
    e.tap(15.0 / 40.0, 12.0 / 40.0);

    let shape = match &handle.shapes {
        colorbook::artwork::ArtworkShapes::Regions(set) => set.get(0).unwrap().shape.clone(),
        _ => unreachable!(),
    };
    for (x, y, px) in e.canvas().unwrap().pixels().enumerate_pixels() {
        let inside = shape.contains(handle.frame.pixel_to_shape(x, y, 40, 40));
        assert_eq!(*px, if inside { RED } else { WHITE }, "pixel ({x}, {y})");
    }
}

#[test]
fn completion_fires_once_and_rearms_after_erase() {
    let (mut e, events, _) = engine();
    e.activate(&three_stripes()).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 1));

    e.tap(0.1, 0.5);
    e.tap(0.5, 0.5);
    assert_eq!(events.count(PaintEvent::AllRegionsFilled), 0);

    e.tap(0.9, 0.5);
    assert_eq!(events.count(PaintEvent::AllRegionsFilled), 1);

    // refilling a filled region while complete changes nothing
    e.tap(0.9, 0.5);
    assert_eq!(events.count(PaintEvent::AllRegionsFilled), 1);

    e.set_brush_config(BrushConfig::new(BrushKind::Eraser, RED, 1));
    e.tap(0.9, 0.5);
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, BLUE, 1));
    e.tap(0.9, 0.5);
    assert_eq!(events.count(PaintEvent::AllRegionsFilled), 2);
}

#[test]
fn full_canvas_circle_fills_red_and_completes() {
    let (mut e, events, _) = engine();
    let handle = ArtworkHandle::regions(
        1,
        RgbaImage::from_pixel(100, 100, WHITE),
        vec![Region::new("all", Shape::Circle { center: Point::new(50.0, 50.0), radius: 75.0 })],
    );
    e.activate(&handle).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 100));
    e.tap(0.5, 0.5);

    assert!(e.canvas().unwrap().pixels().pixels().all(|p| *p == RED));
    assert_eq!(events.count(PaintEvent::AllRegionsFilled), 1);
}

#[test]
fn eraser_then_solid_fills_once() {
    let (mut e, events, _) = engine();
    e.activate(&three_stripes()).unwrap();

    e.set_brush_config(BrushConfig::new(BrushKind::Eraser, RED, 1));
    e.tap(0.5, 0.5);
    assert!(!e.fill_tracker().unwrap().is_filled(1));
    assert_eq!(events.count(PaintEvent::RegionFilled(1)), 0);

    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 1));
    e.tap(0.5, 0.5);
    assert!(e.fill_tracker().unwrap().is_filled(1));
    assert_eq!(events.events(), vec![PaintEvent::RegionFilled(1)]);
}

#[test]
fn clear_resets_pixels_and_tracker() {
    let (mut e, _, store) = engine();
    e.activate(&three_stripes()).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Marker, BLUE, 1));
    e.tap(0.1, 0.5);
    e.tap(0.9, 0.5);
    e.clear_canvas();

    assert!(e.canvas().unwrap().pixels().pixels().all(|p| *p == WHITE));
    assert!(e.fill_tracker().unwrap().is_empty());
    assert!(!e.canvas().unwrap().is_dirty());

    // the fills scheduled a save; clearing does not add one
    e.begin_tick();
    e.end_tick();
    e.begin_tick();
    e.end_tick();
    assert!(!e.saves().has_pending());
    assert!(store.len() <= 1);
}

// ----------------------------------------------------------------------------
// Persistence
// ----------------------------------------------------------------------------

#[test]
fn saved_progress_round_trips_exactly() {
    let store = Arc::new(MemoryStore::new());
    let painted = {
        let (mut e, _) = engine_with(store.clone());
        e.activate(&circle_outline(8)).unwrap();
        e.set_brush_config(BrushConfig::new(BrushKind::Marker, Rgba([10, 200, 90, 255]), 5));
        e.pointer_down(0.4, 0.4);
        e.pointer_move(0.6, 0.55);
        e.pointer_up();
        e.set_brush_config(BrushConfig::new(BrushKind::Spray, BLUE, 4));
        e.pointer_down(0.5, 0.5);
        e.pointer_up();
        e.suspend();
        e.canvas().unwrap().snapshot()
    };
    assert!(store.contains("FruitDrawing_8"));

    let (mut e, _) = engine_with(store);
    e.activate(&circle_outline(8)).unwrap();
    assert_eq!(e.canvas().unwrap().pixels(), &painted);
}

#[test]
fn corrupt_save_falls_back_to_base_image() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw("FruitDrawing_9", vec![0x89, b'P', b'N', b'G', 0, 1, 2]);
    let (mut e, _) = engine_with(store);
    e.activate(&circle_outline(9)).unwrap();
    assert!(e.canvas().unwrap().pixels().pixels().all(|p| *p == WHITE));
}

#[test]
fn failed_save_leaves_canvas_intact() {
    let (mut e, _, store) = engine();
    store.set_fail_writes(true);
    e.activate(&circle_outline(10)).unwrap();
    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 3));
    e.pointer_down(0.5, 0.5);
    e.pointer_up();
    let before = e.canvas().unwrap().snapshot();
    e.suspend();

    assert!(e.saves().failed >= 1);
    assert_eq!(e.canvas().unwrap().pixels(), &before);
    assert_eq!(e.canvas().unwrap().get(32, 32), RED);
}

#[test]
fn mobile_profile_halves_texture_and_brush() {
    let store = Arc::new(MemoryStore::new());
    let mut e = PaintEngine::new(EngineConfig::mobile(), store, Box::new(RecordingEvents::new()));
    e.activate(&circle_outline(12)).unwrap();
    assert_eq!(e.canvas().unwrap().width(), 32);

    e.set_brush_config(BrushConfig::new(BrushKind::Solid, RED, 4));
    e.pointer_down(0.5, 0.5);
    e.pointer_up();
    let c = e.canvas().unwrap();
    assert_eq!(c.get(16, 16), RED);
    assert_eq!(c.get(18, 16), RED);
    assert_eq!(c.get(19, 16), WHITE);
}
