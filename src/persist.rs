// ============================================================================
// PERSISTENCE — lossless save/restore of the canvas, keyed by artwork
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat, RgbaImage};

use crate::error::PersistError;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Encode an RGBA buffer as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PersistError> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut buffer));
    encoder.write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)?;
    Ok(buffer)
}

pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, PersistError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
    Ok(decoded.into_rgba8())
}

// ============================================================================
// KEY-VALUE STORES
// ============================================================================

/// Writable byte store for saved progress.  Shared with background writers.
pub trait KeyValueStore: Send + Sync {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError>;

    /// `Err(PersistError::NotFound)` when nothing was saved under `key`.
    fn read(&self, key: &str) -> Result<Vec<u8>, PersistError>;
}

/// One `<key>.png` file per artwork inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/colorbook/saves`
    pub fn default_location() -> Self {
        Self::new(crate::logger::data_dir().join("colorbook").join("saves"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }
}

impl KeyValueStore for FileStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write beside the target then rename, so a crash never leaves a
        // half-written save behind.  Each write gets its own temp file.
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!("{key}.png.{}-{seq}.tmp", std::process::id()));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, PersistError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store.  Can be told to fail writes to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().map(|m| m.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store raw bytes directly, bypassing the codec.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        if let Ok(mut m) = self.entries.lock() {
            m.insert(key.to_string(), bytes);
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Io(std::io::Error::other("write rejected")));
        }
        let mut m = self
            .entries
            .lock()
            .map_err(|_| PersistError::Store("memory store lock poisoned".into()))?;
        m.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, PersistError> {
        let m = self
            .entries
            .lock()
            .map_err(|_| PersistError::Store("memory store lock poisoned".into()))?;
        m.get(key).cloned().ok_or_else(|| PersistError::NotFound(key.to_string()))
    }
}

// ============================================================================
// CODEC — buffer ↔ store
// ============================================================================

/// Lossless buffer persistence on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct PersistenceCodec {
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceCodec {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, key: &str, image: &RgbaImage) -> Result<(), PersistError> {
        let bytes = encode_png(image)?;
        self.store.write(key, &bytes)
    }

    /// Load and check the saved buffer against the expected canvas size.
    pub fn try_load(&self, key: &str, width: u32, height: u32) -> Result<RgbaImage, PersistError> {
        let bytes = self.store.read(key)?;
        let image = decode_png(&bytes)?;
        if image.dimensions() != (width, height) {
            return Err(PersistError::SizeMismatch {
                expected_w: width,
                expected_h: height,
                found_w: image.width(),
                found_h: image.height(),
            });
        }
        Ok(image)
    }

    /// Saved buffer for `key`, or `None` if there is no usable save.
    /// Every failure is treated as "nothing saved".
    pub fn load(&self, key: &str, width: u32, height: u32) -> Option<RgbaImage> {
        match self.try_load(key, width, height) {
            Ok(image) => {
                log_info!("Restored saved progress '{}' ({}x{})", key, width, height);
                Some(image)
            }
            Err(PersistError::NotFound(_)) => None,
            Err(e) => {
                log_warn!("Ignoring saved progress '{}': {}", key, e);
                None
            }
        }
    }
}

// ============================================================================
// SAVE SCHEDULER — deferred, superseding, background writes
// ============================================================================

/// Outcome of one background save.
#[derive(Debug)]
pub enum SaveResult {
    Saved { key: String },
    Failed { key: String, error: String },
}

/// A save waiting for its tick.  The snapshot is owned; the live canvas is
/// never touched by the writer.
struct PendingSave {
    key: String,
    snapshot: RgbaImage,
    due_tick: u64,
}

/// Schedules saves `delay` ticks into the future.  A newer schedule
/// replaces one that has not fired yet.
///
/// Fired saves run on the rayon pool one at a time, in the order they
/// fired, and report back over a channel.  A save that fires while a write
/// is running queues behind it; a later save for the same key replaces the
/// queued one.  An older snapshot can therefore never land after a newer one.
pub struct SaveScheduler {
    codec: PersistenceCodec,
    pending: Option<PendingSave>,
    queued: VecDeque<PendingSave>,
    writing: Option<String>,
    result_tx: mpsc::Sender<SaveResult>,
    result_rx: mpsc::Receiver<SaveResult>,
    pub saved: u64,
    pub failed: u64,
}

impl SaveScheduler {
    pub fn new(codec: PersistenceCodec) -> Self {
        let (result_tx, result_rx) = mpsc::channel();
        Self {
            codec,
            pending: None,
            queued: VecDeque::new(),
            writing: None,
            result_tx,
            result_rx,
            saved: 0,
            failed: 0,
        }
    }

    pub fn codec(&self) -> &PersistenceCodec {
        &self.codec
    }

    /// A save is waiting for its tick.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fired saves not yet written, including the running one.
    pub fn in_flight(&self) -> usize {
        self.queued.len() + usize::from(self.writing.is_some())
    }

    /// Queue a save of `snapshot` for `now + delay`.  Supersedes any save
    /// still waiting.
    pub fn schedule(&mut self, key: &str, snapshot: RgbaImage, now: u64, delay: u64) {
        self.pending = Some(PendingSave {
            key: key.to_string(),
            snapshot,
            due_tick: now.saturating_add(delay),
        });
    }

    /// Drop a waiting save without writing it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Fire the waiting save if it is due and collect finished writes.
    pub fn poll(&mut self, now: u64) {
        self.drain_results();
        if self.pending.as_ref().is_some_and(|p| p.due_tick <= now)
            && let Some(job) = self.pending.take()
        {
            self.enqueue(job);
        }
        self.start_next();
    }

    /// Hand the waiting save (if any) to the background writer right away,
    /// without blocking.  Used when the artwork changes under it.
    pub fn dispatch_pending(&mut self) {
        self.drain_results();
        if let Some(job) = self.pending.take() {
            self.enqueue(job);
        }
        self.start_next();
    }

    /// Block until nothing fired for `key` is still unwritten.  Used before
    /// reading `key` back.
    pub fn settle(&mut self, key: &str) {
        while self.writing.as_deref() == Some(key) || self.queued.iter().any(|q| q.key == key) {
            if !self.wait_one() {
                break;
            }
            self.start_next();
        }
    }

    /// Write any waiting save and block until every fired save has been
    /// written.  Used on suspend and shutdown.
    pub fn flush_now(&mut self) {
        if let Some(job) = self.pending.take() {
            self.enqueue(job);
        }
        while self.writing.is_some() {
            if !self.wait_one() {
                break;
            }
        }
        while let Some(job) = self.queued.pop_front() {
            let result = Self::write(&self.codec, job.key, &job.snapshot);
            self.record(result);
        }
    }

    fn enqueue(&mut self, job: PendingSave) {
        self.queued.retain(|q| q.key != job.key);
        self.queued.push_back(job);
    }

    fn start_next(&mut self) {
        if self.writing.is_some() {
            return;
        }
        let Some(job) = self.queued.pop_front() else { return };
        let codec = self.codec.clone();
        let tx = self.result_tx.clone();
        self.writing = Some(job.key.clone());
        rayon::spawn(move || {
            let result = Self::write(&codec, job.key, &job.snapshot);
            let _ = tx.send(result);
        });
    }

    fn write(codec: &PersistenceCodec, key: String, snapshot: &RgbaImage) -> SaveResult {
        match codec.save(&key, snapshot) {
            Ok(()) => SaveResult::Saved { key },
            Err(e) => SaveResult::Failed { key, error: e.to_string() },
        }
    }

    /// Block for the running write.  False if nothing is running.
    fn wait_one(&mut self) -> bool {
        if self.writing.is_none() {
            return false;
        }
        // The scheduler holds a sender, so `recv` only returns with a result.
        match self.result_rx.recv() {
            Ok(result) => {
                self.writing = None;
                self.record(result);
                true
            }
            Err(_) => false,
        }
    }

    fn drain_results(&mut self) {
        while let Ok(result) = self.result_rx.try_recv() {
            self.writing = None;
            self.record(result);
        }
    }

    fn record(&mut self, result: SaveResult) {
        match result {
            SaveResult::Saved { key } => {
                self.saved += 1;
                log_info!("Saved progress '{}'", key);
            }
            SaveResult::Failed { key, error } => {
                self.failed += 1;
                log_err!("Failed to save progress '{}': {}", key, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 17) as u8, (y * 31) as u8, 7, if x == 0 { 128 } else { 255 }]))
    }

    fn memory_codec() -> (Arc<MemoryStore>, PersistenceCodec) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PersistenceCodec::new(store))
    }

    #[test]
    fn png_round_trip_is_exact() {
        let img = sample(9, 5);
        let bytes = encode_png(&img).unwrap();
        assert_eq!(decode_png(&bytes).unwrap(), img);
    }

    #[test]
    fn missing_and_corrupt_saves_load_as_none() {
        let (store, codec) = memory_codec();
        assert!(codec.load("FruitDrawing_1", 4, 4).is_none());
        store.insert_raw("FruitDrawing_1", b"not a png".to_vec());
        assert!(matches!(codec.try_load("FruitDrawing_1", 4, 4), Err(PersistError::Codec(_))));
        assert!(codec.load("FruitDrawing_1", 4, 4).is_none());
    }

    #[test]
    fn wrong_size_save_is_rejected() {
        let (_, codec) = memory_codec();
        codec.save("k", &sample(3, 3)).unwrap();
        assert!(matches!(codec.try_load("k", 4, 4), Err(PersistError::SizeMismatch { .. })));
        assert_eq!(codec.load("k", 3, 3), Some(sample(3, 3)));
    }

    #[test]
    fn scheduled_save_waits_for_its_tick() {
        let (store, codec) = memory_codec();
        let mut saves = SaveScheduler::new(codec);
        saves.schedule("k", sample(2, 2), 5, 1);
        saves.poll(5);
        assert!(saves.has_pending());
        saves.poll(6);
        assert!(!saves.has_pending());
        saves.flush_now();
        assert!(store.contains("k"));
        assert_eq!(saves.saved, 1);
    }

    #[test]
    fn newer_schedule_supersedes_older() {
        let (_, codec) = memory_codec();
        let mut saves = SaveScheduler::new(codec.clone());
        saves.schedule("k", sample(2, 2), 0, 3);
        saves.schedule("k", sample(4, 4), 1, 3);
        saves.flush_now();
        assert_eq!(saves.saved, 1);
        assert_eq!(codec.load("k", 4, 4), Some(sample(4, 4)));
    }

    /// Store whose first write stalls, so later writes would overtake it if
    /// they were allowed to run alongside.
    #[derive(Default)]
    struct StallFirstWrite {
        inner: MemoryStore,
        stalled: AtomicBool,
    }

    impl KeyValueStore for StallFirstWrite {
        fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(300));
            }
            self.inner.write(key, bytes)
        }

        fn read(&self, key: &str) -> Result<Vec<u8>, PersistError> {
            self.inner.read(key)
        }
    }

    fn solid(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([v, v, v, 255]))
    }

    #[test]
    fn slow_older_write_never_overwrites_newer_save() {
        let codec = PersistenceCodec::new(Arc::new(StallFirstWrite::default()));
        let mut saves = SaveScheduler::new(codec.clone());
        saves.schedule("FruitDrawing_4", solid(1), 0, 1);
        saves.poll(1);
        saves.schedule("FruitDrawing_4", solid(2), 1, 1);
        saves.poll(2);
        assert_eq!(saves.in_flight(), 2);
        saves.flush_now();
        assert_eq!(saves.in_flight(), 0);
        assert_eq!(saves.saved, 2);
        assert_eq!(codec.load("FruitDrawing_4", 2, 2), Some(solid(2)));
    }

    #[test]
    fn queued_save_is_replaced_by_newer_one_for_same_key() {
        let codec = PersistenceCodec::new(Arc::new(StallFirstWrite::default()));
        let mut saves = SaveScheduler::new(codec.clone());
        saves.schedule("k", solid(1), 0, 0);
        saves.poll(0);
        saves.schedule("k", solid(2), 0, 0);
        saves.poll(0);
        saves.schedule("other", solid(9), 0, 0);
        saves.dispatch_pending();
        saves.schedule("k", solid(3), 0, 0);
        saves.poll(0);
        assert_eq!(saves.in_flight(), 3);
        saves.settle("k");
        assert_eq!(codec.load("k", 2, 2), Some(solid(3)));
        saves.flush_now();
        assert_eq!(saves.saved, 3);
        assert_eq!(codec.load("other", 2, 2), Some(solid(9)));
    }

    #[test]
    fn failed_write_is_counted_not_fatal() {
        let (store, codec) = memory_codec();
        store.set_fail_writes(true);
        let mut saves = SaveScheduler::new(codec);
        saves.schedule("k", sample(2, 2), 0, 0);
        saves.poll(0);
        saves.flush_now();
        assert_eq!(saves.failed, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_appends_png_extension() {
        let dir = std::env::temp_dir().join(format!("colorbook-store-{}", std::process::id()));
        let store = FileStore::new(&dir);
        assert!(matches!(store.read("Mode3Drawing_2"), Err(PersistError::NotFound(_))));
        store.write("Mode3Drawing_2", b"abc").unwrap();
        assert!(dir.join("Mode3Drawing_2.png").exists());
        assert_eq!(store.read("Mode3Drawing_2").unwrap(), b"abc");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
