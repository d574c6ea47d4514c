//! Engine Module
//!
//! The Mantle: an unbounded 3D typed store paged into region files.
//!
//! ## Responsibilities
//! - Resolve block coordinates to region → chunk → section → cell
//! - Load regions on first touch, at most once per region
//! - Flush idle regions to disk and evict them (`trim`)
//! - Flush everything on `save_all` / `close`
//!
//! ## Region Resolution
//! ```text
//!   key = pack(regionX, regionZ)
//!        │
//!        ├─ no flush in progress? ── cached? ──▶ done (read lock only)
//!        │
//!        ▼
//!   lock(key) ── cached? ──▶ done
//!        │
//!        ├─ file exists? ── read ok ──▶ insert
//!        │                  └─ corrupt ─▶ log, fresh region, insert
//!        └─ no file ─────────────────────▶ fresh region, insert
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};

use crate::codec::{pack, BlockPos, REGION_MASK};
use crate::config::MantleConfig;
use crate::error::{MantleError, Result};
use crate::matter::{MatterValue, TypedSlice};
use crate::parallel::{GridLock, GridLockExt, HyperLock, MultiBurst, NoopLock};
use crate::storage::{MantleChunk, MantleFlag, Region, SectionFactory};
use crate::writer::BoundedWriter;

/// A cached region and the last time anything resolved it
struct LoadedRegion {
    region: Arc<Region>,
    last_use: AtomicU64,
}

impl LoadedRegion {
    fn new(region: Arc<Region>, now: u64) -> Self {
        Self {
            region,
            last_use: AtomicU64::new(now),
        }
    }
}

/// Marks a structural cache change in progress for the lifetime of the value
struct IoScope<'a>(&'a AtomicUsize);

impl<'a> IoScope<'a> {
    fn enter(active: &'a AtomicUsize, epoch: &AtomicU64) -> Self {
        epoch.fetch_add(1, Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for IoScope<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The top-level store
///
/// ## Concurrency Model
///
/// - **Region cache**: `RwLock<HashMap>`; hits take the read side only
/// - **Region loads**: serialized per region key by the grid lock, so two
///   threads racing on a new region end up sharing one object
/// - **Structural ops** (`trim`, `save_all`, `close`): serialized by
///   `structural`; while one runs, every resolution takes the locked path
/// - **Cells**: each chunk section has its own mutex, so the engine adds no
///   locking beyond region resolution
pub struct Mantle {
    config: MantleConfig,
    factory: Arc<SectionFactory>,
    regions: RwLock<HashMap<i64, LoadedRegion>>,
    lock: Box<dyn GridLock>,
    io_burst: MultiBurst,
    closed: AtomicBool,
    io_active: AtomicUsize,
    /// Bumped whenever a structural op starts
    io_epoch: AtomicU64,
    structural: Mutex<()>,
    epoch: Instant,
}

impl Mantle {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const REGION_PREFIX: &'static str = "p.";
    const REGION_SUFFIX: &'static str = ".ttp";

    /// Open or create a store with the given config
    pub fn open(config: MantleConfig) -> Result<Self> {
        if config.world_height == 0 {
            return Err(MantleError::Config(
                "world height must be at least 1".to_string(),
            ));
        }

        fs::create_dir_all(&config.data_dir)?;

        let lock: Box<dyn GridLock> = if config.lock_regions {
            Box::new(HyperLock::new())
        } else {
            Box::new(NoopLock)
        };
        let io_burst = MultiBurst::new(config.io_threads, config.multicore)?;
        let factory = Arc::new(SectionFactory::new(
            Arc::clone(&config.registry),
            config.author.clone(),
        ));

        tracing::debug!(
            "Opened mantle at {:?} (height {}, types {:?})",
            config.data_dir,
            config.world_height,
            config.registry
        );

        Ok(Self {
            config,
            factory,
            regions: RwLock::new(HashMap::new()),
            lock,
            io_burst,
            closed: AtomicBool::new(false),
            io_active: AtomicUsize::new(0),
            io_epoch: AtomicU64::new(0),
            structural: Mutex::new(()),
            epoch: Instant::now(),
        })
    }

    /// Open with a folder and world height (convenience method)
    ///
    /// Uses the default config otherwise
    pub fn new(data_dir: impl Into<PathBuf>, world_height: usize) -> Result<Self> {
        Self::open(
            MantleConfig::builder()
                .data_dir(data_dir)
                .world_height(world_height)
                .build(),
        )
    }

    // =========================================================================
    // Cell Operations
    // =========================================================================

    /// Read the `T` at a block coordinate.
    ///
    /// A y outside the world or a coordinate with no data yet is `Ok(None)`.
    /// Never loads or creates a region that has no file.
    pub fn get<T: MatterValue>(&self, x: i32, y: i32, z: i32) -> Result<Option<T>> {
        self.ensure_open()?;
        self.config.registry.require::<T>()?;

        if !self.in_height(y) {
            return Ok(None);
        }

        let pos = BlockPos::new(x, y, z);
        if !self.plate_exists(pos.region_x(), pos.region_z()) {
            return Ok(None);
        }

        let region = self.region(pos.region_x(), pos.region_z())?;
        let Some(chunk) = region.get(pos.region_local_x(), pos.region_local_z()) else {
            return Ok(None);
        };
        let Some(section) = chunk.get(pos.section()) else {
            return Ok(None);
        };

        let value = section
            .get::<T>(pos.local_x(), pos.local_y(), pos.local_z())
            .cloned();
        Ok(value)
    }

    /// Store `value` at a block coordinate, creating the region, chunk and
    /// section as needed. A y outside the world is dropped.
    pub fn set<T: MatterValue>(&self, x: i32, y: i32, z: i32, value: T) -> Result<()> {
        self.ensure_open()?;
        self.config.registry.require::<T>()?;

        if !self.in_height(y) {
            return Ok(());
        }

        let pos = BlockPos::new(x, y, z);
        let region = self.region(pos.region_x(), pos.region_z())?;
        let chunk = region.get_or_create(pos.region_local_x(), pos.region_local_z());
        let mut section = chunk.get_or_create(pos.section())?;
        section.set(pos.local_x(), pos.local_y(), pos.local_z(), value)
    }

    /// Empty the `T` cell at a block coordinate, returning what was there.
    /// Creates nothing.
    pub fn remove<T: MatterValue>(&self, x: i32, y: i32, z: i32) -> Result<Option<T>> {
        self.ensure_open()?;
        self.config.registry.require::<T>()?;

        if !self.in_height(y) {
            return Ok(None);
        }

        let pos = BlockPos::new(x, y, z);
        if !self.plate_exists(pos.region_x(), pos.region_z()) {
            return Ok(None);
        }

        let region = self.region(pos.region_x(), pos.region_z())?;
        let Some(chunk) = region.get(pos.region_local_x(), pos.region_local_z()) else {
            return Ok(None);
        };
        let Some(mut section) = chunk.get(pos.section()) else {
            return Ok(None);
        };

        let removed = section.remove::<T>(pos.local_x(), pos.local_y(), pos.local_z());
        Ok(removed)
    }

    /// Write every occupied cell of `slice` with its origin at `(x, y, z)`
    pub fn paste_slice<T: MatterValue>(&self, x: i32, y: i32, z: i32, slice: &TypedSlice<T>) -> Result<()> {
        for (sx, sy, sz, value) in slice.iter() {
            self.set(
                x.wrapping_add(sx as i32),
                y.wrapping_add(sy as i32),
                z.wrapping_add(sz as i32),
                value.clone(),
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Chunk Operations
    // =========================================================================

    /// The chunk at chunk coordinate `(cx, cz)`, created if absent.
    ///
    /// Its region stays cached while the handle is alive.
    pub fn get_chunk(&self, cx: i32, cz: i32) -> Result<Arc<MantleChunk>> {
        self.resolve_chunk(cx, cz).map(|(_, chunk)| chunk)
    }

    /// The chunk at `(cx, cz)` if its region has data and the chunk exists
    fn existing_chunk(&self, cx: i32, cz: i32) -> Result<Option<Arc<MantleChunk>>> {
        self.ensure_open()?;

        let (rx, rz) = (cx >> 5, cz >> 5);
        if !self.plate_exists(rx, rz) {
            return Ok(None);
        }

        let region = self.region(rx, rz)?;
        Ok(region.get(local(cx), local(cz)))
    }

    /// Blank a chunk: every section detached, every flag lowered
    pub fn delete_chunk(&self, cx: i32, cz: i32) -> Result<()> {
        if let Some(chunk) = self.existing_chunk(cx, cz)? {
            chunk.delete();
        }
        Ok(())
    }

    /// Drop the `T` slice from every section of a chunk
    pub fn delete_chunk_slice<T: MatterValue>(&self, cx: i32, cz: i32) -> Result<()> {
        self.config.registry.require::<T>()?;
        if let Some(chunk) = self.existing_chunk(cx, cz)? {
            chunk.delete_slices::<T>();
        }
        Ok(())
    }

    /// Visit every `T` in a chunk with world block coordinates
    pub fn iterate_chunk<T, F>(&self, cx: i32, cz: i32, mut visitor: F) -> Result<()>
    where
        T: MatterValue,
        F: FnMut(i32, i32, i32, &T),
    {
        self.config.registry.require::<T>()?;
        let Some(chunk) = self.existing_chunk(cx, cz)? else {
            return Ok(());
        };

        let (base_x, base_z) = (cx.wrapping_shl(4), cz.wrapping_shl(4));
        chunk.iterate::<T, _>(|x, y, z, value| {
            visitor(base_x + x as i32, y as i32, base_z + z as i32, value)
        });
        Ok(())
    }

    pub fn is_chunk_loaded(&self, cx: i32, cz: i32) -> bool {
        self.regions
            .read()
            .get(&pack(cx >> 5, cz >> 5))
            .map(|loaded| loaded.region.get(local(cx), local(cz)).is_some())
            .unwrap_or(false)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Set or clear a chunk flag
    pub fn flag(&self, cx: i32, cz: i32, flag: MantleFlag, flagged: bool) -> Result<()> {
        self.get_chunk(cx, cz)?.flag(flag, flagged);
        Ok(())
    }

    pub fn has_flag(&self, cx: i32, cz: i32, flag: MantleFlag) -> Result<bool> {
        Ok(self
            .existing_chunk(cx, cz)?
            .map(|chunk| chunk.is_flagged(flag))
            .unwrap_or(false))
    }

    /// Raise `flag` and run `action` only if it was not raised before.
    /// Returns whether the action ran.
    pub fn raise_flag(&self, cx: i32, cz: i32, flag: MantleFlag, action: impl FnOnce()) -> Result<bool> {
        if self.get_chunk(cx, cz)?.raise_flag(flag) {
            action();
            return Ok(true);
        }
        Ok(false)
    }

    /// Lower `flag` and run `action` only if it was raised before.
    /// Returns whether the action ran.
    pub fn lower_flag(&self, cx: i32, cz: i32, flag: MantleFlag, action: impl FnOnce()) -> Result<bool> {
        let lowered = self
            .existing_chunk(cx, cz)?
            .map(|chunk| chunk.lower_flag(flag))
            .unwrap_or(false);

        if lowered {
            action();
        }
        Ok(lowered)
    }

    // =========================================================================
    // Bulk Writers
    // =========================================================================

    /// A writer caching every chunk within `radius` chunks of `(cx, cz)`
    pub fn write(&self, cx: i32, cz: i32, radius: u32) -> Result<BoundedWriter<'_>> {
        BoundedWriter::bounded(self, cx, cz, radius)
    }

    /// A writer with no bound that caches chunks as it touches them
    pub fn write_infinite(&self) -> Result<BoundedWriter<'_>> {
        BoundedWriter::infinite(self)
    }

    // =========================================================================
    // Regions
    // =========================================================================

    /// Whether region `(x, z)` is cached or has a file, without loading it
    pub fn has_tectonic_plate(&self, x: i32, z: i32) -> bool {
        self.regions.read().contains_key(&pack(x, z)) || self.region_path(x, z).exists()
    }

    /// [`Mantle::has_tectonic_plate`] that also sees a region trim has taken
    /// out of the cache but not yet written. A negative answer seen while a
    /// structural op may be running is confirmed under the region key lock.
    fn plate_exists(&self, x: i32, z: i32) -> bool {
        let epoch = self.io_epoch.load(Ordering::SeqCst);
        let active = self.io_active.load(Ordering::SeqCst);

        if self.has_tectonic_plate(x, z) {
            return true;
        }
        if active == 0 && self.io_epoch.load(Ordering::SeqCst) == epoch {
            return false;
        }

        self.lock
            .with_long(pack(x, z), || self.has_tectonic_plate(x, z))
    }

    /// Path of the file backing region `(x, z)`
    pub fn region_path(&self, x: i32, z: i32) -> PathBuf {
        self.config.data_dir.join(format!(
            "{}{}{}",
            Self::REGION_PREFIX,
            pack(x, z),
            Self::REGION_SUFFIX
        ))
    }

    /// Resolve region `(x, z)`, loading or creating it on a miss
    pub(crate) fn region(&self, x: i32, z: i32) -> Result<Arc<Region>> {
        self.ensure_open()?;
        let key = pack(x, z);

        if self.io_active.load(Ordering::SeqCst) == 0 {
            if let Some(region) = self.cached(key) {
                return Ok(region);
            }
        }

        self.lock.with_long(key, || self.load_or_create(x, z, key))
    }

    /// Region handle and chunk handle for chunk `(cx, cz)`, both created if absent
    pub(crate) fn resolve_chunk(&self, cx: i32, cz: i32) -> Result<(Arc<Region>, Arc<MantleChunk>)> {
        let region = self.region(cx >> 5, cz >> 5)?;
        let chunk = region.get_or_create(local(cx), local(cz));
        Ok((region, chunk))
    }

    fn cached(&self, key: i64) -> Option<Arc<Region>> {
        let regions = self.regions.read();
        regions.get(&key).map(|loaded| {
            loaded.last_use.store(self.now(), Ordering::Relaxed);
            Arc::clone(&loaded.region)
        })
    }

    /// Called with the key lock held
    fn load_or_create(&self, x: i32, z: i32, key: i64) -> Result<Arc<Region>> {
        if let Some(region) = self.cached(key) {
            return Ok(region);
        }

        let path = self.region_path(x, z);
        let region = if path.exists() {
            match Region::read_file(self.config.world_height, &path, Arc::clone(&self.factory)) {
                Ok(region) => {
                    tracing::debug!("Loaded region {},{} ({} chunks)", x, z, region.chunk_count());
                    region
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to read region {},{} from {:?}, starting it empty: {}",
                        x,
                        z,
                        path,
                        e
                    );
                    Region::new(self.config.world_height, x, z, Arc::clone(&self.factory))
                }
            }
        } else {
            tracing::debug!("Created region {},{}", x, z);
            Region::new(self.config.world_height, x, z, Arc::clone(&self.factory))
        };

        let region = Arc::new(region);
        let mut regions = self.regions.write();
        // close() flips the flag before evicting, so nothing lands after it
        if self.is_closed() {
            return Err(MantleError::Closed);
        }
        regions.insert(key, LoadedRegion::new(Arc::clone(&region), self.now()));
        Ok(region)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Flush and evict every region idle for at least `idle`.
    ///
    /// A region still referenced elsewhere (an in-flight operation, a
    /// bounded writer or a chunk handle from [`Mantle::get_chunk`]) is
    /// skipped. A region whose write fails stays cached
    /// and the call returns [`MantleError::Flush`].
    pub fn trim(&self, idle: Duration) -> Result<()> {
        self.ensure_open()?;
        let _structural = self.structural.lock();
        let _io = IoScope::enter(&self.io_active, &self.io_epoch);

        let idle_ms = idle.as_millis() as u64;
        let now = self.now();
        let candidates: Vec<(i64, i32, i32)> = self
            .regions
            .read()
            .iter()
            .filter(|(_, loaded)| now.saturating_sub(loaded.last_use.load(Ordering::Relaxed)) >= idle_ms)
            .map(|(key, loaded)| (*key, loaded.region.x(), loaded.region.z()))
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        let total = candidates.len();
        let evicted = AtomicUsize::new(0);
        let failures = SegQueue::new();

        let mut burst = self.io_burst.burst(total);
        for (key, x, z) in candidates {
            let evicted = &evicted;
            let failures = &failures;
            burst.queue(move || {
                let _guard = self.lock.lock_key(key);

                let region = {
                    let mut regions = self.regions.write();
                    let Some(loaded) = regions.get(&key) else {
                        return;
                    };
                    let idle_for = self.now().saturating_sub(loaded.last_use.load(Ordering::Relaxed));
                    if idle_for < idle_ms || is_pinned(&loaded.region) {
                        return;
                    }
                    match regions.remove(&key) {
                        Some(loaded) => loaded.region,
                        None => return,
                    }
                };

                match region.write_file(&self.region_path(x, z)) {
                    Ok(()) => {
                        evicted.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::error!("Failed to write region {},{}: {}", x, z, e);
                        self.regions
                            .write()
                            .insert(key, LoadedRegion::new(region, self.now()));
                        failures.push(key);
                    }
                }
            });
        }
        burst.complete();

        tracing::debug!(
            "Trimmed {} of {} idle regions ({} still cached)",
            evicted.load(Ordering::Relaxed),
            total,
            self.loaded_region_count()
        );

        flush_result(failures.len(), total)
    }

    /// Flush every cached region without evicting anything
    pub fn save_all(&self) -> Result<()> {
        self.ensure_open()?;
        let _structural = self.structural.lock();
        let _io = IoScope::enter(&self.io_active, &self.io_epoch);

        let targets = self.snapshot();
        let total = targets.len();
        let failures = SegQueue::new();

        let mut burst = self.io_burst.burst(total);
        for (key, region) in &targets {
            let failures = &failures;
            burst.queue(move || {
                if !self.write_region(region) {
                    failures.push(*key);
                }
            });
        }
        burst.complete();

        tracing::debug!("Saved {} regions", total - failures.len());
        flush_result(failures.len(), total)
    }

    /// Flush every cached region, evict it and refuse all further use.
    ///
    /// Regions whose write fails stay cached; calling `close` again retries
    /// them. Closing a closed store with nothing left to flush is a no-op.
    pub fn close(&self) -> Result<()> {
        let _structural = self.structural.lock();
        let was_closed = self.closed.swap(true, Ordering::SeqCst);
        let _io = IoScope::enter(&self.io_active, &self.io_epoch);

        let targets = self.snapshot();
        if targets.is_empty() {
            if !was_closed {
                tracing::debug!("Closed mantle at {:?}", self.config.data_dir);
            }
            return Ok(());
        }

        let total = targets.len();
        let failures = SegQueue::new();

        let mut burst = self.io_burst.burst(total);
        for (key, region) in &targets {
            let failures = &failures;
            burst.queue(move || {
                if self.write_region(region) {
                    self.regions.write().remove(key);
                } else {
                    failures.push(*key);
                }
            });
        }
        burst.complete();

        tracing::debug!(
            "Closed mantle at {:?}, flushed {} of {} regions",
            self.config.data_dir,
            total - failures.len(),
            total
        );
        flush_result(failures.len(), total)
    }

    fn snapshot(&self) -> Vec<(i64, Arc<Region>)> {
        self.regions
            .read()
            .iter()
            .map(|(key, loaded)| (*key, Arc::clone(&loaded.region)))
            .collect()
    }

    /// Write one region to its file, logging any failure
    fn write_region(&self, region: &Region) -> bool {
        match region.write_file(&self.region_path(region.x(), region.z())) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to write region {},{}: {}", region.x(), region.z(), e);
                false
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn loaded_region_count(&self) -> usize {
        self.regions.read().len()
    }

    pub fn world_height(&self) -> usize {
        self.config.world_height
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &MantleConfig {
        &self.config
    }

    /// Toggle parallel batch I/O at runtime
    pub fn set_multicore(&self, multicore: bool) {
        self.io_burst.set_multicore(multicore);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(MantleError::Closed);
        }
        Ok(())
    }

    pub(crate) fn in_height(&self, y: i32) -> bool {
        y >= 0 && (y as usize) < self.config.world_height
    }

    fn now(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Drop for Mantle {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }

        tracing::warn!("Mantle at {:?} dropped without close, flushing", self.config.data_dir);
        if let Err(e) = self.close() {
            tracing::error!("Flush on drop failed: {}", e);
        }
    }
}

impl std::fmt::Debug for Mantle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mantle")
            .field("data_dir", &self.config.data_dir)
            .field("world_height", &self.config.world_height)
            .field("loaded_regions", &self.loaded_region_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Chunk offset inside its region
fn local(chunk: i32) -> usize {
    (chunk & REGION_MASK) as usize
}

/// Whether anything outside the cache still holds the region or one of its
/// chunks. Checked under the cache write lock, so no new handle can appear.
fn is_pinned(region: &Arc<Region>) -> bool {
    Arc::strong_count(region) > 1 || region.has_chunk_handles()
}

fn flush_result(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        return Err(MantleError::Flush { failed, total });
    }
    Ok(())
}
