//! Reuse of nearby, previously seen coordinates
//!
//! Queries within the match radius of a stored coordinate resolve to that
//! stored coordinate, so repeat requests for roughly the same spot share one
//! cached dataset.

use crate::error::{ForecastError, Result};
use crate::location::Coordinate;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Persistent collection of accepted coordinates
///
/// Entries are only ever added.
pub trait CoordinateStore: Send + Sync {
    /// Read every stored coordinate
    fn load(&self) -> Result<Vec<Coordinate>>;

    /// Atomically read, modify and save the stored set
    ///
    /// `apply` returns whether it changed the set. Unreadable entries are
    /// skipped; a store that fails to decode as a whole is handed to `apply`
    /// as empty.
    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Coordinate>) -> bool) -> Result<()>;

    /// Append one coordinate
    fn append(&self, coordinate: Coordinate) -> Result<()> {
        self.update(&mut |known| {
            known.push(coordinate);
            true
        })
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryCoordinateStore {
    known: Mutex<Vec<Coordinate>>,
}

impl MemoryCoordinateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coordinates(known: Vec<Coordinate>) -> Self {
        Self {
            known: Mutex::new(known),
        }
    }
}

impl CoordinateStore for MemoryCoordinateStore {
    fn load(&self) -> Result<Vec<Coordinate>> {
        Ok(lock_ignoring_poison(&self.known).clone())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Coordinate>) -> bool) -> Result<()> {
        let mut known = lock_ignoring_poison(&self.known);
        apply(&mut known);
        Ok(())
    }
}

/// Decoded store contents
struct StoreContents {
    known: Vec<Coordinate>,
    /// Entries that did not decode to a valid coordinate
    skipped: usize,
}

/// JSON file store: `[{"lat": .., "lon": ..}, ..]`
///
/// Updates hold an in-process mutex and a `<file>.lock` sidecar so separate
/// processes sharing the file serialize too. A sidecar older than the stale
/// age is left over from a writer that died and is removed. New contents
/// replace the file by atomic rename; a file with unreadable content is first
/// moved aside to `<file>.corrupt-<UTC stamp>`.
#[derive(Debug)]
pub struct JsonCoordinateStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_lock_age: Duration,
    guard: Mutex<()>,
}

impl JsonCoordinateStore {
    /// Default time to wait for another writer's lock file
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default age after which a lock file is considered abandoned
    pub const DEFAULT_STALE_LOCK_AGE: Duration = Duration::from_secs(30);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            stale_lock_age: Self::DEFAULT_STALE_LOCK_AGE,
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.stale_lock_age = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read(&self) -> Result<StoreContents> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(StoreContents {
                    known: Vec::new(),
                    skipped: 0,
                })
            }
            Err(e) => return Err(ForecastError::corruption(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(StoreContents {
                known: Vec::new(),
                skipped: 0,
            });
        }

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| ForecastError::corruption(&self.path, e))?;

        let mut known = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for (index, entry) in entries.into_iter().enumerate() {
            let decoded = serde_json::from_value::<Coordinate>(entry)
                .map_err(ForecastError::from)
                .and_then(Coordinate::validated);
            match decoded {
                Ok(coordinate) => known.push(coordinate),
                Err(e) => {
                    warn!(path = %self.path.display(), index, error = %e, "Skipping unreadable coordinate entry");
                    skipped += 1;
                }
            }
        }
        Ok(StoreContents { known, skipped })
    }

    /// Move the current file to `<file>.corrupt-<stamp>`
    fn quarantine(&self) -> Result<PathBuf> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")));
        let backup = PathBuf::from(name);
        fs::rename(&self.path, &backup)?;
        Ok(backup)
    }

    fn write(&self, known: &[Coordinate]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, known)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Held lock file; removed on drop
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf, timeout: Duration, stale_age: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = Self { path };
                    // holder pid, for whoever finds a leftover lock
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_age(&path).is_some_and(|age| age >= stale_age) {
                        warn!(path = %path.display(), "Removing stale lock file");
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(ForecastError::IoError(io::Error::new(
                            ErrorKind::TimedOut,
                            format!("timed out waiting for {}", path.display()),
                        )));
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

impl CoordinateStore for JsonCoordinateStore {
    fn load(&self) -> Result<Vec<Coordinate>> {
        self.read().map(|contents| contents.known)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Vec<Coordinate>) -> bool) -> Result<()> {
        let _in_process = lock_ignoring_poison(&self.guard);
        let _on_disk = LockFile::acquire(self.lock_path(), self.lock_timeout, self.stale_lock_age)?;

        let (mut known, damaged) = match self.read() {
            Ok(contents) => (contents.known, contents.skipped > 0),
            Err(e) => {
                warn!(error = %e, "Coordinate store unreadable");
                (Vec::new(), true)
            }
        };

        if apply(&mut known) {
            if damaged {
                let backup = self.quarantine()?;
                warn!(backup = %backup.display(), "Moved unreadable coordinate store aside");
            }
            self.write(&known)?;
            debug!(path = %self.path.display(), entries = known.len(), "Saved coordinate store");
        }
        Ok(())
    }
}

/// Outcome of a coordinate lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Whether a stored coordinate was within the match radius
    pub found: bool,
    /// The stored coordinate on a hit, otherwise the query itself
    pub coordinate: Coordinate,
}

/// Matches query points against the stored coordinate set
#[derive(Debug)]
pub struct CoordinateResolver<S> {
    store: S,
    radius_km: f64,
}

impl<S: CoordinateStore> CoordinateResolver<S> {
    pub fn new(store: S, radius_km: f64) -> Self {
        Self { store, radius_km }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Find a stored coordinate within the match radius of `query`
    ///
    /// Never fails: an unreadable store counts as empty.
    pub fn find_existing(&self, query: Coordinate) -> Resolution {
        let known = match self.store.load() {
            Ok(known) => known,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Ignoring unreadable coordinate store");
                Vec::new()
            }
        };

        match nearest_within(&known, &query, self.radius_km) {
            Some((stored, distance)) => {
                info!(query = %query, stored = %stored, distance_km = distance, "Reusing stored coordinate");
                Resolution {
                    found: true,
                    coordinate: stored,
                }
            }
            None => Resolution {
                found: false,
                coordinate: query,
            },
        }
    }

    /// Add `coordinate` to the store unless a nearby one appeared meanwhile
    ///
    /// Returns the coordinate that now represents this location.
    pub fn register(&self, coordinate: Coordinate) -> Result<Coordinate> {
        let radius = self.radius_km;
        let mut resolved = coordinate;
        let mut appended = false;

        self.store.update(&mut |known| {
            if let Some((stored, _)) = nearest_within(known, &coordinate, radius) {
                resolved = stored;
            } else {
                known.push(coordinate);
                appended = true;
            }
            appended
        })?;

        if appended {
            info!(coordinate = %coordinate, "Registered new coordinate");
        } else {
            debug!(coordinate = %coordinate, existing = %resolved, "Coordinate already registered nearby");
        }
        Ok(resolved)
    }
}

fn nearest_within(
    known: &[Coordinate],
    query: &Coordinate,
    radius_km: f64,
) -> Option<(Coordinate, f64)> {
    known
        .iter()
        .map(|c| (*c, c.distance_km(query)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|(_, distance)| *distance <= radius_km)
}
