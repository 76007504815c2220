use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use lunacast::cache::{DatasetCache, DatasetKey, MANIFEST_FILE, MERGED_FILE};
use lunacast::data::DailySeries;
use lunacast::ingest::{DataSource, SyntheticSource};
use lunacast::location::Coordinate;
use lunacast::models::{AIR_TEMP, PRESSURE, WATER_TEMP, WIND_SPEED};
use lunacast::{ForecastError, Result};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

/// Synthetic source that counts fetches
struct CountingSource {
    inner: SyntheticSource,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            inner: SyntheticSource::new(11),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate) -> Result<DailySeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(coordinate, start, end)
    }
}

struct FailingSource;

impl DataSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch(&self, _: &Coordinate, _: NaiveDate, _: NaiveDate) -> Result<DailySeries> {
        Err(ForecastError::unavailable("failing", "offline"))
    }
}

fn key() -> DatasetKey {
    DatasetKey::new(
        "fishing",
        Coordinate::new(50.45012, 30.52338).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_key_layout() {
    let key = key();
    assert_eq!(
        key.relative_dir(),
        std::path::PathBuf::from("fishing/latn50_4501_lone30_5234/asof_20250107")
    );
    assert!(DatasetKey::new("Fishing Trip", key.coordinate(), key.asof()).is_err());
    assert!(DatasetKey::new("", key.coordinate(), key.asof()).is_err());
}

#[test]
fn test_second_ensure_hits_cache() {
    let dir = tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), 30, CountingSource::new());

    let first = cache.ensure(&key()).unwrap();
    let second = cache.ensure(&key()).unwrap();

    assert_eq!(cache.source().calls(), 1);
    assert_eq!(first.dates(), second.dates());
    assert_eq!(first.moon_phases(), second.moon_phases());
    for (a, b) in first
        .column(AIR_TEMP)
        .unwrap()
        .iter()
        .zip(second.column(AIR_TEMP).unwrap())
    {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
    assert_eq!(first.len(), 30);
    assert_eq!(first.last_date(), Some(key().asof()));
    for column in [AIR_TEMP, PRESSURE, WIND_SPEED, WATER_TEMP] {
        assert!(first.column(column).is_some(), "missing {}", column);
    }
}

#[test]
fn test_manifest_describes_dataset() {
    let dir = tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), 30, CountingSource::new());
    cache.ensure(&key()).unwrap();

    let dataset = cache.dataset_dir(&key());
    assert!(dataset.join(MERGED_FILE).exists());
    assert!(dataset.join(MANIFEST_FILE).exists());

    let manifest = cache.manifest(&key()).unwrap();
    assert_eq!(manifest.activity, "fishing");
    assert_eq!(manifest.latitude, 50.4501);
    assert_eq!(manifest.longitude, 30.5234);
    assert_eq!(manifest.asof, key().asof());
    assert_eq!(manifest.source, "counting");
    assert_eq!(manifest.start_date, NaiveDate::from_ymd_opt(2024, 12, 9).unwrap());
    assert_eq!(manifest.end_date, key().asof());
    assert_eq!(manifest.files, vec![MERGED_FILE.to_string()]);
    assert!(manifest.columns.contains(&WATER_TEMP.to_string()));
}

#[test]
fn test_corrupt_merged_file_is_rebuilt() {
    let dir = tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), 30, CountingSource::new());
    let original = cache.ensure(&key()).unwrap();

    let merged = cache.dataset_dir(&key()).join(MERGED_FILE);
    fs::write(&merged, "date,moon_phase,air_temp_C\ngarbage,Blue Moon,x\n").unwrap();

    let rebuilt = cache.ensure(&key()).unwrap();

    assert_eq!(cache.source().calls(), 2);
    assert_eq!(rebuilt, original);
}

#[test]
fn test_corrupt_manifest_is_reported() {
    let dir = tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), 30, CountingSource::new());
    cache.ensure(&key()).unwrap();

    fs::write(cache.dataset_dir(&key()).join(MANIFEST_FILE), "{").unwrap();
    assert_eq!(cache.manifest(&key()).unwrap_err().kind(), "cache_corruption");
}

#[test]
fn test_failed_fetch_writes_nothing() {
    let dir = tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), 30, FailingSource);

    let err = cache.ensure(&key()).unwrap_err();

    assert_eq!(err.kind(), "data_unavailable");
    assert!(!cache.dataset_dir(&key()).exists());
}
