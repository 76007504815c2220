//! On-disk cache of merged historical datasets
//!
//! Layout: `<root>/<activity>/<coordinate-token>/asof_<YYYYMMDD>/` holding
//! `merged.csv` and `manifest.json`. Both files are written to a temporary
//! file first and renamed into place.

use crate::data::{DailySeries, DataLoader};
use crate::error::{ForecastError, Result};
use crate::ingest::DataSource;
use crate::location::Coordinate;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Merged series file name
pub const MERGED_FILE: &str = "merged.csv";
/// Dataset manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Identity of one cached dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetKey {
    activity: String,
    coordinate: Coordinate,
    asof: NaiveDate,
}

impl DatasetKey {
    /// Build a key; the coordinate is quantized and the activity validated
    pub fn new(activity: &str, coordinate: Coordinate, asof: NaiveDate) -> Result<Self> {
        validate_activity(activity)?;
        Ok(Self {
            activity: activity.to_string(),
            coordinate: coordinate.quantized(),
            asof,
        })
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn asof(&self) -> NaiveDate {
        self.asof
    }

    /// Directory of this dataset relative to the cache root
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(&self.activity)
            .join(self.coordinate.token())
            .join(format!("asof_{}", self.asof.format("%Y%m%d")))
    }
}

/// Check an activity slug: non-empty `[a-z0-9_-]`
pub fn validate_activity(activity: &str) -> Result<()> {
    let valid = !activity.is_empty()
        && activity
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ForecastError::validation(
            "activity",
            format!("'{}' must be a non-empty [a-z0-9_-] slug", activity),
        ))
    }
}

/// Metadata written next to every merged dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub activity: String,
    pub latitude: f64,
    pub longitude: f64,
    pub asof: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub files: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Dataset cache backed by a historical data source
#[derive(Debug)]
pub struct DatasetCache<D> {
    root: PathBuf,
    lookback_days: u32,
    source: D,
}

impl<D: DataSource> DatasetCache<D> {
    pub fn new(root: impl Into<PathBuf>, lookback_days: u32, source: D) -> Self {
        Self {
            root: root.into(),
            lookback_days,
            source,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// Absolute directory for a key
    pub fn dataset_dir(&self, key: &DatasetKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }

    /// Return the cached series for `key`, fetching and storing it on a miss
    ///
    /// A cached `merged.csv` that no longer decodes is logged and rebuilt.
    pub fn ensure(&self, key: &DatasetKey) -> Result<DailySeries> {
        let dir = self.dataset_dir(key);
        let merged = dir.join(MERGED_FILE);

        if merged.exists() {
            match DataLoader::from_csv(&merged) {
                Ok(series) if !series.is_empty() => {
                    info!(path = %merged.display(), rows = series.len(), "Dataset cache hit");
                    return Ok(series);
                }
                Ok(_) => {
                    let err = ForecastError::corruption(&merged, "cached series is empty");
                    warn!(error = %err, "Rebuilding cached dataset");
                }
                Err(e) => {
                    let err = ForecastError::corruption(&merged, e);
                    warn!(error = %err, "Rebuilding cached dataset");
                }
            }
        } else {
            info!(path = %dir.display(), "Dataset cache miss");
        }

        self.build(key, &dir)
    }

    /// Read the manifest of a cached dataset
    pub fn manifest(&self, key: &DatasetKey) -> Result<DatasetManifest> {
        let path = self.dataset_dir(key).join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| ForecastError::corruption(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| ForecastError::corruption(&path, e))
    }

    fn build(&self, key: &DatasetKey, dir: &Path) -> Result<DailySeries> {
        let end = key.asof();
        let start = end - Duration::days(i64::from(self.lookback_days.max(1)) - 1);

        let series = self.source.fetch(&key.coordinate(), start, end)?;
        if series.is_empty() {
            return Err(ForecastError::unavailable(
                self.source.name(),
                "source returned an empty series",
            ));
        }

        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        series.write_csv_to(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(MERGED_FILE)).map_err(|e| e.error)?;

        let manifest = DatasetManifest {
            activity: key.activity().to_string(),
            latitude: key.coordinate().latitude(),
            longitude: key.coordinate().longitude(),
            asof: key.asof(),
            created_at: Utc::now(),
            source: self.source.name().to_string(),
            start_date: series.first_date().unwrap_or(start),
            end_date: series.last_date().unwrap_or(end),
            files: vec![MERGED_FILE.to_string()],
            columns: series.column_names().to_vec(),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &manifest)?;
        tmp.write_all(b"\n")?;
        tmp.persist(dir.join(MANIFEST_FILE)).map_err(|e| e.error)?;

        info!(
            path = %dir.display(),
            source = self.source.name(),
            rows = series.len(),
            "Stored new dataset"
        );
        Ok(series)
    }
}
