//! Daily series handling for forecasting
//!
//! A [`DailySeries`] is the merged historical table the engine trains on:
//! one row per calendar day with a `date`, a `moon_phase` label and any
//! number of numeric feature columns. CSV reading and writing go through
//! polars, matching the `merged.csv` layout of the dataset cache.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use lunar_math::MoonPhase;
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Name of the calendar date column
pub const DATE_COLUMN: &str = "date";
/// Name of the lunar phase label column
pub const MOON_PHASE_COLUMN: &str = "moon_phase";
/// Value historical sources use for "not measured"
pub const MISSING_SENTINEL: f64 = -999.0;

/// Ordered daily table with strictly increasing, unique dates
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    moon_phase: Vec<Option<MoonPhase>>,
    names: Vec<String>,
    /// Column-major feature values, `values[column][row]`
    values: Vec<Vec<f64>>,
}

impl DailySeries {
    /// Create a new series, validating shape, ordering and values
    pub fn new(
        dates: Vec<NaiveDate>,
        moon_phase: Vec<Option<MoonPhase>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        if moon_phase.len() != dates.len() {
            return Err(ForecastError::validation(
                MOON_PHASE_COLUMN,
                format!(
                    "has {} values for {} dates",
                    moon_phase.len(),
                    dates.len()
                ),
            ));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::validation(
                DATE_COLUMN,
                format!("dates must be strictly increasing ({} then {})", pair[0], pair[1]),
            ));
        }

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if name == DATE_COLUMN || name == MOON_PHASE_COLUMN || names.contains(&name) {
                return Err(ForecastError::validation(name, "duplicate or reserved column name"));
            }
            if column.len() != dates.len() {
                return Err(ForecastError::validation(
                    name,
                    format!("has {} values for {} dates", column.len(), dates.len()),
                ));
            }
            if column.iter().any(|v| !v.is_finite() || *v == MISSING_SENTINEL) {
                return Err(ForecastError::validation(
                    name,
                    "contains missing or non-finite values",
                ));
            }
            names.push(name);
            values.push(column);
        }

        Ok(Self {
            dates,
            moon_phase,
            names,
            values,
        })
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of days in the series
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn moon_phases(&self) -> &[Option<MoonPhase>] {
        &self.moon_phase
    }

    /// Names of the numeric feature columns, in table order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Values of a numeric column
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Distinct labels present in the series, in canonical order
    pub fn observed_labels(&self) -> Vec<MoonPhase> {
        MoonPhase::ALL
            .iter()
            .copied()
            .filter(|phase| self.moon_phase.contains(&Some(*phase)))
            .collect()
    }

    /// Whether any consecutive dates are more than a day apart
    pub fn has_gaps(&self) -> bool {
        self.dates.windows(2).any(|w| w[1] - w[0] > Duration::days(1))
    }

    /// Reindex to consecutive days, forward filling numeric columns
    ///
    /// Inserted days carry no moon label so they count as "not observed" in
    /// the exogenous matrix.
    pub fn regularize(&self) -> Self {
        if !self.has_gaps() {
            return self.clone();
        }

        let (first, last) = match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (first, last),
            _ => return self.clone(),
        };
        let span = (last - first).num_days() as usize + 1;

        let mut dates = Vec::with_capacity(span);
        let mut moon_phase = Vec::with_capacity(span);
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(span); self.names.len()];

        let mut source = 0;
        let mut day = first;
        while day <= last {
            if self.dates[source] == day {
                moon_phase.push(self.moon_phase[source]);
                for (out, column) in values.iter_mut().zip(&self.values) {
                    out.push(column[source]);
                }
                if source + 1 < self.dates.len() {
                    source += 1;
                }
            } else {
                // the previous source row is the forward fill value
                let prev = source.saturating_sub(1);
                moon_phase.push(None);
                for (out, column) in values.iter_mut().zip(&self.values) {
                    out.push(column[prev]);
                }
            }
            dates.push(day);
            day += Duration::days(1);
        }

        debug!(
            inserted = span - self.dates.len(),
            "Filled gaps in daily series"
        );

        Self {
            dates,
            moon_phase,
            names: self.names.clone(),
            values,
        }
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.len());
        if start > end || end > self.len() {
            return Err(ForecastError::validation(
                "slice",
                format!("range {}..{} is outside 0..{}", start, end, self.len()),
            ));
        }

        Ok(Self {
            dates: self.dates[start..end].to_vec(),
            moon_phase: self.moon_phase[start..end].to_vec(),
            names: self.names.clone(),
            values: self.values.iter().map(|c| c[start..end].to_vec()).collect(),
        })
    }

    /// Convert to a polars DataFrame with the merged CSV column layout
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.dates.iter().map(|d| d.to_string()).collect();
        let labels: Vec<Option<&str>> = self
            .moon_phase
            .iter()
            .map(|p| p.map(MoonPhase::as_str))
            .collect();

        let mut series = vec![
            Series::new(DATE_COLUMN, dates),
            Series::new(MOON_PHASE_COLUMN, labels),
        ];
        for (name, column) in self.names.iter().zip(&self.values) {
            series.push(Series::new(name, column.as_slice()));
        }

        Ok(DataFrame::new(series)?)
    }

    /// Write the series as CSV to any writer
    pub fn write_csv_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).has_header(true).finish(&mut df)?;
        Ok(())
    }

    /// Write the series as CSV to a file path
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_csv_to(&mut file)
    }
}

/// Data loader for merged daily series
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a daily series from a merged CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<DailySeries> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Create a daily series from an existing DataFrame
    ///
    /// Rows with unparseable dates are dropped and rows are sorted by date.
    /// Missing numeric values (nulls, NaN or the `-999` sentinel) are forward
    /// then backward filled.
    pub fn from_dataframe(df: DataFrame) -> Result<DailySeries> {
        let dates = Self::date_column(&df)?;
        let labels = Self::moon_phase_column(&df)?;

        let mut numeric: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for col in df.get_columns() {
            let name = col.name();
            if name == DATE_COLUMN || name == MOON_PHASE_COLUMN {
                continue;
            }
            if matches!(col.dtype(), DataType::Utf8) {
                debug!(column = name, "Skipping non-numeric column");
                continue;
            }
            let cast = col.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite() && *x != MISSING_SENTINEL))
                .collect();
            numeric.push((name.to_string(), values));
        }

        // keep rows with a usable date, then order by it
        let mut order: Vec<usize> = (0..dates.len()).filter(|&i| dates[i].is_some()).collect();
        let dropped = dates.len() - order.len();
        if dropped > 0 {
            warn!(dropped, "Dropped rows with unparseable dates");
        }
        order.sort_by_key(|&i| dates[i]);

        let sorted_dates: Vec<NaiveDate> = order.iter().filter_map(|&i| dates[i]).collect();
        if let Some(pair) = sorted_dates.windows(2).find(|w| w[0] == w[1]) {
            return Err(ForecastError::validation(
                DATE_COLUMN,
                format!("duplicate date {}", pair[0]),
            ));
        }
        let sorted_labels: Vec<Option<MoonPhase>> = order.iter().map(|&i| labels[i]).collect();

        let mut columns = Vec::with_capacity(numeric.len());
        for (name, values) in numeric {
            let ordered: Vec<Option<f64>> = order.iter().map(|&i| values[i]).collect();
            let filled = fill_missing(&ordered).ok_or_else(|| {
                ForecastError::validation(name.clone(), "column has no usable values")
            })?;
            columns.push((name, filled));
        }

        DailySeries::new(sorted_dates, sorted_labels, columns)
    }

    fn date_column(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
        let col = df
            .column(DATE_COLUMN)
            .map_err(|_| ForecastError::validation(DATE_COLUMN, "column is missing"))?;

        match col.dtype() {
            DataType::Utf8 => Ok(col
                .utf8()?
                .into_iter()
                .map(|v| v.and_then(|s| parse_date(s)))
                .collect()),
            DataType::Date => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                    .ok_or_else(|| ForecastError::validation(DATE_COLUMN, "bad epoch"))?;
                Ok(col
                    .date()?
                    .into_iter()
                    .map(|v| v.map(|days| epoch + Duration::days(days as i64)))
                    .collect())
            }
            other => Err(ForecastError::validation(
                DATE_COLUMN,
                format!("unsupported dtype {:?}", other),
            )),
        }
    }

    fn moon_phase_column(df: &DataFrame) -> Result<Vec<Option<MoonPhase>>> {
        let col = df
            .column(MOON_PHASE_COLUMN)
            .map_err(|_| ForecastError::validation(MOON_PHASE_COLUMN, "column is missing"))?;
        let col = col.cast(&DataType::Utf8)?;

        col.utf8()?
            .into_iter()
            .map(|v| match v.map(str::trim) {
                None | Some("") => Ok(None),
                Some(label) => label
                    .parse::<MoonPhase>()
                    .map(Some)
                    .map_err(|e| ForecastError::validation(MOON_PHASE_COLUMN, e.to_string())),
            })
            .collect()
    }
}

/// Parse an ISO date, tolerating a trailing time component
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Forward fill, then backward fill the leading gap
///
/// Returns `None` when no value is present at all.
pub fn fill_missing(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = values.iter().flatten().next().copied()?;
    let mut last = first;
    Some(
        values
            .iter()
            .map(|v| {
                if let Some(v) = v {
                    last = *v;
                }
                last
            })
            .collect(),
    )
}
