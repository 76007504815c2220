//! Seeded offline data source for demos and tests

use super::{assemble_series, check_range, date_range, BatchReport, DailyRecord, DataSource, DayFailure, FailureKind};
use crate::data::DailySeries;
use crate::error::Result;
use crate::location::Coordinate;
use chrono::{Datelike, NaiveDate};
use lunar_math::phase_fraction;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;

/// Generates plausible daily weather around a coordinate
///
/// Each day is drawn from its own seeded generator, so overlapping ranges
/// agree on shared days.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    noise: f64,
    missing: Vec<NaiveDate>,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            noise: 1.0,
            missing: Vec::new(),
        }
    }

    /// Scale of the day-to-day noise (standard deviation of air temperature)
    #[must_use]
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Report these days as missing instead of generating them
    #[must_use]
    pub fn with_missing_days(mut self, days: Vec<NaiveDate>) -> Self {
        self.missing = days;
        self
    }

    fn generate(&self, coordinate: &Coordinate, date: NaiveDate) -> std::result::Result<DailyRecord, DayFailure> {
        if self.missing.contains(&date) {
            return Err(DayFailure::new(date, FailureKind::Missing, "synthetic gap"));
        }

        let day_seed = self.seed ^ (date.num_days_from_ce() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = StdRng::seed_from_u64(day_seed);
        let noise = Normal::new(0.0, self.noise.max(f64::EPSILON)).map_err(|e| {
            DayFailure::new(date, FailureKind::Parse, e.to_string())
        })?;

        // colder towards the poles, seasons flipped in the south
        let season = (TAU * (date.ordinal() as f64 - 200.0) / 365.25).cos();
        let hemisphere = coordinate.latitude().signum();
        let base = 25.0 - 0.4 * coordinate.latitude().abs();
        let lunar = (TAU * phase_fraction(date)).cos();

        let air_temp_c = base + 10.0 * season * hemisphere + 0.3 * lunar + noise.sample(&mut rng);
        let pressure_kpa = 101.3 - 0.2 * lunar + 0.3 * noise.sample(&mut rng);
        let wind_speed_m_s = (3.0 + 0.8 * noise.sample(&mut rng)).abs();

        Ok(DailyRecord {
            date,
            air_temp_c,
            pressure_kpa,
            wind_speed_m_s,
        })
    }
}

impl DataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate) -> Result<DailySeries> {
        check_range(start, end)?;
        let results = date_range(start, end)
            .into_iter()
            .map(|date| self.generate(coordinate, date))
            .collect();

        let (records, report) = BatchReport::collect(results);
        report.log(self.name());
        assemble_series(self.name(), records)
    }
}
