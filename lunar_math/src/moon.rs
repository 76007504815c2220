//! Lunar phase model
//!
//! Maps calendar dates onto a cyclic position inside the synodic month and
//! from there onto one of six canonical phase labels:
//! - `phase_fraction`: date -> [0, 1)
//! - `nearest_label`: fraction -> closest anchor among an allowed label set
//! - `label_for_date`: the two combined over every canonical label

use crate::{circular_distance, MathError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Average length of the lunar phase cycle in days
pub const SYNODIC_MONTH: f64 = 29.53058867;

/// Reference new moon the cycle is measured from
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 6).unwrap_or(NaiveDate::MIN)
}

/// Canonical lunar phase labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoonPhase {
    #[serde(rename = "New Moon")]
    NewMoon,
    #[serde(rename = "First Quarter")]
    FirstQuarter,
    #[serde(rename = "Full Moon")]
    FullMoon,
    #[serde(rename = "Last Quarter")]
    LastQuarter,
    Waning,
    Waxing,
}

impl MoonPhase {
    /// Every label in canonical table order
    pub const ALL: [MoonPhase; 6] = [
        MoonPhase::NewMoon,
        MoonPhase::FirstQuarter,
        MoonPhase::FullMoon,
        MoonPhase::LastQuarter,
        MoonPhase::Waning,
        MoonPhase::Waxing,
    ];

    /// Fraction of the cycle this label is anchored at
    pub fn anchor(self) -> f64 {
        match self {
            MoonPhase::NewMoon => 0.00,
            MoonPhase::FirstQuarter => 0.25,
            MoonPhase::FullMoon => 0.50,
            MoonPhase::LastQuarter => 0.75,
            // coarse labels, only chosen when seen in training
            MoonPhase::Waning => 0.81,
            MoonPhase::Waxing => 0.31,
        }
    }

    /// Canonical display string
    pub fn as_str(self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::Waning => "Waning",
            MoonPhase::Waxing => "Waxing",
        }
    }
}

impl fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoonPhase {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        MoonPhase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s.trim())
            .ok_or_else(|| MathError::InvalidInput(format!("Unknown moon phase label: '{}'", s)))
    }
}

/// Position of `date` within the synodic month, in [0, 1)
///
/// The half-day offset centres each calendar day on its anchor.
pub fn phase_fraction(date: NaiveDate) -> f64 {
    let days = (date - epoch()).num_days() as f64 + 0.5;
    let fraction = days.rem_euclid(SYNODIC_MONTH) / SYNODIC_MONTH;
    // rem_euclid can round up to the modulus for tiny negative inputs
    if fraction >= 1.0 {
        0.0
    } else {
        fraction
    }
}

/// Closest canonical label to `fraction`, restricted to `allowed`
///
/// Ties go to whichever label comes first in [`MoonPhase::ALL`]. An empty
/// allowed set yields `NewMoon`.
pub fn nearest_label(fraction: f64, allowed: &[MoonPhase]) -> MoonPhase {
    let mut best: Option<(MoonPhase, f64)> = None;

    for phase in MoonPhase::ALL.iter().copied() {
        if !allowed.contains(&phase) {
            continue;
        }
        let distance = circular_distance(fraction, phase.anchor());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((phase, distance)),
        }
    }

    best.map(|(phase, _)| phase).unwrap_or(MoonPhase::NewMoon)
}

/// Label assigned to a historical day during ingestion
pub fn label_for_date(date: NaiveDate) -> MoonPhase {
    nearest_label(phase_fraction(date), &MoonPhase::ALL)
}
