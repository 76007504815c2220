//! Qualitative scoring of forecast days
//!
//! An [`Evaluator`] rates one day's conditions for an activity. Its output
//! is decoded strictly: anything that is not exactly the expected JSON object
//! is an [`ForecastError::EvaluationError`].

use crate::engine::{ForecastRow, ForecastTable};
use crate::error::{ForecastError, Result};
use crate::models::{AIR_TEMP, PRESSURE, WATER_TEMP, WIND_SPEED};
use chrono::NaiveDate;
use lunar_math::MoonPhase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

pub mod gemini;

pub use gemini::GeminiEvaluator;

/// Suitability rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "very poor")]
    VeryPoor,
    #[serde(rename = "poor")]
    Poor,
    #[serde(rename = "average")]
    Average,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "excellent")]
    Excellent,
}

impl Rating {
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::VeryPoor => "very poor",
            Rating::Poor => "poor",
            Rating::Average => "average",
            Rating::Good => "good",
            Rating::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluator verdict for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Evaluation {
    pub rating: Rating,
    pub justification: String,
    pub recommendations: String,
}

/// Forecast conditions handed to an evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub activity: String,
    pub date: NaiveDate,
    pub moon_phase: MoonPhase,
    pub air_temp_c: Option<f64>,
    pub pressure_kpa: Option<f64>,
    pub wind_speed_m_s: Option<f64>,
    pub water_temp_c: Option<f64>,
}

impl Conditions {
    /// Pull the known target values out of a forecast row
    pub fn from_row(activity: &str, table: &ForecastTable, row: &ForecastRow) -> Self {
        Self {
            activity: activity.to_string(),
            date: row.date,
            moon_phase: row.moon_phase,
            air_temp_c: table.value(row, AIR_TEMP),
            pressure_kpa: table.value(row, PRESSURE),
            wind_speed_m_s: table.value(row, WIND_SPEED),
            water_temp_c: table.value(row, WATER_TEMP),
        }
    }

    /// Prompt text asking for a JSON verdict on these conditions
    pub fn prompt(&self) -> String {
        let fmt_value = |v: Option<f64>, unit: &str| match v {
            Some(v) => format!("{:.2}{}", v, unit),
            None => "unknown".to_string(),
        };
        let activity = self.activity.replace(['_', '-'], " ");

        format!(
            "You are an expert in {activity} and a meteorologist.\n\
             Analyze the forecast conditions for {date} and evaluate how suitable they are for {activity}.\n\
             \n\
             Input Data:\n\
             - Air Temperature: {air}\n\
             - Atmospheric Pressure: {pressure}\n\
             - Wind Speed: {wind}\n\
             - Moon Phase: \"{moon}\"\n\
             - Water Temperature: {water}\n\
             \n\
             Response Requirements:\n\
             1. Respond ONLY with a JSON object, no code fences.\n\
             2. The object must contain exactly: \"rating\", \"justification\", \"recommendations\".\n\
             3. rating: one of \"very poor\", \"poor\", \"average\", \"good\", \"excellent\".\n\
             4. justification: at most 35 words.\n\
             5. recommendations: at most 3 sentences combining gear and general tips.\n",
            activity = activity,
            date = self.date,
            air = fmt_value(self.air_temp_c, " °C"),
            pressure = fmt_value(self.pressure_kpa, " kPa"),
            wind = fmt_value(self.wind_speed_m_s, " m/s"),
            moon = self.moon_phase,
            water = fmt_value(self.water_temp_c, " °C"),
        )
    }
}

/// Rates the conditions of a single day
pub trait Evaluator {
    fn evaluate(&self, conditions: &Conditions) -> Result<Evaluation>;
}

/// Decode evaluator output, accepting only the bare JSON object
pub fn decode_evaluation(text: &str) -> Result<Evaluation> {
    serde_json::from_str(text.trim())
        .map_err(|e| ForecastError::EvaluationError(format!("malformed evaluation: {}", e)))
}

/// Outcome of evaluating one forecast row
#[derive(Debug)]
pub struct RowEvaluation {
    pub date: NaiveDate,
    pub outcome: Result<Evaluation>,
}

/// Evaluate every row independently; failures stay per row
pub fn evaluate_forecast<E: Evaluator + ?Sized>(
    evaluator: &E,
    activity: &str,
    table: &ForecastTable,
) -> Vec<RowEvaluation> {
    let results: Vec<RowEvaluation> = table
        .rows()
        .iter()
        .map(|row| {
            let conditions = Conditions::from_row(activity, table, row);
            let outcome = evaluator.evaluate(&conditions);
            if let Err(e) = &outcome {
                warn!(date = %row.date, error = %e, "Evaluation failed");
            }
            RowEvaluation {
                date: row.date,
                outcome,
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    info!(rows = results.len(), failed, "Evaluated forecast");
    results
}

#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    date: NaiveDate,
    moon_phase: &'a str,
    rating: Option<&'a str>,
    justification: Option<&'a str>,
    recommendations: Option<&'a str>,
    error: Option<String>,
}

/// Write evaluations next to their forecast rows as CSV
pub fn write_report<P: AsRef<Path>>(
    path: P,
    table: &ForecastTable,
    evaluations: &[RowEvaluation],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for row in table.rows() {
        let outcome = evaluations.iter().find(|e| e.date == row.date).map(|e| &e.outcome);
        let ok = outcome.and_then(|o| o.as_ref().ok());
        let record = ReportRecord {
            date: row.date,
            moon_phase: row.moon_phase.as_str(),
            rating: ok.map(|e| e.rating.as_str()),
            justification: ok.map(|e| e.justification.as_str()),
            recommendations: ok.map(|e| e.recommendations.as_str()),
            error: match outcome {
                Some(Err(e)) => Some(e.to_string()),
                Some(Ok(_)) => None,
                None => Some("not evaluated".to_string()),
            },
        };
        writer.serialize(record)?;
    }

    writer.flush()?;
    Ok(())
}
