//! Lunar-phase dummy regressors
//!
//! Training labels are one-hot encoded with the first observed category as
//! the reference level and a trailing `moon_nan` indicator for days without a
//! label. Future rows reuse exactly the training columns.

use chrono::NaiveDate;
use lunar_math::{nearest_label, phase_fraction, MoonPhase};

/// Column flagging a missing label
pub const MOON_NAN_COLUMN: &str = "moon_nan";

/// Dummy encoding fitted on the training labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoonDummies {
    observed: Vec<MoonPhase>,
}

impl MoonDummies {
    /// Fit the encoding to the labels seen in training
    pub fn fit(labels: &[Option<MoonPhase>]) -> Self {
        let observed = MoonPhase::ALL
            .iter()
            .copied()
            .filter(|phase| labels.contains(&Some(*phase)))
            .collect();
        Self { observed }
    }

    /// Labels present in training, canonical order
    pub fn observed(&self) -> &[MoonPhase] {
        &self.observed
    }

    /// The dropped reference category
    pub fn reference(&self) -> Option<MoonPhase> {
        self.observed.first().copied()
    }

    /// Labels that own an indicator column
    fn encoded(&self) -> &[MoonPhase] {
        self.observed.get(1..).unwrap_or(&[])
    }

    /// Number of regressor columns, `moon_nan` included
    pub fn width(&self) -> usize {
        self.encoded().len() + 1
    }

    pub fn column_names(&self) -> Vec<String> {
        self.encoded()
            .iter()
            .map(|phase| format!("moon_{}", phase))
            .chain(std::iter::once(MOON_NAN_COLUMN.to_string()))
            .collect()
    }

    /// Encode labels as column-major 0/1 regressors
    ///
    /// A label without a training column (including the reference) encodes
    /// as all zeros.
    pub fn encode(&self, labels: &[Option<MoonPhase>]) -> Vec<Vec<f64>> {
        let encoded = self.encoded();
        let mut columns = vec![vec![0.0; labels.len()]; self.width()];

        for (row, label) in labels.iter().enumerate() {
            match label {
                Some(phase) => {
                    if let Some(col) = encoded.iter().position(|p| p == phase) {
                        columns[col][row] = 1.0;
                    }
                }
                None => columns[encoded.len()][row] = 1.0,
            }
        }

        columns
    }

    /// Nearest observed label for each future date
    pub fn future_labels(&self, dates: &[NaiveDate]) -> Vec<MoonPhase> {
        dates
            .iter()
            .map(|date| nearest_label(phase_fraction(*date), &self.observed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observed_is_reference() {
        let labels = [
            Some(MoonPhase::FullMoon),
            Some(MoonPhase::Waxing),
            None,
            Some(MoonPhase::FirstQuarter),
        ];
        let dummies = MoonDummies::fit(&labels);

        assert_eq!(dummies.reference(), Some(MoonPhase::FirstQuarter));
        assert_eq!(
            dummies.column_names(),
            vec!["moon_Full Moon", "moon_Waxing", "moon_nan"]
        );

        let x = dummies.encode(&labels);
        assert_eq!(x[0], vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(x[1], vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(x[2], vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_label_encodes_as_zeros() {
        let dummies = MoonDummies::fit(&[Some(MoonPhase::NewMoon), Some(MoonPhase::FullMoon)]);
        let x = dummies.encode(&[Some(MoonPhase::Waning)]);
        assert!(x.iter().all(|col| col == &vec![0.0]));
    }

    #[test]
    fn test_future_labels_stay_in_training_set() {
        let dummies = MoonDummies::fit(&[Some(MoonPhase::Waxing), Some(MoonPhase::Waning)]);
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates: Vec<_> = (0..40).map(|i| start + chrono::Duration::days(i)).collect();

        for label in dummies.future_labels(&dates) {
            assert!(dummies.observed().contains(&label));
        }
    }
}
