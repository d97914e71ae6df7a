//! # Goodness of fit and hypothesis comparison
//!
//! Given observed anomalies, predictions and absolute uncertainties, [`HypothesisComparator`]
//! computes
//!
//! * `χ² = Σ ((observed − predicted) / σ)²`,
//! * the degrees of freedom `dof = N − n_params`,
//! * the reduced `χ²/dof`,
//! * the upper-tail p-value `P(X ≥ χ²)` of a χ² distribution with `dof` degrees of freedom.
//!
//! A comparison with `dof ≤ 0` is not an error: the reduced χ² is `+∞` and the p-value is
//! `0`, and [`ModelComparisonResult::is_degenerate`] lets callers branch on it.
//!
//! The same statistics apply to the fitted model and to any fixed alternative model with
//! its own declared number of parameters. A spacecraft excluded from the fit is scored by
//! its standardized residual `(observed − predicted)/σ`.

use std::fmt;

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    constants::{MeterPerSecond, SpacecraftId},
    flyby_errors::FlybyError,
    observations::ObservationRecord,
};

/// Fit statistics of one model against one set of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelComparisonResult {
    pub chi_squared: f64,
    pub degrees_of_freedom: i64,
    /// `χ²/dof`, or `+∞` when `dof ≤ 0`
    pub reduced_chi_squared: f64,
    /// Upper-tail probability, or `0` when `dof ≤ 0`
    pub p_value: f64,
}

impl ModelComparisonResult {
    /// Whether there are no degrees of freedom left (`dof ≤ 0`).
    pub fn is_degenerate(&self) -> bool {
        self.degrees_of_freedom <= 0
    }
}

impl fmt::Display for ModelComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chi2 = {:.3}, dof = {}, chi2/dof = {:.3}, p = {:.3e}",
            self.chi_squared, self.degrees_of_freedom, self.reduced_chi_squared, self.p_value
        )
    }
}

/// Observed and predicted anomaly of one spacecraft with its residual in sigma units.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRow {
    pub id: SpacecraftId,
    pub observed: MeterPerSecond,
    pub uncertainty: MeterPerSecond,
    pub predicted: MeterPerSecond,
    pub residual: MeterPerSecond,
    /// `residual / uncertainty`
    pub significance: f64,
}

impl ResidualRow {
    pub fn new(record: &ObservationRecord, predicted: MeterPerSecond) -> Self {
        let residual = record.anomaly - predicted;
        ResidualRow {
            id: record.id.clone(),
            observed: record.anomaly,
            uncertainty: record.uncertainty,
            predicted,
            residual,
            significance: residual / record.uncertainty,
        }
    }
}

/// `(observed − predicted) / uncertainty`.
pub fn standardized_residual(
    observed: f64,
    predicted: f64,
    uncertainty: f64,
) -> Result<f64, FlybyError> {
    if !(uncertainty.is_finite() && uncertainty > 0.0) {
        return Err(FlybyError::InvalidInput(format!(
            "uncertainty must be positive, got {uncertainty}"
        )));
    }
    if !(observed.is_finite() && predicted.is_finite()) {
        return Err(FlybyError::InvalidInput(
            "non-finite observed or predicted value".into(),
        ));
    }
    Ok((observed - predicted) / uncertainty)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HypothesisComparator;

impl HypothesisComparator {
    pub fn new() -> Self {
        HypothesisComparator
    }

    /// Statistics of `predicted` against `observed` for a model with `num_params` free
    /// parameters.
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` on mismatched lengths, non-finite values or
    /// non-positive uncertainties. `dof ≤ 0` is reported through the sentinel values.
    pub fn compare(
        &self,
        observed: &[f64],
        predicted: &[f64],
        uncertainties: &[f64],
        num_params: usize,
    ) -> Result<ModelComparisonResult, FlybyError> {
        if observed.len() != predicted.len() || observed.len() != uncertainties.len() {
            return Err(FlybyError::InvalidInput(format!(
                "{} observations, {} predictions and {} uncertainties",
                observed.len(),
                predicted.len(),
                uncertainties.len()
            )));
        }

        let chi_squared = observed
            .iter()
            .zip(predicted)
            .zip(uncertainties)
            .map(|((&o, &p), &s)| standardized_residual(o, p, s).map(|z| z * z))
            .sum::<Result<f64, _>>()?;

        let degrees_of_freedom = observed.len() as i64 - num_params as i64;
        if degrees_of_freedom <= 0 {
            return Ok(ModelComparisonResult {
                chi_squared,
                degrees_of_freedom,
                reduced_chi_squared: f64::INFINITY,
                p_value: 0.0,
            });
        }

        let dof = degrees_of_freedom as f64;
        let distribution =
            ChiSquared::new(dof).map_err(|e| FlybyError::Statistics(e.to_string()))?;

        Ok(ModelComparisonResult {
            chi_squared,
            degrees_of_freedom,
            reduced_chi_squared: chi_squared / dof,
            p_value: distribution.sf(chi_squared),
        })
    }

    /// Same as [`HypothesisComparator::compare`] on residual rows.
    pub fn compare_rows(
        &self,
        rows: &[ResidualRow],
        num_params: usize,
    ) -> Result<ModelComparisonResult, FlybyError> {
        let observed: Vec<f64> = rows.iter().map(|r| r.observed).collect();
        let predicted: Vec<f64> = rows.iter().map(|r| r.predicted).collect();
        let sigma: Vec<f64> = rows.iter().map(|r| r.uncertainty).collect();
        self.compare(&observed, &predicted, &sigma, num_params)
    }

    /// Significance of a held-out observation against a prediction.
    pub fn held_out(
        &self,
        record: &ObservationRecord,
        predicted: MeterPerSecond,
    ) -> Result<ResidualRow, FlybyError> {
        standardized_residual(record.anomaly, predicted, record.uncertainty)?;
        Ok(ResidualRow::new(record, predicted))
    }
}
