//! Temporal integration of integrand series.

use crate::{
    constants::Second,
    factors::PhysicalFactors,
    flyby_errors::FlybyError,
    integrands::IntegrandSeries,
};

/// Trapezoidal rule on irregularly spaced abscissae.
///
/// # Errors
/// * `FlybyError::InsufficientData` with fewer than 2 samples,
/// * `FlybyError::InvalidInput` if the lengths differ, a value is non-finite, or the
///   abscissae are not strictly increasing.
pub fn trapezoid(times: &[Second], values: &[f64]) -> Result<f64, FlybyError> {
    if times.len() != values.len() {
        return Err(FlybyError::InvalidInput(format!(
            "{} time stamps but {} integrand values",
            times.len(),
            values.len()
        )));
    }
    if times.len() < 2 {
        return Err(FlybyError::InsufficientData {
            context: "trapezoidal integration",
            required: 2,
            found: times.len(),
        });
    }
    if times.iter().chain(values).any(|x| !x.is_finite()) {
        return Err(FlybyError::InvalidInput(
            "non-finite value in integration input".into(),
        ));
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(FlybyError::InvalidInput(
            "integration abscissae are not strictly increasing".into(),
        ));
    }

    Ok(times
        .windows(2)
        .zip(values.windows(2))
        .map(|(t, y)| 0.5 * (t[1] - t[0]) * (y[0] + y[1]))
        .sum())
}

/// Integrates integrand series over mission elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalIntegrator;

impl TemporalIntegrator {
    pub fn new() -> Self {
        TemporalIntegrator
    }

    /// One factor per series, integrated against `elapsed` (seconds from the first
    /// sample).
    pub fn integrate(
        &self,
        elapsed: &[Second],
        series: &[IntegrandSeries],
    ) -> Result<PhysicalFactors, FlybyError> {
        let mut factors = PhysicalFactors::new();
        for s in series {
            factors.insert(s.term, trapezoid(elapsed, &s.values)?)?;
        }
        Ok(factors)
    }
}
