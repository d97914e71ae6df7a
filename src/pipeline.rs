//! # Factor derivation pipeline
//!
//! [`FactorPipeline`] chains the four derivation stages for one spacecraft:
//!
//! ```text
//! Trajectory ─► FrameConverter ─► FieldEvaluator ─► IntegrandEvaluator ─► TemporalIntegrator
//!                (FrameState)      (B, tesla)        (IntegrandSeries)      (PhysicalFactors)
//! ```
//!
//! Every stage is a pure function of its input and fails fast: an error in any stage
//! aborts the spacecraft and nothing downstream is produced.
//!
//! Spacecraft are independent, so [`FactorPipeline::derive_all`] processes a whole
//! [`TrajectorySet`] either sequentially or, with the `parallel` cargo feature, with a
//! rayon parallel iterator. The resulting [`FactorTable`] does not depend on the order of
//! evaluation.

use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    config::AnalysisConfig,
    constants::SpacecraftId,
    factors::{FactorTable, PhysicalFactors},
    flyby_errors::FlybyError,
    frame_converter::FrameConverter,
    geomagnetic::{FieldEvaluator, GeomagneticModel, SphericalHarmonicModel},
    integrands::{IntegrandEvaluator, Term},
    integration::TemporalIntegrator,
    trajectory::{Trajectory, TrajectorySet},
};

#[derive(Debug, Clone)]
pub struct FactorPipeline<M = SphericalHarmonicModel> {
    converter: FrameConverter,
    field: FieldEvaluator<M>,
    integrands: IntegrandEvaluator,
    integrator: TemporalIntegrator,
}

impl FactorPipeline<SphericalHarmonicModel> {
    /// Pipeline with the built-in geomagnetic model.
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_field_model(config, SphericalHarmonicModel::igrf13_degree4())
    }
}

impl Default for FactorPipeline<SphericalHarmonicModel> {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl<M: GeomagneticModel> FactorPipeline<M> {
    pub fn with_field_model(config: &AnalysisConfig, model: M) -> Self {
        FactorPipeline {
            converter: FrameConverter::new(config.frame.clone()),
            field: FieldEvaluator::new(model),
            integrands: IntegrandEvaluator::new(config.integrands),
            integrator: TemporalIntegrator::new(),
        }
    }

    pub fn converter(&self) -> &FrameConverter {
        &self.converter
    }

    pub fn field_evaluator(&self) -> &FieldEvaluator<M> {
        &self.field
    }

    /// Factors of one spacecraft for the requested terms.
    ///
    /// # Errors
    /// * `FlybyError::InvalidInput` for a non-derivable term or corrupted samples,
    /// * `FlybyError::InsufficientData` for a trajectory with a single sample.
    pub fn derive(
        &self,
        trajectory: &Trajectory,
        terms: &[Term],
    ) -> Result<PhysicalFactors, FlybyError> {
        if let Some(term) = terms.iter().find(|t| !t.is_derivable()) {
            return Err(FlybyError::InvalidInput(format!(
                "term '{term}' cannot be derived from a trajectory"
            )));
        }
        if trajectory.len() < 2 {
            return Err(FlybyError::InsufficientData {
                context: "trapezoidal integration",
                required: 2,
                found: trajectory.len(),
            });
        }

        let states = self.converter.convert(trajectory)?;
        let fields = self.field.evaluate(&states)?;
        let series = self.integrands.evaluate(terms, &states, &fields)?;
        let factors = self
            .integrator
            .integrate(&trajectory.elapsed_seconds(), &series)?;

        debug!(
            "{}: {}",
            trajectory.id(),
            factors
                .iter()
                .map(|(t, v)| format!("{t}={v:.6e}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(factors)
    }
}

impl<M: GeomagneticModel + Sync> FactorPipeline<M> {
    /// Factors of every spacecraft of `trajectories`.
    ///
    /// Fails with the first error encountered; no partial table is returned.
    pub fn derive_all(
        &self,
        trajectories: &TrajectorySet,
        terms: &[Term],
    ) -> Result<FactorTable, FlybyError> {
        info!(
            "deriving {} factor(s) for {} spacecraft",
            terms.len(),
            trajectories.len()
        );

        #[cfg(feature = "parallel")]
        let iter = trajectories.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = trajectories.iter();

        let rows = iter
            .map(|(id, traj)| Ok((id.clone(), self.derive(traj, terms)?)))
            .collect::<Result<Vec<(SpacecraftId, PhysicalFactors)>, FlybyError>>()?;

        Ok(rows.into_iter().collect())
    }
}
