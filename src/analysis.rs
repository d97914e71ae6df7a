//! # Flyby analysis workflow
//!
//! [`FlybyAnalysis`] runs the complete confrontation of a prediction model with the
//! measured anomalies:
//!
//! 1. a global fit on the spacecraft of [`AnalysisPlan::fit_ids`] (or an evaluation at
//!    fixed, published parameters with [`FlybyAnalysis::evaluate_at`]),
//! 2. goodness-of-fit statistics and one residual row per fitted spacecraft,
//! 3. the same statistics for an optional fixed alternative model
//!    ([`FixedPredictions`], for instance a thermal recoil model) on the same spacecraft,
//! 4. the prediction and standardized residual of an optional held-out spacecraft.
//!
//! All values are in m/s. [`AnalysisReport`] converts them to mm/s when rendered.
//!
//! ```rust,ignore
//! let plan = AnalysisPlan::new(fit_ids)
//!     .with_held_out("NEAR".into())
//!     .with_alternative(thermal);
//! let analysis = FlybyAnalysis::new(&model, &factors, &observations, plan, config.fit)?;
//! let report = analysis.run(&[1.0, 0.5])?;
//! println!("{report}");
//! ```

use std::fmt;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};
use itertools::Itertools;
use log::info;

use crate::{
    config::FitSettings,
    constants::{MeterPerSecond, SpacecraftId, SpacecraftMap, MM_S_TO_M_S},
    factors::FactorTable,
    fit::{FitProblem, FitResult, ModelFitter},
    flyby_errors::FlybyError,
    models::PredictionModel,
    observations::ObservationSet,
    statistics::{HypothesisComparator, ModelComparisonResult, ResidualRow},
};

/// Per-spacecraft predictions of a model that is not fitted here.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPredictions {
    name: String,
    n_params: usize,
    predictions: SpacecraftMap<MeterPerSecond>,
}

impl FixedPredictions {
    /// Empty prediction set of a model with `n_params` free parameters.
    pub fn new(name: impl Into<String>, n_params: usize) -> Self {
        FixedPredictions {
            name: name.into(),
            n_params,
            predictions: SpacecraftMap::default(),
        }
    }

    pub fn insert(
        &mut self,
        id: impl Into<SpacecraftId>,
        prediction: MeterPerSecond,
    ) -> Result<(), FlybyError> {
        let id = id.into();
        if !prediction.is_finite() {
            return Err(FlybyError::InvalidInput(format!(
                "non-finite prediction of '{}' for {id}",
                self.name
            )));
        }
        if self.predictions.insert(id.clone(), prediction).is_some() {
            return Err(FlybyError::InvalidInput(format!(
                "duplicated prediction of '{}' for {id}",
                self.name
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: &SpacecraftId) -> Result<MeterPerSecond, FlybyError> {
        self.predictions
            .get(id)
            .copied()
            .ok_or_else(|| FlybyError::NotFound {
                kind: "alternative prediction",
                key: format!("{}/{id}", self.name),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_params(&self) -> usize {
        self.n_params
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Which spacecraft enter the fit, which one is held out, and against which alternative
/// model the fit is compared.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPlan {
    pub fit_ids: Vec<SpacecraftId>,
    pub held_out: Option<SpacecraftId>,
    pub alternative: Option<FixedPredictions>,
}

impl AnalysisPlan {
    pub fn new(fit_ids: Vec<SpacecraftId>) -> Self {
        AnalysisPlan {
            fit_ids,
            held_out: None,
            alternative: None,
        }
    }

    pub fn with_held_out(mut self, id: SpacecraftId) -> Self {
        self.held_out = Some(id);
        self
    }

    pub fn with_alternative(mut self, alternative: FixedPredictions) -> Self {
        self.alternative = Some(alternative);
        self
    }

    fn validate(&self) -> Result<(), FlybyError> {
        if let Some(dup) = self.fit_ids.iter().duplicates().next() {
            return Err(FlybyError::InvalidInput(format!(
                "{dup} appears twice in the fitted spacecraft"
            )));
        }
        if let Some(held) = &self.held_out {
            if self.fit_ids.contains(held) {
                return Err(FlybyError::InvalidInput(format!(
                    "held-out spacecraft {held} is also fitted"
                )));
            }
        }
        Ok(())
    }
}

/// Statistics of the fixed alternative model on the fitted spacecraft.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeReport {
    pub name: String,
    pub statistics: ModelComparisonResult,
    pub residuals: Vec<ResidualRow>,
}

/// Outcome of a [`FlybyAnalysis`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub model_name: String,
    pub parameter_names: Vec<&'static str>,
    pub parameters: Vec<f64>,
    /// Present when the parameters come from a fit
    pub fit: Option<FitResult>,
    pub statistics: ModelComparisonResult,
    pub residuals: Vec<ResidualRow>,
    pub alternative: Option<AlternativeReport>,
    pub held_out: Option<ResidualRow>,
}

pub struct FlybyAnalysis<'a, M: PredictionModel + ?Sized> {
    model: &'a M,
    factors: &'a FactorTable,
    observations: &'a ObservationSet,
    plan: AnalysisPlan,
    fitter: ModelFitter,
    comparator: HypothesisComparator,
}

impl<'a, M: PredictionModel + ?Sized> FlybyAnalysis<'a, M> {
    /// # Errors
    /// `FlybyError::InvalidInput` if a spacecraft is fitted twice or both fitted and
    /// held out.
    pub fn new(
        model: &'a M,
        factors: &'a FactorTable,
        observations: &'a ObservationSet,
        plan: AnalysisPlan,
        settings: FitSettings,
    ) -> Result<Self, FlybyError> {
        plan.validate()?;
        Ok(FlybyAnalysis {
            model,
            factors,
            observations,
            plan,
            fitter: ModelFitter::new(settings),
            comparator: HypothesisComparator::new(),
        })
    }

    pub fn plan(&self) -> &AnalysisPlan {
        &self.plan
    }

    fn problem(&self) -> Result<FitProblem, FlybyError> {
        FitProblem::assemble(
            self.factors,
            self.observations,
            &self.plan.fit_ids,
            self.model.terms(),
        )
    }

    /// Fit the model, then compare it, the alternative, and the held-out spacecraft.
    pub fn run(&self, initial_guess: &[f64]) -> Result<AnalysisReport, FlybyError> {
        let problem = self.problem()?;
        let fit = self.fitter.fit(self.model, &problem, initial_guess)?;
        let params = fit.parameters.as_slice().to_vec();
        self.report(params, Some(fit))
    }

    /// Compare the model at fixed parameters without fitting.
    pub fn evaluate_at(&self, params: &[f64]) -> Result<AnalysisReport, FlybyError> {
        if params.len() != self.model.n_params() {
            return Err(FlybyError::InvalidInput(format!(
                "{} parameter values given, model '{}' has {}",
                params.len(),
                self.model.name(),
                self.model.n_params()
            )));
        }
        self.report(params.to_vec(), None)
    }

    /// Prediction of the model for one spacecraft.
    pub fn predict(&self, id: &SpacecraftId, params: &[f64]) -> Result<MeterPerSecond, FlybyError> {
        let row = self.factors.row(id, self.model.terms())?;
        let prediction = self.model.predict(&row, params);
        if prediction.is_finite() {
            Ok(prediction)
        } else {
            Err(FlybyError::InvalidInput(format!(
                "non-finite prediction for {id}"
            )))
        }
    }

    fn report(&self, params: Vec<f64>, fit: Option<FitResult>) -> Result<AnalysisReport, FlybyError> {
        let residuals = self
            .plan
            .fit_ids
            .iter()
            .map(|id| {
                let record = self.observations.get(id)?;
                Ok(ResidualRow::new(record, self.predict(id, &params)?))
            })
            .collect::<Result<Vec<_>, FlybyError>>()?;
        let statistics = self.comparator.compare_rows(&residuals, self.model.n_params())?;
        info!("{}: {statistics}", self.model.name());

        let alternative = self
            .plan
            .alternative
            .as_ref()
            .map(|alt| {
                let rows = self
                    .plan
                    .fit_ids
                    .iter()
                    .map(|id| Ok(ResidualRow::new(self.observations.get(id)?, alt.get(id)?)))
                    .collect::<Result<Vec<_>, FlybyError>>()?;
                let statistics = self.comparator.compare_rows(&rows, alt.n_params())?;
                info!("{}: {statistics}", alt.name());
                Ok::<_, FlybyError>(AlternativeReport {
                    name: alt.name().to_string(),
                    statistics,
                    residuals: rows,
                })
            })
            .transpose()?;

        let held_out = self
            .plan
            .held_out
            .as_ref()
            .map(|id| {
                let row = self
                    .comparator
                    .held_out(self.observations.get(id)?, self.predict(id, &params)?)?;
                info!(
                    "held-out {id}: residual {:.3} mm/s ({:.1} sigma)",
                    row.residual / MM_S_TO_M_S,
                    row.significance
                );
                Ok::<_, FlybyError>(row)
            })
            .transpose()?;

        Ok(AnalysisReport {
            model_name: self.model.name().to_string(),
            parameter_names: self.model.parameter_names().to_vec(),
            parameters: params,
            fit,
            statistics,
            residuals,
            alternative,
            held_out,
        })
    }
}

fn right(content: String) -> Cell {
    Cell::new(content).set_alignment(CellAlignment::Right)
}

fn residual_table(rows: &[ResidualRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Spacecraft"),
        Cell::new("Observed [mm/s]"),
        Cell::new("σ [mm/s]"),
        Cell::new("Predicted [mm/s]"),
        Cell::new("Residual [mm/s]"),
        Cell::new("Residual [σ]"),
    ]);

    for r in rows {
        table.add_row(Row::from(vec![
            Cell::new(r.id.as_str()),
            right(format!("{:.3}", r.observed / MM_S_TO_M_S)),
            right(format!("{:.3}", r.uncertainty / MM_S_TO_M_S)),
            right(format!("{:.3}", r.predicted / MM_S_TO_M_S)),
            right(format!("{:+.3}", r.residual / MM_S_TO_M_S)),
            right(format!("{:+.2}", r.significance)),
        ]));
    }
    table
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fit {
            Some(fit) => write!(f, "{fit}")?,
            None => {
                writeln!(f, "Model '{}' at fixed parameters", self.model_name)?;
                for (name, value) in self.parameter_names.iter().zip(&self.parameters) {
                    writeln!(f, "  {name:<12} = {value:>+.6e}")?;
                }
            }
        }
        writeln!(f, "{}", residual_table(&self.residuals))?;
        writeln!(f, "{}", self.statistics)?;

        if let Some(alt) = &self.alternative {
            writeln!(f, "\nAlternative model '{}'", alt.name)?;
            writeln!(f, "{}", residual_table(&alt.residuals))?;
            writeln!(f, "{}", alt.statistics)?;
        }
        if let Some(row) = &self.held_out {
            writeln!(
                f,
                "\nHeld-out {}: observed {:.3} ± {:.3} mm/s, predicted {:.3} mm/s, residual {:+.3} mm/s ({:+.1} σ)",
                row.id,
                row.observed / MM_S_TO_M_S,
                row.uncertainty / MM_S_TO_M_S,
                row.predicted / MM_S_TO_M_S,
                row.residual / MM_S_TO_M_S,
                row.significance
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod analysis_test {
    use super::*;
    use crate::{
        factors::PhysicalFactors, integrands::Term, models::ModelVariant,
        observations::ObservationRecord,
    };
    use approx::assert_relative_eq;

    fn inputs() -> (FactorTable, ObservationSet) {
        let rows = [
            ("A", 1.0, 0.0, 1.0),
            ("B", 0.0, 1.0, 2.0),
            ("C", 1.0, 1.0, 3.0),
            ("D", 2.0, 1.0, 4.0),
        ];
        let factors = rows
            .iter()
            .map(|(id, c, s, _)| {
                (
                    SpacecraftId::from(*id),
                    PhysicalFactors::from_pairs([(Term::Chiral, *c), (Term::Scalar, *s)]).unwrap(),
                )
            })
            .collect();
        let observations = rows
            .iter()
            .map(|(id, _, _, obs)| ObservationRecord::new(*id, *obs, 0.5).unwrap())
            .collect();
        (factors, observations)
    }

    #[test]
    fn test_evaluate_at_fixed_parameters() {
        let (factors, observations) = inputs();
        let mut thermal = FixedPredictions::new("thermal", 0);
        for id in ["A", "B", "C"] {
            thermal.insert(id, 0.0).unwrap();
        }
        let plan = AnalysisPlan::new(vec!["A".into(), "B".into(), "C".into()])
            .with_held_out("D".into())
            .with_alternative(thermal);
        let model = ModelVariant::LinearTwoTerm;
        let analysis =
            FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
                .unwrap();

        let report = analysis.evaluate_at(&[1.0, 2.0]).unwrap();
        assert!(report.fit.is_none());
        assert_eq!(report.statistics.chi_squared, 0.0);
        assert_eq!(report.statistics.degrees_of_freedom, 1);

        let alt = report.alternative.as_ref().unwrap();
        assert_relative_eq!(alt.statistics.chi_squared, 56.0, max_relative = 1e-12);
        assert_eq!(alt.statistics.degrees_of_freedom, 3);

        // D: predicted 1·2 + 2·1 = 4
        let held = report.held_out.as_ref().unwrap();
        assert_eq!(held.significance, 0.0);

        let rendered = report.to_string();
        assert!(rendered.contains("Alternative model 'thermal'"));
        assert!(rendered.contains("Held-out D"));
    }

    #[test]
    fn test_missing_alternative_prediction_is_an_error() {
        let (factors, observations) = inputs();
        let mut thermal = FixedPredictions::new("thermal", 0);
        thermal.insert("A", 0.0).unwrap();
        let plan = AnalysisPlan::new(vec!["A".into(), "B".into()]).with_alternative(thermal);
        let model = ModelVariant::LinearTwoTerm;
        let analysis =
            FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
                .unwrap();
        assert_eq!(
            analysis.evaluate_at(&[1.0, 2.0]).unwrap_err(),
            FlybyError::NotFound {
                kind: "alternative prediction",
                key: "thermal/B".into()
            }
        );
    }

    #[test]
    fn test_plan_validation() {
        let (factors, observations) = inputs();
        let model = ModelVariant::LinearTwoTerm;
        let plan = AnalysisPlan::new(vec!["A".into(), "B".into()]).with_held_out("A".into());
        assert!(
            FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
                .is_err()
        );
        let plan = AnalysisPlan::new(vec!["A".into(), "A".into()]);
        assert!(
            FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
                .is_err()
        );
    }
}
