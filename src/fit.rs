//! # Global model fit
//!
//! Weighted nonlinear least squares over all spacecraft at once: find the parameter
//! vector `p` minimizing
//!
//! ```text
//! χ²(p) = Σᵢ ((Δvᵢ − model(fᵢ, p)) / σᵢ)²
//! ```
//!
//! where `fᵢ` are the physical factors of spacecraft `i` and `σᵢ` its absolute
//! measurement uncertainty.
//!
//! The minimizer is a Levenberg–Marquardt iteration with Marquardt diagonal scaling
//! (the damping is applied to the running maximum of `diag(JᵀWJ)`), solved by Cholesky
//! factorization. The iteration stops when one of the following holds:
//!
//! * the step is small: `‖δ‖ ≤ xtol · (‖p‖ + xtol)`,
//! * both the actual and the predicted relative reductions of χ² are below `ftol`,
//! * the residual vector is orthogonal to every Jacobian column within `gtol`,
//! * χ² is exactly zero,
//! * a rejected step is already below the `xtol` threshold.
//!
//! When no damping up to `max_damping` yields a finite step that lowers χ², the fit
//! fails with [`FitFailure::DampingExhausted`] instead of returning the stalled point.
//!
//! The covariance is `(JᵀWJ)⁻¹` at the solution, without rescaling by the reduced χ².
//!
//! Convergence depends on the initial guess. A poor guess can lead the solver to a local
//! minimum outside the physical domain of the model (for instance a negative magnitude
//! in the biphasic model); such solutions are reported as
//! [`FitFailure::NonPhysicalSolution`] and never returned as a result.

use std::fmt;

use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use crate::{
    config::FitSettings,
    constants::SpacecraftId,
    factors::FactorTable,
    flyby_errors::{FitFailure, FlybyError},
    integrands::Term,
    models::PredictionModel,
    observations::ObservationSet,
};

/// Data of a global fit: one row of factors, one observation and one uncertainty per
/// spacecraft.
#[derive(Debug, Clone, PartialEq)]
pub struct FitProblem {
    ids: Vec<SpacecraftId>,
    factors: DMatrix<f64>,
    observed: DVector<f64>,
    sigma: DVector<f64>,
}

impl FitProblem {
    /// Build a problem from explicit arrays (anomalies and uncertainties in m/s).
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` on mismatched dimensions, non-finite values or
    /// non-positive uncertainties.
    pub fn new(
        ids: Vec<SpacecraftId>,
        factors: DMatrix<f64>,
        observed: DVector<f64>,
        sigma: DVector<f64>,
    ) -> Result<Self, FlybyError> {
        let n = ids.len();
        if factors.nrows() != n || observed.len() != n || sigma.len() != n {
            return Err(FlybyError::InvalidInput(format!(
                "fit problem dimensions differ: {n} ids, {} factor rows, {} observations, {} uncertainties",
                factors.nrows(),
                observed.len(),
                sigma.len()
            )));
        }
        if factors.iter().chain(observed.iter()).any(|x| !x.is_finite()) {
            return Err(FlybyError::InvalidInput(
                "non-finite factor or observation in fit problem".into(),
            ));
        }
        if let Some(i) = sigma.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(FlybyError::InvalidInput(format!(
                "uncertainty of {} must be positive, got {}",
                ids[i], sigma[i]
            )));
        }

        Ok(FitProblem {
            ids,
            factors,
            observed,
            sigma,
        })
    }

    /// Gather the rows of `ids` from a factor table and an observation set.
    ///
    /// # Errors
    /// `FlybyError::NotFound` when a spacecraft or one of its factors is missing.
    pub fn assemble(
        table: &FactorTable,
        observations: &ObservationSet,
        ids: &[SpacecraftId],
        terms: &[Term],
    ) -> Result<Self, FlybyError> {
        let rows = ids
            .iter()
            .map(|id| table.row(id, terms))
            .collect::<Result<Vec<_>, _>>()?;
        let records = ids
            .iter()
            .map(|id| observations.get(id))
            .collect::<Result<Vec<_>, _>>()?;

        let factors = DMatrix::from_fn(ids.len(), terms.len(), |i, j| rows[i][j]);
        let observed = DVector::from_iterator(ids.len(), records.iter().map(|r| r.anomaly));
        let sigma = DVector::from_iterator(ids.len(), records.iter().map(|r| r.uncertainty));

        Self::new(ids.to_vec(), factors, observed, sigma)
    }

    pub fn ids(&self) -> &[SpacecraftId] {
        &self.ids
    }

    pub fn factors(&self) -> &DMatrix<f64> {
        &self.factors
    }

    pub fn observed(&self) -> &DVector<f64> {
        &self.observed
    }

    pub fn uncertainties(&self) -> &DVector<f64> {
        &self.sigma
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn rows(&self) -> Vec<Vec<f64>> {
        self.factors
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}

/// Converged parameters of a global fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model_name: String,
    pub parameter_names: Vec<&'static str>,
    pub parameters: DVector<f64>,
    /// `(JᵀWJ)⁻¹` at the solution
    pub covariance: DMatrix<f64>,
    pub chi_squared: f64,
    pub iterations: usize,
}

impl FitResult {
    /// One-sigma parameter uncertainties, the square roots of the covariance diagonal.
    pub fn uncertainties(&self) -> DVector<f64> {
        self.covariance.diagonal().map(f64::sqrt)
    }

    /// Value of a parameter by name.
    pub fn parameter(&self, name: &str) -> Result<f64, FlybyError> {
        self.parameter_names
            .iter()
            .position(|n| *n == name)
            .map(|j| self.parameters[j])
            .ok_or_else(|| FlybyError::NotFound {
                kind: "parameter",
                key: name.to_string(),
            })
    }

    /// Correlation coefficient between parameters `i` and `j`, `None` unless both
    /// variances are positive and finite.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let norm = (self.covariance[(i, i)] * self.covariance[(j, j)]).sqrt();
        (norm.is_finite() && norm > 0.0).then(|| self.covariance[(i, j)] / norm)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fit of '{}': chi2 = {:.4}, {} iteration(s)",
            self.model_name, self.chi_squared, self.iterations
        )?;
        let sigma = self.uncertainties();
        for (j, name) in self.parameter_names.iter().enumerate() {
            writeln!(
                f,
                "  {name:<12} = {:>+.6e} ± {:.3e}",
                self.parameters[j], sigma[j]
            )?;
        }
        Ok(())
    }
}

/// Weighted residuals `(y − ŷ)/σ` and Jacobian `∂ŷ/∂p / σ`, or `None` if any value is
/// non-finite.
fn linearize<M: PredictionModel + ?Sized>(
    model: &M,
    rows: &[Vec<f64>],
    problem: &FitProblem,
    params: &DVector<f64>,
) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let p = params.as_slice();
    let n = rows.len();
    let k = p.len();

    let mut residuals = DVector::zeros(n);
    let mut jacobian = DMatrix::zeros(n, k);
    for (i, row) in rows.iter().enumerate() {
        let sigma = problem.sigma[i];
        residuals[i] = (problem.observed[i] - model.predict(row, p)) / sigma;
        for (j, d) in model.gradient(row, p).into_iter().enumerate() {
            jacobian[(i, j)] = d / sigma;
        }
    }

    let finite = residuals.iter().chain(jacobian.iter()).all(|x| x.is_finite());
    finite.then_some((residuals, jacobian))
}

/// Levenberg–Marquardt global fitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelFitter {
    settings: FitSettings,
}

impl ModelFitter {
    pub fn new(settings: FitSettings) -> Self {
        ModelFitter { settings }
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Fit `model` to `problem` starting from `initial_guess`.
    ///
    /// # Errors
    /// * `FlybyError::InvalidInput` if the factor columns do not match the model terms
    ///   or the guess has the wrong length,
    /// * `FlybyError::InsufficientData` with fewer spacecraft than free parameters,
    /// * `FlybyError::ConvergenceFailure` when no admissible solution with a covariance
    ///   is reached.
    pub fn fit<M: PredictionModel + ?Sized>(
        &self,
        model: &M,
        problem: &FitProblem,
        initial_guess: &[f64],
    ) -> Result<FitResult, FlybyError> {
        let n_params = model.n_params();
        if problem.factors.ncols() != model.terms().len() {
            return Err(FlybyError::InvalidInput(format!(
                "model '{}' expects {} factor columns ({}), got {}",
                model.name(),
                model.terms().len(),
                model.terms().iter().join(", "),
                problem.factors.ncols()
            )));
        }
        if initial_guess.len() != n_params {
            return Err(FlybyError::InvalidInput(format!(
                "initial guess has {} values, model '{}' has {n_params} parameters",
                initial_guess.len(),
                model.name()
            )));
        }
        if problem.len() < n_params {
            return Err(FlybyError::InsufficientData {
                context: "model fit",
                required: n_params,
                found: problem.len(),
            });
        }

        let s = &self.settings;
        let rows = problem.rows();
        let mut params = DVector::from_column_slice(initial_guess);
        let (mut residuals, mut jacobian) = linearize(model, &rows, problem, &params)
            .ok_or(FlybyError::ConvergenceFailure(FitFailure::NonFiniteState))?;
        let mut cost = residuals.norm_squared();
        let mut damping = s.initial_damping;
        let mut scaling = DVector::<f64>::zeros(n_params);

        let mut iterations = 0;
        let mut converged = false;
        while iterations < s.max_iterations {
            iterations += 1;

            let jtj = jacobian.tr_mul(&jacobian);
            let jtr = jacobian.tr_mul(&residuals);

            if cost == 0.0 || gradient_converged(&jtj, &jtr, cost, s.gtol) {
                converged = true;
                break;
            }
            for j in 0..n_params {
                scaling[j] = scaling[j].max(jtj[(j, j)]);
            }
            let diag = scaling.map(|d| if d > 0.0 { d } else { 1.0 });

            // Increase the damping until a step decreases χ²
            loop {
                let mut lhs = jtj.clone();
                for j in 0..n_params {
                    lhs[(j, j)] += damping * diag[j];
                }

                let trial = lhs.cholesky().map(|chol| chol.solve(&jtr)).and_then(|step| {
                    let candidate = &params + &step;
                    linearize(model, &rows, problem, &candidate)
                        .map(|(r, jac)| (step, candidate, r, jac))
                });

                if let Some((step, candidate, r, jac)) = trial {
                    let new_cost = r.norm_squared();
                    if new_cost < cost {
                        let actual = (cost - new_cost) / cost;
                        let predicted = (2.0 * step.dot(&jtr) - step.dot(&(&jtj * &step))) / cost;
                        let small_step = step.norm() <= s.xtol * (candidate.norm() + s.xtol);

                        params = candidate;
                        residuals = r;
                        jacobian = jac;
                        cost = new_cost;
                        damping = (damping * 0.1).max(f64::EPSILON);

                        debug!("LM iteration {iterations}: chi2 = {cost:.6e}, damping = {damping:.1e}");
                        converged = small_step || (actual <= s.ftol && predicted.abs() <= s.ftol);
                        break;
                    }
                    if step.norm() <= s.xtol * (params.norm() + s.xtol) {
                        converged = true;
                        break;
                    }
                }

                damping *= 10.0;
                if damping > s.max_damping {
                    warn!(
                        "LM damping exceeded {:.1e} at iteration {iterations}, stalled at chi2 = {cost:.6e}",
                        s.max_damping
                    );
                    return Err(FlybyError::ConvergenceFailure(
                        FitFailure::DampingExhausted(iterations),
                    ));
                }
            }
            if converged {
                break;
            }
        }

        if !converged {
            return Err(FlybyError::ConvergenceFailure(FitFailure::MaxIterations(
                s.max_iterations,
            )));
        }
        if !model.is_admissible(params.as_slice()) {
            return Err(FlybyError::ConvergenceFailure(
                FitFailure::NonPhysicalSolution(params.as_slice().to_vec()),
            ));
        }

        let covariance = jacobian
            .tr_mul(&jacobian)
            .cholesky()
            .map(|chol| chol.inverse())
            .ok_or(FlybyError::ConvergenceFailure(FitFailure::SingularCovariance))?;

        info!(
            "fit of '{}' converged after {iterations} iteration(s): chi2 = {cost:.6e}, params = [{}]",
            model.name(),
            params.iter().map(|p| format!("{p:.6e}")).join(", ")
        );

        Ok(FitResult {
            model_name: model.name().to_string(),
            parameter_names: model.parameter_names().to_vec(),
            parameters: params,
            covariance,
            chi_squared: cost,
            iterations,
        })
    }
}

/// Largest cosine between the residual vector and a Jacobian column.
fn gradient_converged(jtj: &DMatrix<f64>, jtr: &DVector<f64>, cost: f64, gtol: f64) -> bool {
    let rnorm = cost.sqrt();
    (0..jtr.len())
        .filter(|&j| jtj[(j, j)] > 0.0)
        .map(|j| jtr[j].abs() / (jtj[(j, j)].sqrt() * rnorm))
        .fold(0.0, f64::max)
        <= gtol
}

#[cfg(test)]
mod fit_test {
    use super::*;
    use crate::models::{ClosureModel, ModelVariant, UnifiedCoefficients};
    use approx::assert_relative_eq;

    fn problem(factors: &[[f64; 2]], truth: &[f64], model: &ModelVariant) -> FitProblem {
        let n = factors.len();
        let ids = (0..n).map(|i| SpacecraftId::new(format!("SC{i}"))).collect();
        let matrix = DMatrix::from_fn(n, 2, |i, j| factors[i][j]);
        let observed = DVector::from_iterator(n, factors.iter().map(|f| model.predict(f, truth)));
        let sigma = DVector::from_element(n, 1e-3);
        FitProblem::new(ids, matrix, observed, sigma).unwrap()
    }

    const FACTORS: [[f64; 2]; 4] = [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5], [2.0, -1.0]];

    #[test]
    fn test_linear_fit_recovers_truth() {
        let model = ModelVariant::LinearTwoTerm;
        let truth = [3.0e-3, -1.5e-3];
        let pb = problem(&FACTORS, &truth, &model);

        let result = ModelFitter::default().fit(&model, &pb, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(result.parameters[0], truth[0], max_relative = 1e-8);
        assert_relative_eq!(result.parameters[1], truth[1], max_relative = 1e-8);
        assert!(result.chi_squared < 1e-12);

        // Covariance of a linear problem is exact: (AᵀA)⁻¹ σ²
        let a = pb.factors();
        let expected = (a.tr_mul(a) / 1e-6).try_inverse().unwrap();
        assert_relative_eq!(result.covariance, expected, max_relative = 1e-8);
        assert_eq!(result.parameter("g_S").unwrap(), result.parameters[1]);
    }

    #[test]
    fn test_closure_model_uses_numerical_jacobian() {
        let model = ClosureModel::new(
            "exponential",
            vec![Term::Chiral, Term::Scalar],
            vec!["a", "b"],
            |f: &[f64], p: &[f64]| p[0] * (p[1] * f[0]).exp() + f[1],
        );
        let truth = [2.0, 0.3];
        let n = 5;
        let ids = (0..n).map(|i| SpacecraftId::new(format!("SC{i}"))).collect();
        let factors = DMatrix::from_fn(n, 2, |i, j| if j == 0 { i as f64 } else { 0.1 });
        let observed = DVector::from_fn(n, |i, _| model.predict(&[i as f64, 0.1], &truth));
        let pb = FitProblem::new(ids, factors, observed, DVector::from_element(n, 0.01)).unwrap();

        let result = ModelFitter::default().fit(&model, &pb, &[1.0, 0.1]).unwrap();
        assert_relative_eq!(result.parameters[0], 2.0, max_relative = 1e-6);
        assert_relative_eq!(result.parameters[1], 0.3, max_relative = 1e-6);
    }

    #[test]
    fn test_input_validation() {
        let model = ModelVariant::LinearTwoTerm;
        let pb = problem(&FACTORS[..1], &[1.0, 1.0], &model);
        assert_eq!(
            ModelFitter::default().fit(&model, &pb, &[0.0, 0.0]).unwrap_err(),
            FlybyError::InsufficientData {
                context: "model fit",
                required: 2,
                found: 1
            }
        );

        let pb = problem(&FACTORS, &[1.0, 1.0], &model);
        assert!(matches!(
            ModelFitter::default().fit(&model, &pb, &[0.0]),
            Err(FlybyError::InvalidInput(_))
        ));
        let unified = ModelVariant::FourTermUnified(UnifiedCoefficients::unit());
        assert!(matches!(
            ModelFitter::default().fit(&unified, &pb, &[0.0, 1.0]),
            Err(FlybyError::InvalidInput(_))
        ));

        let ids = vec![SpacecraftId::from("A"), SpacecraftId::from("B")];
        assert!(FitProblem::new(
            ids,
            DMatrix::zeros(2, 2),
            DVector::zeros(2),
            DVector::from_vec(vec![1.0, 0.0])
        )
        .is_err());
    }

    #[test]
    fn test_unconstrained_parameter_has_no_covariance() {
        // Scalar factor identically zero: g_S is not constrained
        let model = ModelVariant::LinearTwoTerm;
        let factors = [[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let pb = problem(&factors, &[0.5, 0.0], &model);
        assert_eq!(
            ModelFitter::default().fit(&model, &pb, &[0.1, 0.1]).unwrap_err(),
            FlybyError::ConvergenceFailure(FitFailure::SingularCovariance)
        );
    }

    #[test]
    fn test_negative_magnitude_is_non_physical() {
        // The data is generated with κ < 0, the solver stays on that branch
        let model = ModelVariant::BiphasicTrigonometric;
        let pb = problem(&FACTORS, &[-2.0, 0.3], &model);
        let err = ModelFitter::default().fit(&model, &pb, &[-1.0, 0.2]).unwrap_err();
        assert!(matches!(
            err,
            FlybyError::ConvergenceFailure(FitFailure::NonPhysicalSolution(_))
        ));
    }

    #[test]
    fn test_iteration_budget() {
        let model = ModelVariant::BiphasicTrigonometric;
        let pb = problem(&FACTORS, &[2.0, 0.3], &model);
        let fitter = ModelFitter::new(FitSettings {
            max_iterations: 1,
            ..FitSettings::default()
        });
        assert_eq!(
            fitter.fit(&model, &pb, &[0.5, 1.2]).unwrap_err(),
            FlybyError::ConvergenceFailure(FitFailure::MaxIterations(1))
        );
    }

    #[test]
    fn test_correlation_needs_positive_variances() {
        let mut result = FitResult {
            model_name: "linear-two-term".into(),
            parameter_names: vec!["g_T", "g_S"],
            parameters: DVector::from_vec(vec![1.0, 2.0]),
            covariance: DMatrix::from_row_slice(2, 2, &[4.0, 3.0, 3.0, 9.0]),
            chi_squared: 0.0,
            iterations: 1,
        };
        assert_relative_eq!(result.correlation(0, 1).unwrap(), 0.5);
        assert_relative_eq!(result.correlation(1, 1).unwrap(), 1.0);

        result.covariance[(0, 0)] = 0.0;
        assert_eq!(result.correlation(0, 1), None);
    }

    /// Linear in one parameter, but undefined away from `a = 1`.
    struct DefinedOnlyAtOne;

    impl PredictionModel for DefinedOnlyAtOne {
        fn name(&self) -> &str {
            "defined-only-at-one"
        }

        fn terms(&self) -> &[Term] {
            &[Term::Chiral]
        }

        fn parameter_names(&self) -> &[&'static str] {
            &["a"]
        }

        fn predict(&self, f: &[f64], p: &[f64]) -> f64 {
            if p[0] == 1.0 {
                f[0]
            } else {
                f64::NAN
            }
        }

        fn gradient(&self, f: &[f64], _p: &[f64]) -> Vec<f64> {
            vec![f[0]]
        }
    }

    #[test]
    fn test_stalled_fit_is_an_error() {
        // Every trial step is non-finite: the guess must not come back as a solution
        let model = DefinedOnlyAtOne;
        let n = 3;
        let ids = (0..n).map(|i| SpacecraftId::new(format!("SC{i}"))).collect();
        let factors = DMatrix::from_fn(n, 1, |i, _| 1.0 + i as f64);
        let observed = factors.column(0).map(|f| 50.0 * f);
        let pb = FitProblem::new(ids, factors, observed, DVector::from_element(n, 0.1)).unwrap();

        assert_eq!(
            ModelFitter::default().fit(&model, &pb, &[1.0]).unwrap_err(),
            FlybyError::ConvergenceFailure(FitFailure::DampingExhausted(1))
        );
    }
}
