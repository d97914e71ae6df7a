//! # Prediction models
//!
//! A prediction model maps the physical factors of one spacecraft and a free-parameter
//! vector to a predicted velocity anomaly (m/s). Every model of this crate combines the
//! factors through two *effective couplings* `(g_T, g_S)`: a chiral (tensor) coupling and
//! a scalar coupling. The models differ in which factors they consume and in how the free
//! parameters map onto the couplings.
//!
//! | Variant                  | Factors                                   | Free parameters |
//! |--------------------------|-------------------------------------------|-----------------|
//! | `LinearTwoTerm`          | `chiral_total, scalar_total`              | `g_T, g_S`      |
//! | `BiphasicTrigonometric`  | `chiral_total, scalar_total`              | `kappa, delta_theta` |
//! | `FourTermUnified`        | `rot, lor, bra, sol`                      | `g_T, g_S`      |
//! | `ThreeTermScaled`        | `universal, solar, geodetic`              | `g_T, g_S`      |
//!
//! The fixed coefficients of the unified and scaled models are domain constants held in
//! [`UnifiedCoefficients`] and [`ReferenceCouplings`]; they never enter the parameter
//! vector seen by the fitter.
//!
//! Arbitrary user prediction functions are supported through [`ClosureModel`], whose
//! Jacobian falls back to central finite differences.

use std::{f64::consts::PI, fmt, str::FromStr};

use crate::{flyby_errors::FlybyError, integrands::Term};

/// A prediction function usable by the fitter.
pub trait PredictionModel {
    fn name(&self) -> &str;

    /// Factor terms consumed by [`PredictionModel::predict`], in order.
    fn terms(&self) -> &[Term];

    fn parameter_names(&self) -> &[&'static str];

    fn n_params(&self) -> usize {
        self.parameter_names().len()
    }

    /// Predicted anomaly (m/s) for one spacecraft.
    ///
    /// `factors` follows the order of [`PredictionModel::terms`].
    fn predict(&self, factors: &[f64], params: &[f64]) -> f64;

    /// Partial derivatives of [`PredictionModel::predict`] with respect to each parameter.
    ///
    /// The default implementation uses central differences with a step relative to the
    /// magnitude of each parameter (absolute for a parameter at zero).
    fn gradient(&self, factors: &[f64], params: &[f64]) -> Vec<f64> {
        let mut shifted = params.to_vec();
        (0..params.len())
            .map(|j| {
                let scale = if params[j] == 0.0 { 1.0 } else { params[j].abs() };
                let h = f64::EPSILON.cbrt() * scale;
                shifted[j] = params[j] + h;
                let forward = self.predict(factors, &shifted);
                shifted[j] = params[j] - h;
                let backward = self.predict(factors, &shifted);
                shifted[j] = params[j];
                (forward - backward) / (2.0 * h)
            })
            .collect()
    }

    /// Whether `params` is a physically meaningful solution.
    fn is_admissible(&self, params: &[f64]) -> bool {
        params.iter().all(|p| p.is_finite())
    }

    /// Chiral and scalar couplings `(g_T, g_S)` implied by `params`, when the model
    /// defines them.
    fn effective_couplings(&self, _params: &[f64]) -> Option<(f64, f64)> {
        None
    }
}

/// Fixed coefficients of the four-term unified model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedCoefficients {
    pub rotational: f64,
    pub lorentz: f64,
    pub braking: f64,
    pub solar: f64,
    /// Global scale applied to the sum
    pub scale: f64,
}

impl UnifiedCoefficients {
    /// Coefficients derived from the coupling theory.
    pub fn theory() -> Self {
        UnifiedCoefficients {
            rotational: 1.0 / (2.0 * PI),
            lorentz: 1.0 / (4.0 * PI),
            braking: -1.0,
            solar: -0.05,
            scale: 1e8,
        }
    }

    /// All coefficients and the scale set to one.
    pub fn unit() -> Self {
        UnifiedCoefficients {
            rotational: 1.0,
            lorentz: 1.0,
            braking: 1.0,
            solar: 1.0,
            scale: 1.0,
        }
    }
}

impl Default for UnifiedCoefficients {
    fn default() -> Self {
        Self::theory()
    }
}

/// Reference couplings normalizing the three-term scaled model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCouplings {
    pub g_t0: f64,
    pub g_s0: f64,
}

impl Default for ReferenceCouplings {
    fn default() -> Self {
        ReferenceCouplings {
            g_t0: 3.9634,
            g_s0: 1.8676e-5,
        }
    }
}

const TWO_TERM: [Term; 2] = [Term::Chiral, Term::Scalar];
const FOUR_TERM: [Term; 4] = [
    Term::Rotational,
    Term::LorentzResonance,
    Term::EquatorialBraking,
    Term::SolarAltitude,
];
const THREE_TERM: [Term; 3] = [Term::Universal, Term::SolarLatitude, Term::GeodeticJ2];

const COUPLING_PARAMS: [&str; 2] = ["g_T", "g_S"];
const PHASE_PARAMS: [&str; 2] = ["kappa", "delta_theta"];

/// The prediction models of the flyby analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelVariant {
    /// `Δv = g_T·I_chiral + g_S·I_scalar`
    LinearTwoTerm,
    /// Linear two-term model with `g_T = κ sin Δθ` and `g_S = κ cos Δθ`.
    ///
    /// A spacecraft whose chiral factor vanishes only constrains `κ cos Δθ`, so at least
    /// two spacecraft with independent factors are needed to fix both parameters.
    BiphasicTrigonometric,
    /// `Δv = s·(C_rot g_S f_rot + C_L g_T²/g_S f_lor + C_B g_T f_bra + C_S g_S f_sol)`
    FourTermUnified(UnifiedCoefficients),
    /// `Δv = (g_T/g_T0)² (g_S0/g_S) u + (g_S/g_S0)(s + g)`
    ThreeTermScaled(ReferenceCouplings),
}

impl ModelVariant {
    pub const LINEAR_TWO_TERM: &'static str = "linear-two-term";
    pub const BIPHASIC_TRIGONOMETRIC: &'static str = "biphasic-trigonometric";
    pub const FOUR_TERM_UNIFIED: &'static str = "four-term-unified";
    pub const THREE_TERM_SCALED: &'static str = "three-term-scaled";
}

impl PredictionModel for ModelVariant {
    fn name(&self) -> &str {
        match self {
            ModelVariant::LinearTwoTerm => Self::LINEAR_TWO_TERM,
            ModelVariant::BiphasicTrigonometric => Self::BIPHASIC_TRIGONOMETRIC,
            ModelVariant::FourTermUnified(_) => Self::FOUR_TERM_UNIFIED,
            ModelVariant::ThreeTermScaled(_) => Self::THREE_TERM_SCALED,
        }
    }

    fn terms(&self) -> &[Term] {
        match self {
            ModelVariant::LinearTwoTerm | ModelVariant::BiphasicTrigonometric => &TWO_TERM,
            ModelVariant::FourTermUnified(_) => &FOUR_TERM,
            ModelVariant::ThreeTermScaled(_) => &THREE_TERM,
        }
    }

    fn parameter_names(&self) -> &[&'static str] {
        match self {
            ModelVariant::BiphasicTrigonometric => &PHASE_PARAMS,
            _ => &COUPLING_PARAMS,
        }
    }

    fn predict(&self, f: &[f64], p: &[f64]) -> f64 {
        match *self {
            ModelVariant::LinearTwoTerm => p[0] * f[0] + p[1] * f[1],
            ModelVariant::BiphasicTrigonometric => {
                let (sin, cos) = p[1].sin_cos();
                p[0] * (sin * f[0] + cos * f[1])
            }
            ModelVariant::FourTermUnified(c) => {
                let (gt, gs) = (p[0], p[1]);
                c.scale
                    * (c.rotational * gs * f[0]
                        + c.lorentz * gt * gt / gs * f[1]
                        + c.braking * gt * f[2]
                        + c.solar * gs * f[3])
            }
            ModelVariant::ThreeTermScaled(r) => {
                let (gt, gs) = (p[0], p[1]);
                (gt / r.g_t0).powi(2) * (r.g_s0 / gs) * f[0] + (gs / r.g_s0) * (f[1] + f[2])
            }
        }
    }

    fn gradient(&self, f: &[f64], p: &[f64]) -> Vec<f64> {
        match *self {
            ModelVariant::LinearTwoTerm => vec![f[0], f[1]],
            ModelVariant::BiphasicTrigonometric => {
                let (sin, cos) = p[1].sin_cos();
                vec![sin * f[0] + cos * f[1], p[0] * (cos * f[0] - sin * f[1])]
            }
            ModelVariant::FourTermUnified(c) => {
                let (gt, gs) = (p[0], p[1]);
                vec![
                    c.scale * (2.0 * c.lorentz * gt / gs * f[1] + c.braking * f[2]),
                    c.scale
                        * (c.rotational * f[0] - c.lorentz * (gt / gs).powi(2) * f[1]
                            + c.solar * f[3]),
                ]
            }
            ModelVariant::ThreeTermScaled(r) => {
                let (gt, gs) = (p[0], p[1]);
                vec![
                    2.0 * gt / (r.g_t0 * r.g_t0) * (r.g_s0 / gs) * f[0],
                    -(gt / r.g_t0).powi(2) * r.g_s0 / (gs * gs) * f[0] + (f[1] + f[2]) / r.g_s0,
                ]
            }
        }
    }

    fn is_admissible(&self, p: &[f64]) -> bool {
        if !p.iter().all(|x| x.is_finite()) {
            return false;
        }
        match self {
            ModelVariant::LinearTwoTerm => true,
            ModelVariant::BiphasicTrigonometric => p[0] > 0.0,
            ModelVariant::FourTermUnified(_) | ModelVariant::ThreeTermScaled(_) => p[1] > 0.0,
        }
    }

    fn effective_couplings(&self, p: &[f64]) -> Option<(f64, f64)> {
        match self {
            ModelVariant::BiphasicTrigonometric => {
                let (sin, cos) = p[1].sin_cos();
                Some((p[0] * sin, p[0] * cos))
            }
            _ => Some((p[0], p[1])),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse a model name. The unified and scaled models get their default constants.
impl FromStr for ModelVariant {
    type Err = FlybyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            Self::LINEAR_TWO_TERM => Ok(ModelVariant::LinearTwoTerm),
            Self::BIPHASIC_TRIGONOMETRIC => Ok(ModelVariant::BiphasicTrigonometric),
            Self::FOUR_TERM_UNIFIED => Ok(ModelVariant::FourTermUnified(
                UnifiedCoefficients::default(),
            )),
            Self::THREE_TERM_SCALED => Ok(ModelVariant::ThreeTermScaled(
                ReferenceCouplings::default(),
            )),
            other => Err(FlybyError::NotFound {
                kind: "model",
                key: other.to_string(),
            }),
        }
    }
}

/// A prediction model defined by a closure `(factors, params) -> Δv`.
pub struct ClosureModel<F> {
    name: String,
    terms: Vec<Term>,
    parameter_names: Vec<&'static str>,
    prediction: F,
}

impl<F> ClosureModel<F>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    pub fn new(
        name: impl Into<String>,
        terms: Vec<Term>,
        parameter_names: Vec<&'static str>,
        prediction: F,
    ) -> Self {
        ClosureModel {
            name: name.into(),
            terms,
            parameter_names,
            prediction,
        }
    }
}

impl<F> fmt::Debug for ClosureModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureModel")
            .field("name", &self.name)
            .field("terms", &self.terms)
            .field("parameter_names", &self.parameter_names)
            .finish_non_exhaustive()
    }
}

impl<F> PredictionModel for ClosureModel<F>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn terms(&self) -> &[Term] {
        &self.terms
    }

    fn parameter_names(&self) -> &[&'static str] {
        &self.parameter_names
    }

    fn predict(&self, factors: &[f64], params: &[f64]) -> f64 {
        (self.prediction)(factors, params)
    }
}

#[cfg(test)]
mod models_test {
    use super::*;
    use approx::assert_relative_eq;

    fn numerical(model: &ModelVariant) -> ClosureModel<impl Fn(&[f64], &[f64]) -> f64 + '_> {
        ClosureModel::new(
            "numerical",
            model.terms().to_vec(),
            model.parameter_names().to_vec(),
            move |f: &[f64], p: &[f64]| model.predict(f, p),
        )
    }

    #[test]
    fn test_zeroed_term_reproduces_reduced_formula() {
        let c = UnifiedCoefficients::theory();
        let model = ModelVariant::FourTermUnified(c);
        let (gt, gs) = (2.0, 0.5);
        let f = [3.0e-4, 0.0, -1.2e-3, 7.0e-6];
        let expected = c.scale * (c.rotational * gs * f[0] + c.braking * gt * f[2] + c.solar * gs * f[3]);
        assert_relative_eq!(model.predict(&f, &[gt, gs]), expected, max_relative = 1e-14);

        let model = ModelVariant::LinearTwoTerm;
        assert_eq!(model.predict(&[0.0, 4.0], &[123.0, 0.25]), 1.0);
    }

    #[test]
    fn test_biphasic_matches_linear_at_effective_couplings() {
        let biphasic = ModelVariant::BiphasicTrigonometric;
        let params = [1.7, 0.4];
        let (gt, gs) = biphasic.effective_couplings(&params).unwrap();
        assert_relative_eq!(gt, 1.7 * 0.4_f64.sin(), epsilon = 1e-15);

        let f = [0.03, -0.11];
        assert_relative_eq!(
            biphasic.predict(&f, &params),
            ModelVariant::LinearTwoTerm.predict(&f, &[gt, gs]),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_analytic_gradients_match_finite_differences() {
        let cases = [
            (ModelVariant::LinearTwoTerm, vec![0.2, -0.3], vec![1.5, 0.8]),
            (ModelVariant::BiphasicTrigonometric, vec![0.2, -0.3], vec![1.5, 0.8]),
            (
                ModelVariant::FourTermUnified(UnifiedCoefficients::unit()),
                vec![0.2, -0.3, 0.05, 1.1],
                vec![1.5, 0.8],
            ),
            (
                ModelVariant::ThreeTermScaled(ReferenceCouplings::default()),
                vec![1.0e-6, 2.0e-12, -3.0e-12],
                vec![4.2, 2.1e-5],
            ),
        ];

        for (model, f, p) in cases {
            let analytic = model.gradient(&f, &p);
            let numeric = numerical(&model).gradient(&f, &p);
            for (a, n) in analytic.iter().zip(&numeric) {
                assert_relative_eq!(*a, *n, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_admissibility() {
        assert!(!ModelVariant::BiphasicTrigonometric.is_admissible(&[-1.0, 0.3]));
        assert!(ModelVariant::BiphasicTrigonometric.is_admissible(&[1.0, 0.3]));
        let unified = ModelVariant::FourTermUnified(UnifiedCoefficients::unit());
        assert!(!unified.is_admissible(&[1.0, 0.0]));
        assert!(!ModelVariant::LinearTwoTerm.is_admissible(&[f64::NAN, 0.0]));
        assert!(ModelVariant::LinearTwoTerm.is_admissible(&[-1.0, -2.0]));
    }

    #[test]
    fn test_parse_model_names() {
        assert_eq!(
            "three-term-scaled".parse::<ModelVariant>().unwrap(),
            ModelVariant::ThreeTermScaled(ReferenceCouplings::default())
        );
        assert_eq!(
            ModelVariant::FourTermUnified(UnifiedCoefficients::unit()).to_string(),
            "four-term-unified"
        );
        assert!(matches!(
            "quadratic".parse::<ModelVariant>(),
            Err(FlybyError::NotFound { kind: "model", .. })
        ));
    }
}
