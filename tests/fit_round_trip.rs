use flyby::{
    config::FitSettings,
    models::{ModelVariant, PredictionModel, ReferenceCouplings, UnifiedCoefficients},
    FitProblem, ModelFitter, SpacecraftId,
};
use nalgebra::{DMatrix, DVector};

mod common;
use common::assert_params_close;

/// Noiseless observations of `model` at `truth`, with heterogeneous uncertainties.
fn synthetic_problem<const K: usize>(
    model: &ModelVariant,
    factors: &[[f64; K]],
    truth: &[f64],
) -> FitProblem {
    let n = factors.len();
    let ids = (0..n).map(|i| SpacecraftId::new(format!("SC{i}"))).collect();
    let matrix = DMatrix::from_fn(n, K, |i, j| factors[i][j]);
    let observed = DVector::from_iterator(n, factors.iter().map(|f| model.predict(f, truth)));
    let sigma = DVector::from_iterator(n, (0..n).map(|i| 1e-4 * (1.0 + i as f64)));
    FitProblem::new(ids, matrix, observed, sigma).unwrap()
}

#[test]
fn test_unified_unit_model_round_trip() {
    let model = ModelVariant::FourTermUnified(UnifiedCoefficients::unit());
    let factors = [
        [1.0, 0.5, 0.2, 0.1],
        [0.3, 1.0, -0.4, 0.2],
        [0.0, 0.2, 1.0, 0.5],
        [0.7, 0.0, 0.3, -1.0],
    ];
    let truth = [1.5, 0.8];
    let problem = synthetic_problem(&model, &factors, &truth);

    let fit = ModelFitter::new(FitSettings::default())
        .fit(&model, &problem, &[1.0, 1.0])
        .unwrap();
    assert_params_close(fit.parameters.as_slice(), &truth, 1e-6);
    assert!(fit.chi_squared < 1e-10);
    assert!(fit.uncertainties().iter().all(|s| s.is_finite() && *s > 0.0));
}

#[test]
fn test_biphasic_model_round_trip() {
    let model = ModelVariant::BiphasicTrigonometric;
    let factors = [[1.0, 0.2], [0.1, 1.0], [0.6, 0.6], [-0.4, 0.9]];
    let truth = [2.5, 0.6];
    let problem = synthetic_problem(&model, &factors, &truth);

    let fit = ModelFitter::default()
        .fit(&model, &problem, &[1.0, 0.2])
        .unwrap();
    assert_params_close(fit.parameters.as_slice(), &truth, 1e-6);

    let (gt, gs) = model.effective_couplings(fit.parameters.as_slice()).unwrap();
    assert_params_close(&[gt, gs], &[2.5 * 0.6_f64.sin(), 2.5 * 0.6_f64.cos()], 1e-6);
}

#[test]
fn test_three_term_scaled_round_trip() {
    let reference = ReferenceCouplings::default();
    let model = ModelVariant::ThreeTermScaled(reference);
    let factors = [
        [1.0e-3, 2.0e-3, 1.0e-4],
        [4.0e-3, -1.0e-3, 0.0],
        [0.0, 3.0e-3, -2.0e-4],
        [2.0e-3, 0.0, 5.0e-4],
    ];
    let truth = [1.2 * reference.g_t0, 0.9 * reference.g_s0];
    let problem = synthetic_problem(&model, &factors, &truth);

    let fit = ModelFitter::default()
        .fit(&model, &problem, &[reference.g_t0, reference.g_s0])
        .unwrap();
    assert_params_close(fit.parameters.as_slice(), &truth, 1e-6);
}

#[test]
fn test_unified_theory_model_round_trip() {
    // Couplings of order 4 and 2e-5 with the 1e8 global scale
    let model = ModelVariant::FourTermUnified(UnifiedCoefficients::theory());
    let factors = [
        [3.0e-6, 1.0e-16, 2.0e-12, 1.0e-5],
        [-2.0e-6, 3.0e-16, -1.0e-12, 5.0e-6],
        [1.0e-6, 0.5e-16, 4.0e-12, -8.0e-6],
        [4.0e-6, 2.0e-16, 0.0, 2.0e-5],
        [0.0, 1.5e-16, -3.0e-12, 1.2e-5],
    ];
    let truth = [3.6, 2.2e-5];
    let problem = synthetic_problem(&model, &factors, &truth);

    let fit = ModelFitter::default()
        .fit(&model, &problem, &[4.0, 2.0e-5])
        .unwrap();
    assert_params_close(fit.parameters.as_slice(), &truth, 1e-6);

    let sigma = fit.uncertainties();
    for (j, t) in truth.iter().enumerate() {
        assert!(sigma[j].is_finite() && sigma[j] > 0.0);
        assert!((fit.parameters[j] - t).abs() <= sigma[j]);
    }
}
