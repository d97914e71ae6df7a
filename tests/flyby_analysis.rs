use approx::assert_relative_eq;
use flyby::{
    config::FitSettings,
    models::{ModelVariant, PredictionModel},
    readers::read_fixed_predictions_file,
    AnalysisPlan, FlybyAnalysis, FlybyError, SpacecraftId,
};

mod common;
use common::{data_path, fit_ids, flyby_dataset};

#[test]
fn test_six_probe_fit_leaves_near_unexplained() {
    let (factors, observations) = flyby_dataset();
    let thermal =
        read_fixed_predictions_file("thermal recoil", 0, &data_path("thermal_predictions.csv"))
            .unwrap();
    let plan = AnalysisPlan::new(fit_ids())
        .with_held_out("NEAR".into())
        .with_alternative(thermal);

    let model = ModelVariant::LinearTwoTerm;
    let analysis =
        FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default()).unwrap();
    let report = analysis.run(&[0.0, 0.0]).unwrap();

    let fit = report.fit.as_ref().unwrap();
    assert_eq!(fit.parameter_names, vec!["g_T", "g_S"]);
    assert_eq!(report.statistics.degrees_of_freedom, 4);
    assert!(report.statistics.reduced_chi_squared < 2.0);
    assert!(report.statistics.p_value > 0.05);
    assert_eq!(report.residuals.len(), 6);

    let near = report.held_out.as_ref().unwrap();
    assert_eq!(near.id, SpacecraftId::from("NEAR"));
    assert!(near.significance > 5.0);

    let alt = report.alternative.as_ref().unwrap();
    assert_eq!(alt.statistics.degrees_of_freedom, 6);
    assert!(alt.statistics.chi_squared > report.statistics.chi_squared);
    assert!(alt.statistics.p_value < 1e-6);

    let rendered = report.to_string();
    assert!(rendered.contains("Held-out NEAR"));
    assert!(rendered.contains("MESSENGER"));
}

#[test]
fn test_published_parameters_reproduce_half_sigma_residuals() {
    // Observations of the fixture are the linear model at (2e-3, 1e-7) shifted by ±σ/2
    let (factors, observations) = flyby_dataset();
    let model = ModelVariant::LinearTwoTerm;
    let analysis = FlybyAnalysis::new(
        &model,
        &factors,
        &observations,
        AnalysisPlan::new(fit_ids()),
        FitSettings::default(),
    )
    .unwrap();

    let fixed = analysis.evaluate_at(&[2.0e-3, 1.0e-7]).unwrap();
    assert!(fixed.fit.is_none());
    assert_relative_eq!(fixed.statistics.chi_squared, 1.5, max_relative = 1e-9);
    for row in &fixed.residuals {
        assert_relative_eq!(row.significance.abs(), 0.5, max_relative = 1e-9);
    }

    let fitted = analysis.run(&[0.0, 0.0]).unwrap();
    assert!(fitted.statistics.chi_squared <= fixed.statistics.chi_squared);
}

#[test]
fn test_biphasic_reaches_the_linear_minimum() {
    let (factors, observations) = flyby_dataset();
    let settings = FitSettings::default();

    let linear = ModelVariant::LinearTwoTerm;
    let linear_report = FlybyAnalysis::new(
        &linear,
        &factors,
        &observations,
        AnalysisPlan::new(fit_ids()),
        settings,
    )
    .unwrap()
    .run(&[0.0, 0.0])
    .unwrap();

    let biphasic = ModelVariant::BiphasicTrigonometric;
    let biphasic_report = FlybyAnalysis::new(
        &biphasic,
        &factors,
        &observations,
        AnalysisPlan::new(fit_ids()),
        settings,
    )
    .unwrap()
    .run(&[1.0e-3, 1.5])
    .unwrap();

    assert_relative_eq!(
        biphasic_report.statistics.chi_squared,
        linear_report.statistics.chi_squared,
        max_relative = 1e-6
    );
    let (gt, gs) = biphasic
        .effective_couplings(&biphasic_report.parameters)
        .unwrap();
    assert_relative_eq!(gt, linear_report.parameters[0], max_relative = 1e-4);
    assert_relative_eq!(gs, linear_report.parameters[1], max_relative = 1e-4);
}

#[test]
fn test_zero_degrees_of_freedom_is_a_sentinel() {
    let (factors, observations) = flyby_dataset();
    let model = ModelVariant::LinearTwoTerm;
    let plan = AnalysisPlan::new(vec!["Rosetta".into(), "MESSENGER".into()]);
    let report = FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
        .unwrap()
        .run(&[0.0, 0.0])
        .unwrap();

    assert!(report.statistics.is_degenerate());
    assert_eq!(report.statistics.degrees_of_freedom, 0);
    assert_eq!(report.statistics.reduced_chi_squared, f64::INFINITY);
    assert_eq!(report.statistics.p_value, 0.0);
}

#[test]
fn test_unknown_spacecraft_is_reported() {
    let (factors, observations) = flyby_dataset();
    let model = ModelVariant::LinearTwoTerm;
    let plan = AnalysisPlan::new(vec!["Rosetta".into(), "MESSENGER".into(), "Voyager".into()]);
    let err = FlybyAnalysis::new(&model, &factors, &observations, plan, FitSettings::default())
        .unwrap()
        .run(&[0.0, 0.0])
        .unwrap_err();
    assert_eq!(
        err,
        FlybyError::NotFound {
            kind: "spacecraft factors",
            key: "Voyager".into()
        }
    );
}
