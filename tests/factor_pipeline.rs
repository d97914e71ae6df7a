use approx::assert_relative_eq;
use flyby::{
    geomagnetic::{FieldEvaluator, SphericalHarmonicModel},
    readers::read_horizons_file,
    trajectory::trajectory_set,
    AnalysisConfig, FactorPipeline, FactorTable, Term, Trajectory,
};

mod common;
use common::data_path;

fn derivable_terms() -> Vec<Term> {
    Term::ALL.into_iter().filter(Term::is_derivable).collect()
}

fn flyby(id: &str) -> Trajectory {
    read_horizons_file(id, &data_path("flyby_vectors.csv")).unwrap()
}

#[test]
fn test_factors_of_synthetic_flyby() {
    let traj = flyby("SYNTH");
    assert_eq!(traj.len(), 13);
    assert_relative_eq!(
        *traj.elapsed_seconds().last().unwrap(),
        3600.0,
        epsilon = 1e-3
    );

    let pipeline = FactorPipeline::new(&AnalysisConfig::default());
    let factors = pipeline.derive(&traj, &derivable_terms()).unwrap();
    assert_eq!(factors.len(), 7);
    assert!(factors.iter().all(|(_, v)| v.is_finite()));

    assert!(factors.get(Term::LorentzResonance).unwrap() > 0.0);
    assert!(factors.get(Term::SolarAltitude).unwrap() < 0.0);
    assert!(factors.get(Term::SolarLatitude).unwrap() < 0.0);
    assert_relative_eq!(
        factors.get(Term::Universal).unwrap(),
        factors.get(Term::LorentzResonance).unwrap() + factors.get(Term::EquatorialBraking).unwrap(),
        max_relative = 1e-12
    );
}

#[test]
fn test_solar_term_vanishes_above_ceiling() {
    // The synthetic flyby never goes below ~629 km
    let config = AnalysisConfig::builder()
        .solar_altitude_ceiling_m(100e3)
        .build()
        .unwrap();
    let pipeline = FactorPipeline::new(&config);
    let factors = pipeline
        .derive(&flyby("SYNTH"), &[Term::SolarAltitude])
        .unwrap();
    assert_eq!(factors.get(Term::SolarAltitude).unwrap(), 0.0);
}

#[test]
fn test_derive_all_matches_single_derivations() {
    let pipeline = FactorPipeline::new(&AnalysisConfig::default());
    let terms = [Term::Rotational, Term::LorentzResonance, Term::SolarAltitude];
    let set = trajectory_set([flyby("A"), flyby("B")]).unwrap();

    let table = pipeline.derive_all(&set, &terms).unwrap();
    let expected: FactorTable = set
        .iter()
        .map(|(id, traj)| (id.clone(), pipeline.derive(traj, &terms).unwrap()))
        .collect();
    assert_eq!(table, expected);
    assert_eq!(table.len(), 2);
}

#[test]
fn test_igrf_file_matches_builtin_model() {
    let from_file =
        SphericalHarmonicModel::from_igrf_file(&data_path("igrf13_degree4.txt")).unwrap();
    assert_eq!(from_file.degree(), 4);

    let file_field = FieldEvaluator::new(from_file);
    let builtin: FieldEvaluator<SphericalHarmonicModel> = FieldEvaluator::default();
    for (lat, lon, h) in [(0.3, 1.2, 500e3), (-1.1, -2.5, 2_000e3), (1.5, 0.0, 10_000e3)] {
        let a = file_field.field_at(lat, lon, h, 2021.5).unwrap();
        let b = builtin.field_at(lat, lon, h, 2021.5).unwrap();
        for k in 0..3 {
            assert_relative_eq!(a[k], b[k], max_relative = 1e-12, epsilon = 1e-18);
        }
    }

    // The file model does not extrapolate before its first epoch
    assert!(file_field.field_at(0.3, 1.2, 500e3, 2019.0).is_err());
}
