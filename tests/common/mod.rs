#![allow(dead_code)]

use approx::assert_relative_eq;
use camino::Utf8PathBuf;
use flyby::{
    readers::{read_factor_table_file, read_observations_file},
    FactorTable, ObservationSet, SpacecraftId,
};

/// Spacecraft of the global fit; NEAR is held out.
pub const FIT_IDS: [&str; 6] = [
    "Galileo_I",
    "Cassini",
    "Rosetta",
    "MESSENGER",
    "Juno",
    "OSIRIS_REx",
];

pub fn data_path(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn fit_ids() -> Vec<SpacecraftId> {
    FIT_IDS.iter().map(|id| SpacecraftId::from(*id)).collect()
}

/// Aggregate chiral/scalar factors and observed anomalies of the seven flybys.
pub fn flyby_dataset() -> (FactorTable, ObservationSet) {
    let factors = read_factor_table_file(&data_path("integrals.csv")).unwrap();
    let observations = read_observations_file(&data_path("observations.csv")).unwrap();
    (factors, observations)
}

pub fn assert_params_close(actual: &[f64], expected: &[f64], max_relative: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, *e, max_relative = max_relative);
    }
}
