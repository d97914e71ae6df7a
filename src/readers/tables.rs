//! CSV tables of observations, factors and fixed predictions.
//!
//! | Table             | Columns                                          |
//! |-------------------|--------------------------------------------------|
//! | observations      | `spacecraft, dv_obs_mm_s, dv_err_mm_s`           |
//! | factors           | `spacecraft, <term>, <term>, ...`                |
//! | fixed predictions | `spacecraft, dv_pred_mm_s`                       |
//!
//! Term headers use the short names of [`Term`] (`rot`, `lor`, `bra`, `sol`,
//! `universal`, `solar`, `geodetic`, `chiral_total`, `scalar_total`).

use std::io;

use camino::Utf8Path;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::{
    analysis::FixedPredictions,
    constants::{SpacecraftId, MM_S_TO_M_S},
    factors::{FactorTable, PhysicalFactors},
    flyby_errors::FlybyError,
    integrands::Term,
    observations::{ObservationRecord, ObservationSet},
};

#[derive(Debug, Deserialize)]
struct ObservationRow {
    spacecraft: String,
    dv_obs_mm_s: f64,
    dv_err_mm_s: f64,
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    spacecraft: String,
    dv_pred_mm_s: f64,
}

fn csv_reader<R: io::Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input)
}

/// Read an observation table. Duplicated spacecraft are rejected.
pub fn read_observations<R: io::Read>(input: R) -> Result<ObservationSet, FlybyError> {
    let mut set = ObservationSet::new();
    for row in csv_reader(input).deserialize::<ObservationRow>() {
        let row = row?;
        let record = ObservationRecord::from_mm_s(row.spacecraft, row.dv_obs_mm_s, row.dv_err_mm_s)?;
        if let Some(previous) = set.insert(record) {
            return Err(FlybyError::InvalidInput(format!(
                "duplicated observation for {}",
                previous.id
            )));
        }
    }
    Ok(set)
}

pub fn read_observations_file(path: &Utf8Path) -> Result<ObservationSet, FlybyError> {
    read_observations(std::fs::File::open(path)?)
}

/// Read a wide factor table.
///
/// # Errors
/// * `FlybyError::NotFound` for an unknown term header,
/// * `FlybyError::InvalidInput` for a missing `spacecraft` column, a duplicated row or a
///   non-finite factor.
pub fn read_factor_table<R: io::Read>(input: R) -> Result<FactorTable, FlybyError> {
    let mut reader = csv_reader(input);
    let headers = reader.headers()?.clone();
    match headers.get(0) {
        Some("spacecraft") => {}
        other => {
            return Err(FlybyError::InvalidInput(format!(
                "factor table must start with a 'spacecraft' column, found {other:?}"
            )))
        }
    }
    let terms = headers
        .iter()
        .skip(1)
        .map(str::parse::<Term>)
        .collect::<Result<Vec<_>, _>>()?;

    let mut table = FactorTable::new();
    for record in reader.records() {
        let record = record?;
        let id = SpacecraftId::from(record.get(0).unwrap_or_default());
        let values = record
            .iter()
            .skip(1)
            .map(|v| {
                v.parse::<f64>().map_err(|e| {
                    FlybyError::InvalidInput(format!("factor '{v}' of {id}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let factors = PhysicalFactors::from_pairs(terms.iter().copied().zip(values))?;

        if table.get(&id).is_ok() {
            return Err(FlybyError::InvalidInput(format!(
                "duplicated factor row for {id}"
            )));
        }
        table.insert(id, factors);
    }
    Ok(table)
}

pub fn read_factor_table_file(path: &Utf8Path) -> Result<FactorTable, FlybyError> {
    read_factor_table(std::fs::File::open(path)?)
}

/// Read the predictions of a fixed alternative model with `n_params` declared parameters.
pub fn read_fixed_predictions<R: io::Read>(
    name: &str,
    n_params: usize,
    input: R,
) -> Result<FixedPredictions, FlybyError> {
    let mut predictions = FixedPredictions::new(name, n_params);
    for row in csv_reader(input).deserialize::<PredictionRow>() {
        let row = row?;
        predictions.insert(row.spacecraft, row.dv_pred_mm_s * MM_S_TO_M_S)?;
    }
    Ok(predictions)
}

pub fn read_fixed_predictions_file(
    name: &str,
    n_params: usize,
    path: &Utf8Path,
) -> Result<FixedPredictions, FlybyError> {
    read_fixed_predictions(name, n_params, std::fs::File::open(path)?)
}

#[cfg(test)]
mod tables_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_observations() {
        let csv = "\
spacecraft,dv_obs_mm_s,dv_err_mm_s
# Galileo first Earth flyby
Galileo_I, 3.92, 0.30
NEAR, 13.46, 0.01
";
        let set = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);
        let near = set.get(&"NEAR".into()).unwrap();
        assert_relative_eq!(near.anomaly, 13.46e-3, max_relative = 1e-14);
        assert_relative_eq!(near.uncertainty, 1e-5, max_relative = 1e-14);

        let bad = "spacecraft,dv_obs_mm_s,dv_err_mm_s\nNEAR,13.46,0.0\n";
        assert!(matches!(
            read_observations(bad.as_bytes()),
            Err(FlybyError::InvalidInput(_))
        ));
        let dup = "spacecraft,dv_obs_mm_s,dv_err_mm_s\nNEAR,1,1\nNEAR,2,1\n";
        assert!(read_observations(dup.as_bytes()).is_err());
    }

    #[test]
    fn test_factor_table() {
        let csv = "\
spacecraft,chiral_total,scalar_total
Galileo_I,1.04,1.23e4
Cassini,-0.58,1.05e4
";
        let table = read_factor_table(csv.as_bytes()).unwrap();
        assert_eq!(
            table
                .row(&"Cassini".into(), &[Term::Scalar, Term::Chiral])
                .unwrap(),
            vec![1.05e4, -0.58]
        );

        let unknown = "spacecraft,chiral_total,dark_matter\nA,1,2\n";
        assert!(matches!(
            read_factor_table(unknown.as_bytes()),
            Err(FlybyError::NotFound { kind: "term", .. })
        ));
        let no_id = "name,rot\nA,1\n";
        assert!(matches!(
            read_factor_table(no_id.as_bytes()),
            Err(FlybyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fixed_predictions() {
        let csv = "spacecraft,dv_pred_mm_s\nCassini,-1.62\nRosetta,0.15\n";
        let thermal = read_fixed_predictions("thermal", 0, csv.as_bytes()).unwrap();
        assert_relative_eq!(
            thermal.get(&"Cassini".into()).unwrap(),
            -1.62e-3,
            max_relative = 1e-14
        );
        assert!(thermal.get(&"NEAR".into()).is_err());
    }
}
