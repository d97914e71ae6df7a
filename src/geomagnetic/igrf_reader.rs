//! Parser for the standard IGRF coefficient table.
//!
//! The table published with each IGRF generation has the layout
//!
//! ```text
//! # comments
//! c/s deg ord  IGRF   IGRF  ...   SV
//! g/h   n   m  1900.0 1905.0 ... 2020.0 2020-25
//! g     1   0 -31543 -31464 ... -29404.8   5.7
//! h     1   1   5922   5909 ...   4652.5 -25.9
//! ```
//!
//! Every data row carries one value per epoch followed by the secular variation.

use nom::{
    character::complete::{one_of, space0, space1, u32 as parse_u32},
    multi::many1,
    number::complete::double,
    sequence::preceded,
    IResult, Parser,
};

use super::GaussCoefficients;
use crate::flyby_errors::FlybyError;

/// Coefficients of an IGRF table, one snapshot per epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct IgrfTable {
    pub epochs: Vec<f64>,
    pub snapshots: Vec<GaussCoefficients>,
    pub secular_variation: GaussCoefficients,
}

struct CoefficientRow {
    is_g: bool,
    n: usize,
    m: usize,
    values: Vec<f64>,
}

fn parse_row(input: &str) -> IResult<&str, CoefficientRow> {
    let (rest, (kind, n, m, values)) = (
        preceded(space0, one_of("gh")),
        preceded(space1, parse_u32),
        preceded(space1, parse_u32),
        many1(preceded(space1, double)),
    )
        .parse(input)?;

    Ok((
        rest,
        CoefficientRow {
            is_g: kind == 'g',
            n: n as usize,
            m: m as usize,
            values,
        },
    ))
}

/// Epoch columns of the `g/h n m ...` header; the trailing SV label is not an epoch.
fn parse_epoch_header(line: &str) -> Result<Vec<f64>, FlybyError> {
    let labels: Vec<&str> = line.split_whitespace().skip(3).collect();
    let (_sv, epochs) = labels.split_last().ok_or_else(|| {
        FlybyError::CoefficientParsing(format!("no epoch column in header: {line}"))
    })?;

    epochs
        .iter()
        .map(|label| {
            label
                .parse::<f64>()
                .map_err(|_| FlybyError::CoefficientParsing(format!("invalid epoch '{label}'")))
        })
        .collect()
}

/// Parse an IGRF coefficient table.
///
/// # Errors
/// * `FlybyError::CoefficientParsing` if the header is missing, a row cannot be parsed,
///   or a row does not have one value per epoch plus the secular variation.
pub fn parse_igrf_table(content: &str) -> Result<IgrfTable, FlybyError> {
    let mut epochs: Option<Vec<f64>> = None;
    let mut rows = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("c/s") {
            continue;
        }
        if trimmed.starts_with("g/h") {
            epochs = Some(parse_epoch_header(trimmed)?);
            continue;
        }

        let (rest, row) =
            parse_row(trimmed).map_err(|_| FlybyError::CoefficientParsing(line.to_string()))?;
        if !rest.trim().is_empty() {
            return Err(FlybyError::CoefficientParsing(line.to_string()));
        }
        rows.push(row);
    }

    let epochs = epochs
        .ok_or_else(|| FlybyError::CoefficientParsing("missing 'g/h n m' header".into()))?;
    let degree = rows.iter().map(|r| r.n).max().ok_or_else(|| {
        FlybyError::CoefficientParsing("no coefficient rows in table".into())
    })?;

    let mut snapshots = vec![GaussCoefficients::zeros(degree); epochs.len()];
    let mut secular_variation = GaussCoefficients::zeros(degree);

    for row in &rows {
        if row.values.len() != epochs.len() + 1 {
            return Err(FlybyError::CoefficientParsing(format!(
                "row ({}, {}) has {} values, expected {}",
                row.n,
                row.m,
                row.values.len(),
                epochs.len() + 1
            )));
        }

        let targets = snapshots.iter_mut().chain(std::iter::once(&mut secular_variation));
        for (coeffs, &value) in targets.zip(row.values.iter()) {
            if row.is_g {
                coeffs.set_g(row.n, row.m, value)?;
            } else {
                coeffs.set_h(row.n, row.m, value)?;
            }
        }
    }

    Ok(IgrfTable {
        epochs,
        snapshots,
        secular_variation,
    })
}
