//! JPL Horizons vector tables.
//!
//! A Horizons `VECTORS` query in CSV format looks like
//!
//! ```text
//! *******************************************************************************
//!             JDTDB,            Calendar Date (TDB),                      X,  ...      VZ,
//! *******************************************************************************
//! $$SOE
//! 2450836.500000000, A.D. 1998-Jan-23 00:00:00.0000, -1.2345E+04, ...,  4.5E+00,
//! $$EOE
//! ```
//!
//! The reader keeps the `$$SOE`/`$$EOE` block, or the whole input when the markers were
//! already stripped. Columns are located by the `JDTDB, X, Y, Z, VX, VY, VZ` header when
//! present; otherwise the layout `JDTDB, Calendar Date, [LT,] X, Y, Z, VX, VY, VZ` is
//! assumed, the light-time column being detected from the number of fields.

use camino::Utf8Path;
use csv::{ReaderBuilder, Trim};
use nalgebra::Vector3;
use regex::Regex;
use serde::Deserialize;

use crate::{
    constants::SpacecraftId,
    flyby_errors::FlybyError,
    trajectory::{Trajectory, TrajectorySample},
};

const HEADER: &str = "JDTDB,Calendar Date,X,Y,Z,VX,VY,VZ";
const HEADER_WITH_LT: &str = "JDTDB,Calendar Date,LT,X,Y,Z,VX,VY,VZ";

#[derive(Debug, Deserialize, PartialEq)]
struct VectorRecord {
    #[serde(rename = "JDTDB")]
    jd: f64,
    #[serde(rename = "X")]
    x: f64, // km
    #[serde(rename = "Y")]
    y: f64, // km
    #[serde(rename = "Z")]
    z: f64, // km
    #[serde(rename = "VX")]
    vx: f64, // km/s
    #[serde(rename = "VY")]
    vy: f64, // km/s
    #[serde(rename = "VZ")]
    vz: f64, // km/s
}

impl From<VectorRecord> for TrajectorySample {
    fn from(r: VectorRecord) -> Self {
        TrajectorySample::from_km(
            r.jd,
            Vector3::new(r.x, r.y, r.z),
            Vector3::new(r.vx, r.vy, r.vz),
        )
    }
}

fn marker_regex() -> Result<Regex, FlybyError> {
    Regex::new(r"(?s)\$\$SOE[^\n]*\n(.*?)\$\$EOE")
        .map_err(|e| FlybyError::InvalidInput(format!("Horizons block pattern: {e}")))
}

/// Drop blank and decoration lines, and the trailing comma Horizons puts on each line.
fn clean_lines(block: &str) -> Vec<&str> {
    block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('*') && !l.starts_with("$$"))
        .map(|l| l.strip_suffix(',').unwrap_or(l).trim_end())
        .collect()
}

/// Header line announcing the data block, if any.
fn find_header(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .find(|l| l.contains("JDTDB") && !l.starts_with("$$"))
        .map(|l| l.strip_suffix(',').unwrap_or(l))
}

/// Parse a Horizons vector table into a validated trajectory in SI units.
///
/// # Errors
/// * `FlybyError::CsvError` for a malformed line,
/// * `FlybyError::InvalidInput` for an unknown column layout or unordered epochs,
/// * `FlybyError::InsufficientData` for an empty table.
pub fn read_horizons_vectors(
    id: impl Into<SpacecraftId>,
    content: &str,
) -> Result<Trajectory, FlybyError> {
    let id = id.into();
    let block = match marker_regex()?.captures(content).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => content,
    };
    let lines = clean_lines(block);

    let header = match find_header(content) {
        Some(h) => h.to_string(),
        None => match lines.first().map(|l| l.split(',').count()) {
            None | Some(8) => HEADER.to_string(),
            Some(9) => HEADER_WITH_LT.to_string(),
            Some(n) => {
                return Err(FlybyError::InvalidInput(format!(
                    "{id}: {n} columns in a headerless Horizons table, expected 8 or 9"
                )))
            }
        },
    };

    let data = std::iter::once(header.as_str())
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(data.as_bytes());
    let samples = reader
        .deserialize::<VectorRecord>()
        .map(|r| r.map(TrajectorySample::from))
        .collect::<Result<Vec<_>, _>>()?;

    Trajectory::new(id, samples)
}

/// [`read_horizons_vectors`] on the content of a file.
pub fn read_horizons_file(
    id: impl Into<SpacecraftId>,
    path: &Utf8Path,
) -> Result<Trajectory, FlybyError> {
    let content = std::fs::read_to_string(path)?;
    read_horizons_vectors(id, &content)
}
