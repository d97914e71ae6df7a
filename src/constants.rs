//! # Constants and type definitions for Flyby
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `flyby` library.
//!
//! ## Overview
//!
//! - Time constants (J2000 epoch, Julian/Modified Julian offsets)
//! - Geophysical constants (WGS84 ellipsoid, mean Earth radius, rotation rate, J2)
//! - Unit conversions (degrees ↔ radians, km ↔ m, mm/s ↔ m/s)
//! - The [`SpacecraftId`] identifier and the container aliases keyed by it
//!
//! All quantities handled by the library are SI (meters, seconds, m/s, tesla) unless a
//! name says otherwise; conversion to presentation units (mm/s) happens at the boundary.

use std::collections::HashMap;

use ahash::RandomState;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days in a Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00 TT)
pub const T2000: f64 = 51544.5;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Earth equatorial radius in meters (WGS84)
pub const EARTH_MAJOR_AXIS: f64 = 6_378_137.0;

/// Earth polar radius in meters (WGS84)
pub const EARTH_MINOR_AXIS: f64 = 6_356_752.314_245;

/// Mean Earth radius in meters, used as the default altitude reference
pub const MEAN_EARTH_RADIUS: f64 = 6.371e6;

/// Reference radius of the geomagnetic spherical harmonic expansion, in meters
pub const GEOMAGNETIC_REFERENCE_RADIUS: f64 = 6_371_200.0;

/// Sidereal rotation rate of the Earth in rad/s
pub const EARTH_ROTATION_RATE: f64 = 7.292_115_0e-5;

/// Second zonal harmonic of the Earth's gravity field
pub const EARTH_J2: f64 = 1.08263e-3;

/// Kilometers → meters
pub const KM_TO_M: f64 = 1.0e3;

/// Millimeters per second → meters per second
pub const MM_S_TO_M_S: f64 = 1.0e-3;

/// Nanotesla → tesla
pub const NT_TO_T: f64 = 1.0e-9;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in meters
pub type Meter = f64;
/// Duration in seconds
pub type Second = f64;
/// Velocity in meters per second
pub type MeterPerSecond = f64;
/// Modified Julian Date (days)
pub type MJD = f64;
/// Julian Date (days)
pub type JD = f64;

// -------------------------------------------------------------------------------------------------
// Identifiers
// -------------------------------------------------------------------------------------------------

/// Identifier of a flyby (e.g. `"GALILEO_1990"`, `"NEAR"`).
///
/// Identifiers are compared verbatim: no case folding or trimming is applied
/// after construction, so `"near"` and `"NEAR"` are two different spacecraft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpacecraftId(String);

impl SpacecraftId {
    pub fn new(id: impl Into<String>) -> Self {
        SpacecraftId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpacecraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpacecraftId {
    fn from(s: &str) -> Self {
        SpacecraftId(s.trim().to_string())
    }
}

impl From<String> for SpacecraftId {
    fn from(s: String) -> Self {
        SpacecraftId(s.trim().to_string())
    }
}

/// Hash map keyed by spacecraft, using the `ahash` hasher.
pub type SpacecraftMap<V> = HashMap<SpacecraftId, V, RandomState>;

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_spacecraft_id_from_str_trims() {
        let id = SpacecraftId::from("  NEAR ");
        assert_eq!(id.as_str(), "NEAR");
        assert_eq!(format!("{id}"), "NEAR");
        assert_ne!(SpacecraftId::from("near"), id);
    }

    #[test]
    fn test_wgs84_flattening() {
        let f = (EARTH_MAJOR_AXIS - EARTH_MINOR_AXIS) / EARTH_MAJOR_AXIS;
        assert!((1.0 / f - 298.257_223_563).abs() < 1e-6);
    }
}
