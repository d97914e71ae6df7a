//! # Integrand evaluation
//!
//! For every sample of a trajectory, the [`IntegrandEvaluator`] turns the Earth-fixed
//! [`FrameState`] and the local field vector into one scalar per model [`Term`]. The
//! resulting [`IntegrandSeries`] are integrated over time by the
//! [`TemporalIntegrator`](crate::integration::TemporalIntegrator).
//!
//! ## Terms
//!
//! Notation: `r`, `v` Earth-fixed position and velocity, `v̂ = v/|v|`, `ω = ω ẑ`, `B` the
//! field (T), `φ` the geodetic latitude, `h` the altitude, `|v_in|` the inertial speed.
//!
//! | Term                               | Integrand                                      |
//! |------------------------------------|------------------------------------------------|
//! | [`Term::Rotational`]               | `(ω × r) · v̂`                                  |
//! | [`Term::LorentzResonance`]         | `tan²(min(|φ|, φ_max)) · |v_in|`               |
//! | [`Term::EquatorialBraking`]        | `−(v × B) · v̂`                                 |
//! | [`Term::SolarAltitude`]            | `−|v_in| / h'`, zero when `h > h_max`          |
//! | [`Term::Universal`]                | Lorentz resonance + equatorial braking         |
//! | [`Term::SolarLatitude`]            | `−s · cos φ / h'`                              |
//! | [`Term::GeodeticJ2`]               | `−(3/2) J2 R² / r⁴ (5 sin²φ − 1) (r̂ · v̂)`     |
//!
//! with `h' = h` when `h > 0` and `h' = h_floor` otherwise. These clipping, flooring and
//! zeroing rules define the terms; they are applied exactly as listed.
//!
//! `v × B` is orthogonal to `v`, so the braking projection vanishes up to rounding; the
//! term is still evaluated as written so that factor tables stay reproducible.
//!
//! [`Term::Chiral`] and [`Term::Scalar`] are aggregate factors supplied with the data;
//! they have no per-sample integrand.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;

use crate::{
    config::IntegrandSettings,
    constants::{Meter, Radian},
    flyby_errors::FlybyError,
    frame_converter::FrameState,
};

/// A named model term, and the key of its physical factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Rotational,
    LorentzResonance,
    EquatorialBraking,
    SolarAltitude,
    Universal,
    SolarLatitude,
    GeodeticJ2,
    Chiral,
    Scalar,
}

impl Term {
    pub const ALL: [Term; 9] = [
        Term::Rotational,
        Term::LorentzResonance,
        Term::EquatorialBraking,
        Term::SolarAltitude,
        Term::Universal,
        Term::SolarLatitude,
        Term::GeodeticJ2,
        Term::Chiral,
        Term::Scalar,
    ];

    /// Column name used in factor tables.
    pub fn name(&self) -> &'static str {
        match self {
            Term::Rotational => "rot",
            Term::LorentzResonance => "lor",
            Term::EquatorialBraking => "bra",
            Term::SolarAltitude => "sol",
            Term::Universal => "universal",
            Term::SolarLatitude => "solar",
            Term::GeodeticJ2 => "geodetic",
            Term::Chiral => "chiral_total",
            Term::Scalar => "scalar_total",
        }
    }

    /// Whether the term can be computed from a trajectory.
    pub fn is_derivable(&self) -> bool {
        !matches!(self, Term::Chiral | Term::Scalar)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Term {
    type Err = FlybyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Term::ALL
            .iter()
            .copied()
            .find(|t| t.name() == key)
            .ok_or_else(|| FlybyError::NotFound {
                kind: "term",
                key: key.to_string(),
            })
    }
}

/// Integrand values of one term, aligned with the trajectory samples.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrandSeries {
    pub term: Term,
    pub values: Vec<f64>,
}

/// Unit vector, or zero for a zero vector.
fn unit(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Component along `v̂` of the velocity of a rigid field rotating at `omega` (rad/s).
pub fn rotational(omega: f64, position: &Vector3<f64>, velocity: &Vector3<f64>) -> f64 {
    Vector3::new(0.0, 0.0, omega)
        .cross(position)
        .dot(&unit(velocity))
}

/// `tan²(min(|latitude|, ceiling)) · inertial_speed`.
pub fn lorentz_resonance(latitude: Radian, inertial_speed: f64, ceiling: Radian) -> f64 {
    let tan = latitude.abs().min(ceiling).tan();
    tan * tan * inertial_speed
}

/// `−(v × B) · v̂`.
pub fn equatorial_braking(velocity: &Vector3<f64>, field: &Vector3<f64>) -> f64 {
    -velocity.cross(field).dot(&unit(velocity))
}

#[inline]
fn floored_altitude(altitude: Meter, floor: Meter) -> Meter {
    if altitude <= 0.0 {
        floor
    } else {
        altitude
    }
}

/// `−inertial_speed / altitude`, zero above `ceiling`; non-positive altitudes are
/// replaced by `floor`.
pub fn solar_altitude(altitude: Meter, inertial_speed: f64, floor: Meter, ceiling: Meter) -> f64 {
    if altitude > ceiling {
        return 0.0;
    }
    -inertial_speed / floored_altitude(altitude, floor)
}

/// `−scale · cos(latitude) / altitude`; non-positive altitudes are replaced by `floor`.
pub fn solar_latitude(latitude: Radian, altitude: Meter, floor: Meter, scale: f64) -> f64 {
    -scale * latitude.cos() / floored_altitude(altitude, floor)
}

/// Radial J2 acceleration projected on `v̂`.
pub fn geodetic_j2(
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
    latitude: Radian,
    j2: f64,
    reference_radius: Meter,
) -> f64 {
    let r = position.norm();
    if r == 0.0 {
        return 0.0;
    }
    let sin_lat = latitude.sin();
    let magnitude =
        -1.5 * j2 * reference_radius.powi(2) / r.powi(4) * (5.0 * sin_lat * sin_lat - 1.0);
    magnitude * (position / r).dot(&unit(velocity))
}

#[derive(Debug, Clone, Default)]
pub struct IntegrandEvaluator {
    settings: IntegrandSettings,
}

impl IntegrandEvaluator {
    pub fn new(settings: IntegrandSettings) -> Self {
        IntegrandEvaluator { settings }
    }

    pub fn settings(&self) -> &IntegrandSettings {
        &self.settings
    }

    /// Integrand of `term` for one sample.
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` for terms that have no per-sample integrand.
    pub fn value(
        &self,
        term: Term,
        state: &FrameState,
        field: &Vector3<f64>,
    ) -> Result<f64, FlybyError> {
        let s = &self.settings;
        let value = match term {
            Term::Rotational => rotational(s.angular_velocity, &state.position, &state.velocity),
            Term::LorentzResonance => lorentz_resonance(
                state.latitude,
                state.inertial_speed,
                s.lorentz_latitude_ceiling,
            ),
            Term::EquatorialBraking => equatorial_braking(&state.velocity, field),
            Term::SolarAltitude => solar_altitude(
                state.altitude,
                state.inertial_speed,
                s.solar_altitude_floor,
                s.solar_altitude_ceiling,
            ),
            Term::Universal => {
                lorentz_resonance(
                    state.latitude,
                    state.inertial_speed,
                    s.lorentz_latitude_ceiling,
                ) + equatorial_braking(&state.velocity, field)
            }
            Term::SolarLatitude => solar_latitude(
                state.latitude,
                state.altitude,
                s.solar_altitude_floor,
                s.solar_latitude_scale,
            ),
            Term::GeodeticJ2 => geodetic_j2(
                &state.position,
                &state.velocity,
                state.latitude,
                s.j2,
                s.j2_reference_radius,
            ),
            Term::Chiral | Term::Scalar => {
                return Err(FlybyError::InvalidInput(format!(
                    "term '{term}' is an aggregate factor and has no integrand"
                )))
            }
        };
        Ok(value)
    }

    /// One series per requested term, aligned with `states`.
    ///
    /// # Errors
    /// * `FlybyError::InvalidInput` if `states` and `fields` differ in length, or a term
    ///   has no integrand.
    pub fn evaluate(
        &self,
        terms: &[Term],
        states: &[FrameState],
        fields: &[Vector3<f64>],
    ) -> Result<Vec<IntegrandSeries>, FlybyError> {
        if states.len() != fields.len() {
            return Err(FlybyError::InvalidInput(format!(
                "{} frame states but {} field samples",
                states.len(),
                fields.len()
            )));
        }

        terms
            .iter()
            .map(|&term| {
                let values = states
                    .iter()
                    .zip(fields)
                    .map(|(state, field)| self.value(term, state, field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IntegrandSeries { term, values })
            })
            .collect()
    }
}
