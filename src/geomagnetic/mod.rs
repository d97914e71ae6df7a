//! # Geomagnetic field evaluation
//!
//! This module provides the [`FieldEvaluator`], which returns the geomagnetic field vector
//! in the **Earth-fixed Cartesian frame** for every [`FrameState`] of a trajectory.
//!
//! ## Model
//!
//! The field derives from a scalar potential expanded in spherical harmonics with
//! Schmidt semi-normalized Gauss coefficients `g_n^m`, `h_n^m` (nT) at the reference
//! radius `a = 6371.2 km` ([`GEOMAGNETIC_REFERENCE_RADIUS`]):
//!
//! ```text
//! V(r, θ, φ) = a Σ_n (a/r)^(n+1) Σ_m (g_n^m cos mφ + h_n^m sin mφ) P_n^m(cos θ)
//! ```
//!
//! [`SphericalHarmonicModel`] holds the coefficients at one or more epochs plus their
//! secular variation and is usually either
//! * the built-in [`SphericalHarmonicModel::igrf13_degree4`] (IGRF-13, degree 4), or
//! * loaded from a standard IGRF coefficient table with
//!   [`SphericalHarmonicModel::from_igrf_str`] / [`SphericalHarmonicModel::from_igrf_file`].
//!
//! ## Frames and units
//!
//! The synthesis is done in geocentric spherical coordinates, giving the local
//! North-East-Down components, which are then rotated to Earth-fixed Cartesian axes with
//! the geocentric latitude and longitude of the sample. The output of the evaluator is in
//! **tesla** (coefficients in nT are scaled by `1e-9`), so that `v × B` with `v` in m/s is
//! a force per unit charge in V/m.
//!
//! On the polar axis the azimuthal derivative is singular; `sin θ` is clamped to
//! `1e-10`, which leaves the field continuous through the pole.

mod igrf13;
pub mod igrf_reader;

use camino::Utf8Path;
use log::{debug, warn};
use nalgebra::Vector3;

use crate::{
    constants::{Radian, GEOMAGNETIC_REFERENCE_RADIUS, NT_TO_T},
    flyby_errors::FlybyError,
    frame_converter::FrameState,
    ref_system::{ned_to_fixed, GeodeticPosition, SphericalPosition},
};

const POLE_GUARD: f64 = 1e-10;

/// Schmidt semi-normalized Gauss coefficients up to a maximum degree, in nT
/// (or nT/year for a secular variation).
#[derive(Debug, Clone, PartialEq)]
pub struct GaussCoefficients {
    degree: usize,
    g: Vec<f64>,
    h: Vec<f64>,
}

#[inline]
fn index(n: usize, m: usize) -> usize {
    n * (n + 1) / 2 + m
}

impl GaussCoefficients {
    /// All-zero coefficients up to `degree`.
    pub fn zeros(degree: usize) -> Self {
        let len = index(degree, degree) + 1;
        GaussCoefficients {
            degree,
            g: vec![0.0; len],
            h: vec![0.0; len],
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn g(&self, n: usize, m: usize) -> f64 {
        self.g[index(n, m)]
    }

    pub fn h(&self, n: usize, m: usize) -> f64 {
        self.h[index(n, m)]
    }

    /// Set `g_n^m`; orders beyond the degree are rejected.
    pub fn set_g(&mut self, n: usize, m: usize, value: f64) -> Result<(), FlybyError> {
        let idx = self.checked_index(n, m)?;
        self.g[idx] = value;
        Ok(())
    }

    /// Set `h_n^m`; orders beyond the degree are rejected.
    pub fn set_h(&mut self, n: usize, m: usize, value: f64) -> Result<(), FlybyError> {
        let idx = self.checked_index(n, m)?;
        self.h[idx] = value;
        Ok(())
    }

    fn checked_index(&self, n: usize, m: usize) -> Result<usize, FlybyError> {
        if n == 0 || n > self.degree || m > n {
            return Err(FlybyError::InvalidInput(format!(
                "invalid Gauss coefficient index (n={n}, m={m}) for degree {}",
                self.degree
            )));
        }
        Ok(index(n, m))
    }

    /// `self + rate · dt`, component-wise.
    fn advanced(&self, rate: &GaussCoefficients, dt: f64) -> GaussCoefficients {
        let lerp = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, r)| x + r * dt).collect();
        GaussCoefficients {
            degree: self.degree,
            g: lerp(&self.g, &rate.g),
            h: lerp(&self.h, &rate.h),
        }
    }

    /// Linear interpolation `self + (other − self) · w`.
    fn interpolated(&self, other: &GaussCoefficients, w: f64) -> GaussCoefficients {
        let mix = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x + (y - x) * w).collect();
        GaussCoefficients {
            degree: self.degree,
            g: mix(&self.g, &other.g),
            h: mix(&self.h, &other.h),
        }
    }

    /// Geocentric North-East-Down field (nT) at a spherical position.
    pub fn synthesize(&self, position: &SphericalPosition) -> Vector3<f64> {
        let nmax = self.degree;
        let size = nmax + 1;
        let (sin_raw, cos_t) = position.colatitude.sin_cos();
        let sin_t = sin_raw.max(POLE_GUARD);
        let ratio = GEOMAGNETIC_REFERENCE_RADIUS / position.radius;

        // Gauss-normalized associated Legendre functions and their θ-derivatives
        let mut p = vec![vec![0.0; size]; size];
        let mut dp = vec![vec![0.0; size]; size];
        // Gauss → Schmidt semi-normalization factors
        let mut schmidt = vec![vec![0.0; size]; size];
        p[0][0] = 1.0;
        schmidt[0][0] = 1.0;

        for n in 1..=nmax {
            for m in 0..=n {
                if m == n {
                    p[n][n] = sin_t * p[n - 1][n - 1];
                    dp[n][n] = sin_t * dp[n - 1][n - 1] + cos_t * p[n - 1][n - 1];
                } else {
                    let (k, p2, dp2) = if n > 1 {
                        let (nf, mf) = (n as f64, m as f64);
                        (
                            ((nf - 1.0).powi(2) - mf * mf) / ((2.0 * nf - 1.0) * (2.0 * nf - 3.0)),
                            p[n - 2][m],
                            dp[n - 2][m],
                        )
                    } else {
                        (0.0, 0.0, 0.0)
                    };
                    p[n][m] = cos_t * p[n - 1][m] - k * p2;
                    dp[n][m] = cos_t * dp[n - 1][m] - sin_t * p[n - 1][m] - k * dp2;
                }

                schmidt[n][m] = if m == 0 {
                    schmidt[n - 1][0] * (2 * n - 1) as f64 / n as f64
                } else {
                    let delta = if m == 1 { 2.0 } else { 1.0 };
                    schmidt[n][m - 1] * ((n - m + 1) as f64 * delta / (n + m) as f64).sqrt()
                };
            }
        }

        let (mut br, mut bt, mut bp) = (0.0, 0.0, 0.0);
        for n in 1..=nmax {
            let rn = ratio.powi(n as i32 + 2);
            for m in 0..=n {
                let g = self.g(n, m) * schmidt[n][m];
                let h = self.h(n, m) * schmidt[n][m];
                let (sin_mp, cos_mp) = (m as f64 * position.longitude).sin_cos();
                let gh = g * cos_mp + h * sin_mp;

                br += rn * (n + 1) as f64 * gh * p[n][m];
                bt -= rn * gh * dp[n][m];
                bp += rn * m as f64 * (g * sin_mp - h * cos_mp) * p[n][m];
            }
        }
        bp /= sin_t;

        Vector3::new(-bt, bp, -br)
    }
}

/// A geomagnetic main-field model.
pub trait GeomagneticModel {
    /// Geocentric North-East-Down field in nT at `position` and fractional `year`.
    fn field_ned(&self, position: &SphericalPosition, year: f64) -> Result<Vector3<f64>, FlybyError>;

    /// Years over which the model is defined without extrapolation.
    fn nominal_range(&self) -> (f64, f64);
}

/// Gauss coefficients tabulated at increasing epochs with a secular variation after
/// the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalHarmonicModel {
    name: String,
    epochs: Vec<f64>,
    snapshots: Vec<GaussCoefficients>,
    secular_variation: GaussCoefficients,
    /// Years of linear extrapolation allowed after the last epoch
    forward_span: f64,
    /// Whether the secular variation may be applied before the first epoch
    backward: bool,
}

impl SphericalHarmonicModel {
    /// Assemble a model from coefficient snapshots.
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` if there is no snapshot, the epochs are not strictly
    /// increasing, or degrees differ between snapshots.
    pub fn new(
        name: impl Into<String>,
        epochs: Vec<f64>,
        snapshots: Vec<GaussCoefficients>,
        secular_variation: GaussCoefficients,
    ) -> Result<Self, FlybyError> {
        if epochs.is_empty() || epochs.len() != snapshots.len() {
            return Err(FlybyError::InvalidInput(format!(
                "geomagnetic model needs one snapshot per epoch ({} epochs, {} snapshots)",
                epochs.len(),
                snapshots.len()
            )));
        }
        if epochs.windows(2).any(|w| w[1] <= w[0]) || epochs.iter().any(|e| !e.is_finite()) {
            return Err(FlybyError::InvalidInput(
                "geomagnetic model epochs must be finite and strictly increasing".into(),
            ));
        }
        let degree = secular_variation.degree();
        if snapshots.iter().any(|s| s.degree() != degree) {
            return Err(FlybyError::InvalidInput(
                "geomagnetic snapshots have different degrees".into(),
            ));
        }

        Ok(SphericalHarmonicModel {
            name: name.into(),
            epochs,
            snapshots,
            secular_variation,
            forward_span: 5.0,
            backward: false,
        })
    }

    /// Allow the secular variation to be applied before the first epoch and up to
    /// `forward_span` years after the last one.
    pub fn with_extrapolation(mut self, backward: bool, forward_span: f64) -> Self {
        self.backward = backward;
        self.forward_span = forward_span;
        self
    }

    /// Load a model from a standard IGRF coefficient table on disk.
    pub fn from_igrf_file(path: &Utf8Path) -> Result<Self, FlybyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_igrf_str(path.as_str(), &content)
    }

    /// Parse a standard IGRF coefficient table (`g/h n m <epochs…> <SV>`).
    pub fn from_igrf_str(name: &str, content: &str) -> Result<Self, FlybyError> {
        let table = igrf_reader::parse_igrf_table(content)?;
        Self::new(name, table.epochs, table.snapshots, table.secular_variation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn degree(&self) -> usize {
        self.secular_variation.degree()
    }

    /// Coefficients at a fractional year.
    ///
    /// Interpolates linearly between epochs and applies the secular variation outside
    /// them when the extrapolation policy allows it.
    pub fn coefficients_at(&self, year: f64) -> Result<GaussCoefficients, FlybyError> {
        if !year.is_finite() {
            return Err(FlybyError::InvalidInput(format!(
                "non-finite epoch {year} for geomagnetic model"
            )));
        }
        let first = self.epochs[0];
        let last = self.epochs[self.epochs.len() - 1];

        if year < first {
            if !self.backward {
                return Err(FlybyError::InvalidInput(format!(
                    "epoch {year:.3} precedes the first epoch {first:.1} of {}",
                    self.name
                )));
            }
            return Ok(self.snapshots[0].advanced(&self.secular_variation, year - first));
        }

        if year >= last {
            if year - last > self.forward_span {
                return Err(FlybyError::InvalidInput(format!(
                    "epoch {year:.3} is more than {:.1} years after the last epoch {last:.1} of {}",
                    self.forward_span, self.name
                )));
            }
            return Ok(self.snapshots[self.snapshots.len() - 1]
                .advanced(&self.secular_variation, year - last));
        }

        // first <= year < last: a bracketing interval always exists
        let i = self.epochs.partition_point(|&e| e <= year) - 1;
        let w = (year - self.epochs[i]) / (self.epochs[i + 1] - self.epochs[i]);
        Ok(self.snapshots[i].interpolated(&self.snapshots[i + 1], w))
    }
}

impl GeomagneticModel for SphericalHarmonicModel {
    fn field_ned(&self, position: &SphericalPosition, year: f64) -> Result<Vector3<f64>, FlybyError> {
        Ok(self.coefficients_at(year)?.synthesize(position))
    }

    fn nominal_range(&self) -> (f64, f64) {
        let last = self.epochs[self.epochs.len() - 1];
        (self.epochs[0], last + self.forward_span)
    }
}

/// Evaluates a [`GeomagneticModel`] along trajectories, in Earth-fixed Cartesian tesla.
#[derive(Debug, Clone)]
pub struct FieldEvaluator<M> {
    model: M,
}

impl Default for FieldEvaluator<SphericalHarmonicModel> {
    fn default() -> Self {
        FieldEvaluator::new(SphericalHarmonicModel::igrf13_degree4())
    }
}

impl<M: GeomagneticModel> FieldEvaluator<M> {
    pub fn new(model: M) -> Self {
        FieldEvaluator { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Field (T) at an Earth-fixed Cartesian position (m).
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` at the geocenter or outside the model's time span.
    pub fn field_at_position(
        &self,
        position: &Vector3<f64>,
        year: f64,
    ) -> Result<Vector3<f64>, FlybyError> {
        let spherical = SphericalPosition::from_fixed(position);
        if !(spherical.radius > 0.0) {
            return Err(FlybyError::InvalidInput(
                "geomagnetic field requested at the geocenter".into(),
            ));
        }
        let ned = self.model.field_ned(&spherical, year)?;
        Ok(ned_to_fixed(spherical.latitude(), spherical.longitude) * ned * NT_TO_T)
    }

    /// Field (T, Earth-fixed Cartesian) at a geodetic latitude, longitude and height.
    pub fn field_at(
        &self,
        latitude: Radian,
        longitude: Radian,
        height: f64,
        year: f64,
    ) -> Result<Vector3<f64>, FlybyError> {
        let position = GeodeticPosition {
            latitude,
            longitude,
            height,
        }
        .to_fixed();
        self.field_at_position(&position, year)
    }

    /// Field in the geodetic North-East-Down frame, in nT.
    pub fn field_ned_geodetic(
        &self,
        latitude: Radian,
        longitude: Radian,
        height: f64,
        year: f64,
    ) -> Result<Vector3<f64>, FlybyError> {
        let b = self.field_at(latitude, longitude, height, year)?;
        Ok(ned_to_fixed(latitude, longitude).transpose() * b / NT_TO_T)
    }

    /// One field sample per frame state, same ordering.
    ///
    /// Fails on the first sample that cannot be evaluated; no partial output.
    pub fn evaluate(&self, states: &[FrameState]) -> Result<Vec<Vector3<f64>>, FlybyError> {
        let (start, end) = self.model.nominal_range();
        if states
            .iter()
            .any(|s| s.decimal_year < start || s.decimal_year > end)
        {
            warn!("geomagnetic model extrapolated outside [{start:.1}, {end:.1}]");
        }
        debug!("geomagnetic field at {} samples", states.len());

        states
            .iter()
            .map(|s| self.field_at_position(&s.position, s.decimal_year))
            .collect()
    }
}
