//! # Analysis configuration
//!
//! This module defines [`AnalysisConfig`] and its validating builder. The configuration
//! gathers every tunable value of a flyby analysis in three groups:
//!
//! - [`FrameSettings`] – Earth rotation, altitude reference and UT1 handling used by the
//!   [`FrameConverter`](crate::frame_converter::FrameConverter),
//! - [`IntegrandSettings`] – the clipping, flooring and zeroing policies of the integrand
//!   terms, and the constants of the alternative terms,
//! - [`FitSettings`] – iteration budget and tolerances of the Levenberg–Marquardt solver.
//!
//! The edge-case policies of the integrands (latitude ceiling, altitude floor and ceiling)
//! are part of the model definition: changing them changes the factors, so they are kept
//! explicit here instead of buried in the evaluator.
//!
//! ## Example
//!
//! ```rust
//! use flyby::config::{AltitudeReference, AnalysisConfig};
//!
//! let config = AnalysisConfig::builder()
//!     .lorentz_latitude_ceiling_deg(80.0)
//!     .solar_altitude_ceiling_m(40_000e3)
//!     .altitude_reference(AltitudeReference::Ellipsoid)
//!     .max_iterations(500)
//!     .build()
//!     .unwrap();
//!
//! println!("{config:#}");
//! ```

use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use crate::{
    constants::{
        Meter, Radian, Second, EARTH_J2, EARTH_ROTATION_RATE, MEAN_EARTH_RADIUS, RADEG,
    },
    flyby_errors::FlybyError,
    time::Ut1Correction,
};

/// Surface from which the altitude of a [`FrameState`](crate::frame_converter::FrameState)
/// is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AltitudeReference {
    /// Distance to the geocenter minus the mean Earth radius.
    #[default]
    MeanSphere,
    /// Height above the WGS84 ellipsoid.
    Ellipsoid,
}

/// Settings of the inertial → Earth-fixed conversion.
#[derive(Debug, Clone)]
pub struct FrameSettings {
    /// Earth sidereal rotation rate (rad/s)
    pub earth_rotation_rate: f64,
    /// Radius of the mean sphere (m), used with [`AltitudeReference::MeanSphere`]
    pub mean_earth_radius: Meter,
    pub altitude_reference: AltitudeReference,
    pub ut1: Ut1Correction,
}

impl Default for FrameSettings {
    fn default() -> Self {
        FrameSettings {
            earth_rotation_rate: EARTH_ROTATION_RATE,
            mean_earth_radius: MEAN_EARTH_RADIUS,
            altitude_reference: AltitudeReference::MeanSphere,
            ut1: Ut1Correction::default(),
        }
    }
}

/// Edge-case policies and constants of the integrand terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrandSettings {
    /// Angular velocity of the rigid drag field (rad/s)
    pub angular_velocity: f64,
    /// `tan²` is evaluated at `min(|latitude|, ceiling)` (rad)
    pub lorentz_latitude_ceiling: Radian,
    /// Value replacing altitudes at or below zero (m)
    pub solar_altitude_floor: Meter,
    /// Solar contributions above this altitude are zero (m)
    pub solar_altitude_ceiling: Meter,
    /// Multiplier of the latitude-weighted solar term
    pub solar_latitude_scale: f64,
    /// Second zonal harmonic of the geodetic term
    pub j2: f64,
    /// Reference radius of the geodetic term (m)
    pub j2_reference_radius: Meter,
}

impl Default for IntegrandSettings {
    fn default() -> Self {
        IntegrandSettings {
            angular_velocity: EARTH_ROTATION_RATE,
            lorentz_latitude_ceiling: 85.0 * RADEG,
            solar_altitude_floor: 1.0,
            solar_altitude_ceiling: 50_000e3,
            solar_latitude_scale: 1e9,
            j2: EARTH_J2,
            j2_reference_radius: MEAN_EARTH_RADIUS,
        }
    }
}

/// Levenberg–Marquardt solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub max_iterations: usize,
    /// Relative parameter-step tolerance
    pub xtol: f64,
    /// Relative chi-squared reduction tolerance (actual and predicted)
    pub ftol: f64,
    /// Orthogonality tolerance between residuals and Jacobian columns
    pub gtol: f64,
    pub initial_damping: f64,
    /// Damping above which the fit gives up with `FitFailure::DampingExhausted`
    pub max_damping: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        FitSettings {
            max_iterations: 200,
            xtol: 1e-10,
            ftol: 1e-12,
            gtol: 1e-10,
            initial_damping: 1e-3,
            max_damping: 1e16,
        }
    }
}

/// Full configuration of a flyby analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub frame: FrameSettings,
    pub integrands: IntegrandSettings,
    pub fit: FitSettings,
}

impl AnalysisConfig {
    /// Create a new builder initialized with default values.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new()
    }
}

/// Builder for [`AnalysisConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    // --- Frame ---

    /// Sets the Earth rotation rate of both the frame conversion and the rotational term.
    pub fn earth_rotation_rate(mut self, v: f64) -> Self {
        self.config.frame.earth_rotation_rate = v;
        self.config.integrands.angular_velocity = v;
        self
    }
    pub fn mean_earth_radius_m(mut self, v: Meter) -> Self {
        self.config.frame.mean_earth_radius = v;
        self
    }
    pub fn altitude_reference(mut self, v: AltitudeReference) -> Self {
        self.config.frame.altitude_reference = v;
        self
    }
    pub fn dut1_seconds(mut self, v: Second) -> Self {
        self.config.frame.ut1 = Ut1Correction::Constant(v);
        self
    }
    pub fn ut1_correction(mut self, v: Ut1Correction) -> Self {
        self.config.frame.ut1 = v;
        self
    }

    // --- Integrands ---
    pub fn lorentz_latitude_ceiling_deg(mut self, v: f64) -> Self {
        self.config.integrands.lorentz_latitude_ceiling = v * RADEG;
        self
    }
    pub fn solar_altitude_floor_m(mut self, v: Meter) -> Self {
        self.config.integrands.solar_altitude_floor = v;
        self
    }
    pub fn solar_altitude_ceiling_m(mut self, v: Meter) -> Self {
        self.config.integrands.solar_altitude_ceiling = v;
        self
    }
    pub fn solar_latitude_scale(mut self, v: f64) -> Self {
        self.config.integrands.solar_latitude_scale = v;
        self
    }
    pub fn j2(mut self, v: f64) -> Self {
        self.config.integrands.j2 = v;
        self
    }
    pub fn j2_reference_radius_m(mut self, v: Meter) -> Self {
        self.config.integrands.j2_reference_radius = v;
        self
    }

    // --- Fit ---
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.config.fit.max_iterations = v;
        self
    }
    pub fn xtol(mut self, v: f64) -> Self {
        self.config.fit.xtol = v;
        self
    }
    pub fn ftol(mut self, v: f64) -> Self {
        self.config.fit.ftol = v;
        self
    }
    pub fn gtol(mut self, v: f64) -> Self {
        self.config.fit.gtol = v;
        self
    }
    pub fn initial_damping(mut self, v: f64) -> Self {
        self.config.fit.initial_damping = v;
        self
    }
    pub fn max_damping(mut self, v: f64) -> Self {
        self.config.fit.max_damping = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    /// Finalize the builder and produce an [`AnalysisConfig`].
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` when:
    /// * a rate, radius, floor, ceiling or damping is not strictly positive,
    /// * the Lorentz latitude ceiling is not below 90°,
    /// * the solar floor is not below the solar ceiling,
    /// * a tolerance is negative, or all three tolerances are zero,
    /// * the iteration budget is zero, or the initial damping exceeds the maximum.
    pub fn build(self) -> Result<AnalysisConfig, FlybyError> {
        let frame = &self.config.frame;
        let integ = &self.config.integrands;
        let fit = &self.config.fit;
        let invalid = |msg: &str| Err(FlybyError::InvalidInput(msg.into()));

        if !Self::ge0(frame.earth_rotation_rate) || !Self::ge0(integ.angular_velocity) {
            return invalid("earth_rotation_rate must be non-negative");
        }
        if !Self::gt0(frame.mean_earth_radius) || !Self::gt0(integ.j2_reference_radius) {
            return invalid("reference radii must be positive");
        }
        if let Ut1Correction::Constant(dut1) = frame.ut1 {
            if !dut1.is_finite() {
                return invalid("dut1 must be finite");
            }
        }

        if !Self::gt0(integ.lorentz_latitude_ceiling)
            || !Self::lt(integ.lorentz_latitude_ceiling, std::f64::consts::FRAC_PI_2)
        {
            return invalid("lorentz latitude ceiling must be in (0°, 90°)");
        }
        if !Self::gt0(integ.solar_altitude_floor) {
            return invalid("solar altitude floor must be positive");
        }
        if !Self::lt(integ.solar_altitude_floor, integ.solar_altitude_ceiling) {
            return invalid("solar altitude floor must be below the ceiling");
        }
        if !integ.solar_latitude_scale.is_finite() || !integ.j2.is_finite() {
            return invalid("solar latitude scale and j2 must be finite");
        }

        if fit.max_iterations == 0 {
            return invalid("max_iterations must be at least 1");
        }
        if !Self::ge0(fit.xtol) || !Self::ge0(fit.ftol) || !Self::ge0(fit.gtol) {
            return invalid("tolerances must be non-negative");
        }
        if fit.xtol == 0.0 && fit.ftol == 0.0 && fit.gtol == 0.0 {
            return invalid("at least one tolerance must be positive");
        }
        if !Self::gt0(fit.initial_damping) || !Self::lt(fit.initial_damping, fit.max_damping) {
            return invalid("damping must satisfy 0 < initial_damping < max_damping");
        }

        Ok(self.config)
    }
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ut1 = match &self.frame.ut1 {
            Ut1Correction::Constant(dut1) => format!("UT1-UTC = {dut1:.3} s"),
            Ut1Correction::Provider(_) => "UT1 from provider".to_string(),
        };

        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "Flyby Analysis Configuration")?;
            writeln!(f, "----------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Frame conversion]")?;
            line!(
                "earth_rotation_rate   = {:.7e} rad/s",
                self.frame.earth_rotation_rate,
                "Sidereal rotation rate"
            )?;
            line!(
                "mean_earth_radius     = {:.1} m",
                self.frame.mean_earth_radius,
                "Mean sphere radius"
            )?;
            line!(
                "altitude_reference    = {:?}",
                self.frame.altitude_reference,
                "Altitude surface"
            )?;
            line!("ut1                   = {}", ut1, "UT1 handling")?;

            writeln!(f, "\n[Integrand policies]")?;
            line!(
                "lorentz_lat_ceiling   = {:.2} deg",
                self.integrands.lorentz_latitude_ceiling / RADEG,
                "tan² clipped above this latitude"
            )?;
            line!(
                "solar_altitude_floor  = {:.3} m",
                self.integrands.solar_altitude_floor,
                "Altitude floor before 1/alt"
            )?;
            line!(
                "solar_altitude_ceiling= {:.1} km",
                self.integrands.solar_altitude_ceiling / 1e3,
                "Solar term zero above"
            )?;
            line!(
                "solar_latitude_scale  = {:.3e}",
                self.integrands.solar_latitude_scale,
                "Latitude-weighted solar term scale"
            )?;
            line!(
                "j2                    = {:.5e}",
                self.integrands.j2,
                "Zonal harmonic of geodetic term"
            )?;

            writeln!(f, "\n[Levenberg–Marquardt]")?;
            line!(
                "max_iterations        = {}",
                self.fit.max_iterations,
                "Iteration budget"
            )?;
            line!("xtol                  = {:.1e}", self.fit.xtol, "Parameter step")?;
            line!("ftol                  = {:.1e}", self.fit.ftol, "Chi² reduction")?;
            line!("gtol                  = {:.1e}", self.fit.gtol, "Gradient orthogonality")?;
            line!(
                "initial_damping       = {:.1e}",
                self.fit.initial_damping,
                "Starting λ"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "AnalysisConfig(alt_ref={:?}, {}, lat_ceil={:.1}°, solar=[{:.1} m, {:.0} km], max_it={}, xtol={:.1e})",
                self.frame.altitude_reference,
                ut1,
                self.integrands.lorentz_latitude_ceiling / RADEG,
                self.integrands.solar_altitude_floor,
                self.integrands.solar_altitude_ceiling / 1e3,
                self.fit.max_iterations,
                self.fit.xtol,
            )
        }
    }
}
