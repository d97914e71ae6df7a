//! # Inertial → Earth-fixed conversion
//!
//! [`FrameConverter`] turns the inertial states of a [`Trajectory`] into Earth-fixed
//! [`FrameState`]s, one per sample and in the same order.
//!
//! ## Method
//!
//! For each epoch, independently:
//!
//! 1. the TDB Julian date is converted to TT and UT1 with `hifitime`,
//! 2. the celestial-to-terrestrial matrix `M = R3(GAST) · N · P` is built
//!    (see [`celestial_to_terrestrial`]),
//! 3. `r_fixed = M · r` and `v_fixed = M · v − ω × r_fixed`, so the velocity is carried
//!    through the rotation *and* loses the transport term of the rotating frame,
//! 4. latitude and longitude are geodetic (WGS84), altitude follows the configured
//!    [`AltitudeReference`].
//!
//! Because the matrix is rebuilt per sample, the hours-to-days spans of flyby
//! ephemerides are handled without any fixed-rotation approximation.

use log::debug;
use nalgebra::{Matrix3, Vector3};

use crate::{
    config::{AltitudeReference, FrameSettings},
    constants::{Meter, Radian},
    earth_orientation::celestial_to_terrestrial,
    flyby_errors::FlybyError,
    ref_system::GeodeticPosition,
    time::{decimal_year, epoch_from_jd_tdb, mjd_ut1},
    trajectory::{validate_samples, Trajectory, TrajectorySample},
};

/// Earth-fixed state of one trajectory sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Earth-fixed position (m)
    pub position: Vector3<f64>,
    /// Velocity relative to the rotating Earth, Earth-fixed axes (m/s)
    pub velocity: Vector3<f64>,
    /// Geodetic latitude (rad), within `[-π/2, π/2]`
    pub latitude: Radian,
    /// East longitude (rad)
    pub longitude: Radian,
    /// Altitude above the configured reference surface (m); negative inside it
    pub altitude: Meter,
    /// Norm of the inertial velocity of the same sample (m/s)
    pub inertial_speed: f64,
    /// Fractional UTC year of the sample
    pub decimal_year: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FrameConverter {
    settings: FrameSettings,
}

impl FrameConverter {
    pub fn new(settings: FrameSettings) -> Self {
        FrameConverter { settings }
    }

    pub fn settings(&self) -> &FrameSettings {
        &self.settings
    }

    /// Celestial-to-terrestrial matrix at a TDB Julian date.
    pub fn rotation_at(&self, jd_tdb: f64) -> Matrix3<f64> {
        let epoch = epoch_from_jd_tdb(jd_tdb);
        celestial_to_terrestrial(mjd_ut1(&epoch, &self.settings.ut1), epoch.to_mjd_tt_days())
    }

    fn convert_sample(&self, sample: &TrajectorySample) -> FrameState {
        let epoch = epoch_from_jd_tdb(sample.jd_tdb);
        let c2t = celestial_to_terrestrial(
            mjd_ut1(&epoch, &self.settings.ut1),
            epoch.to_mjd_tt_days(),
        );
        let omega = Vector3::new(0.0, 0.0, self.settings.earth_rotation_rate);

        let position = c2t * sample.position;
        let velocity = c2t * sample.velocity - omega.cross(&position);

        let geodetic = GeodeticPosition::from_fixed(&position);
        let altitude = match self.settings.altitude_reference {
            AltitudeReference::MeanSphere => position.norm() - self.settings.mean_earth_radius,
            AltitudeReference::Ellipsoid => geodetic.height,
        };

        FrameState {
            position,
            velocity,
            latitude: geodetic.latitude,
            longitude: geodetic.longitude,
            altitude,
            inertial_speed: sample.velocity.norm(),
            decimal_year: decimal_year(&epoch),
        }
    }

    /// Convert a raw sample sequence.
    ///
    /// # Errors
    /// `FlybyError::InvalidInput` if a value is non-finite or the epochs are not strictly
    /// increasing; nothing is converted in that case.
    pub fn convert_samples(
        &self,
        samples: &[TrajectorySample],
    ) -> Result<Vec<FrameState>, FlybyError> {
        validate_samples(samples)?;
        Ok(samples.iter().map(|s| self.convert_sample(s)).collect())
    }

    /// Convert every sample of a trajectory.
    pub fn convert(&self, trajectory: &Trajectory) -> Result<Vec<FrameState>, FlybyError> {
        debug!(
            "frame conversion of {} ({} samples)",
            trajectory.id(),
            trajectory.len()
        );
        self.convert_samples(trajectory.samples())
    }
}

#[cfg(test)]
mod frame_converter_test {
    use super::*;
    use crate::constants::{EARTH_MAJOR_AXIS, EARTH_ROTATION_RATE, MEAN_EARTH_RADIUS, RADEG};
    use approx::assert_relative_eq;

    const JD0: f64 = 2_450_846.5; // 1998-01-23

    /// Inertial sample of a point at rest in the Earth-fixed frame.
    fn co_rotating_sample(converter: &FrameConverter, jd: f64, fixed: Vector3<f64>) -> TrajectorySample {
        let c2t = converter.rotation_at(jd);
        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE);
        TrajectorySample::new(
            jd,
            c2t.transpose() * fixed,
            c2t.transpose() * omega.cross(&fixed),
        )
    }

    #[test]
    fn test_co_rotating_point_is_at_rest() {
        let converter = FrameConverter::default();
        let fixed = GeodeticPosition {
            latitude: 33.0 * RADEG,
            longitude: -117.0 * RADEG,
            height: 539e3,
        }
        .to_fixed();

        let samples: Vec<_> = (0..5)
            .map(|i| co_rotating_sample(&converter, JD0 + 0.1 * i as f64, fixed))
            .collect();
        let states = converter.convert_samples(&samples).unwrap();

        assert_eq!(states.len(), 5);
        for state in &states {
            assert_relative_eq!(state.position, fixed, epsilon = 1e-6);
            assert!(state.velocity.norm() < 1e-9);
            assert_relative_eq!(state.latitude, 33.0 * RADEG, epsilon = 1e-10);
            assert_relative_eq!(state.longitude, -117.0 * RADEG, epsilon = 1e-10);
            assert_relative_eq!(
                state.altitude,
                fixed.norm() - MEAN_EARTH_RADIUS,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_ellipsoid_altitude_reference() {
        let converter = FrameConverter::new(FrameSettings {
            altitude_reference: AltitudeReference::Ellipsoid,
            ..FrameSettings::default()
        });
        let fixed = Vector3::new(EARTH_MAJOR_AXIS + 1_000e3, 0.0, 0.0);
        let states = converter
            .convert_samples(&[co_rotating_sample(&converter, JD0, fixed)])
            .unwrap();
        assert_relative_eq!(states[0].altitude, 1_000e3, epsilon = 1e-5);
        assert_relative_eq!(states[0].latitude, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_changes_with_epoch() {
        let converter = FrameConverter::default();
        let inertial = Vector3::new(7.0e6, 0.0, 0.0);
        let samples = [
            TrajectorySample::new(JD0, inertial, Vector3::zeros()),
            TrajectorySample::new(JD0 + 0.25, inertial, Vector3::zeros()),
        ];
        let states = converter.convert_samples(&samples).unwrap();

        // A quarter of a solar day is slightly more than a quarter of a sidereal turn
        let dlon = (states[0].longitude - states[1].longitude).rem_euclid(2.0 * std::f64::consts::PI);
        assert_relative_eq!(dlon, 0.25 * 2.0 * std::f64::consts::PI * 1.0027379, epsilon = 1e-5);

        // Inertially fixed point seen from the rotating Earth: v = −ω × r
        let expected_speed = EARTH_ROTATION_RATE * 7.0e6;
        assert_relative_eq!(states[0].velocity.norm(), expected_speed, epsilon = 1e-3);
        assert_relative_eq!(states[0].inertial_speed, 0.0);
    }

    #[test]
    fn test_unordered_epochs_are_rejected() {
        let converter = FrameConverter::default();
        let s = TrajectorySample::new(JD0, Vector3::new(7.0e6, 0.0, 0.0), Vector3::zeros());
        let mut later = s;
        later.jd_tdb = JD0 - 1.0;
        assert!(matches!(
            converter.convert_samples(&[s, later]),
            Err(FlybyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decimal_year_is_carried() {
        let converter = FrameConverter::default();
        let s = TrajectorySample::new(JD0, Vector3::new(7.0e6, 0.0, 0.0), Vector3::zeros());
        let states = converter.convert_samples(&[s]).unwrap();
        assert!(states[0].decimal_year > 1998.05 && states[0].decimal_year < 1998.07);
    }
}
