//! Inertial trajectory samples of a flyby.
//!
//! A [`Trajectory`] is the time-ordered list of geocentric J2000 equatorial states of one
//! spacecraft, in SI units. It is the only input of the factor pipeline: every derived
//! quantity (frame states, field samples, integrands, factors) is a pure function of it.
//!
//! Loaders usually produce kilometers and km/s (JPL Horizons convention); use
//! [`TrajectorySample::from_km`] to convert at the boundary.

use nalgebra::Vector3;

use crate::{
    constants::{Second, SpacecraftId, SpacecraftMap, JD, KM_TO_M},
    flyby_errors::FlybyError,
    time::elapsed_seconds,
};

/// One inertial state of a spacecraft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Julian date, TDB scale
    pub jd_tdb: JD,
    /// Geocentric position (m), J2000 equatorial axes
    pub position: Vector3<f64>,
    /// Geocentric velocity (m/s), J2000 equatorial axes
    pub velocity: Vector3<f64>,
}

impl TrajectorySample {
    pub fn new(jd_tdb: JD, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        TrajectorySample {
            jd_tdb,
            position,
            velocity,
        }
    }

    /// Build a sample from a position in km and a velocity in km/s.
    pub fn from_km(jd_tdb: JD, position_km: Vector3<f64>, velocity_km_s: Vector3<f64>) -> Self {
        TrajectorySample {
            jd_tdb,
            position: position_km * KM_TO_M,
            velocity: velocity_km_s * KM_TO_M,
        }
    }

    fn is_finite(&self) -> bool {
        self.jd_tdb.is_finite()
            && self.position.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
    }
}

/// Check that a sample sequence has finite values and strictly increasing epochs.
///
/// Return
/// ------
/// * `Err(FlybyError::InvalidInput)` naming the first offending sample index.
pub fn validate_samples(samples: &[TrajectorySample]) -> Result<(), FlybyError> {
    if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
        return Err(FlybyError::InvalidInput(format!(
            "non-finite trajectory sample at index {idx}"
        )));
    }

    if let Some(idx) = samples.windows(2).position(|w| w[1].jd_tdb <= w[0].jd_tdb) {
        return Err(FlybyError::InvalidInput(format!(
            "trajectory epochs are not strictly increasing at index {}",
            idx + 1
        )));
    }

    Ok(())
}

/// Validated trajectory of one spacecraft.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    id: SpacecraftId,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    /// Build a trajectory, rejecting empty, non-finite or unordered sequences.
    pub fn new(
        id: impl Into<SpacecraftId>,
        samples: Vec<TrajectorySample>,
    ) -> Result<Self, FlybyError> {
        if samples.is_empty() {
            return Err(FlybyError::InsufficientData {
                context: "trajectory",
                required: 1,
                found: 0,
            });
        }
        validate_samples(&samples)?;

        Ok(Trajectory {
            id: id.into(),
            samples,
        })
    }

    pub fn id(&self) -> &SpacecraftId {
        &self.id
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Seconds elapsed since the first sample, one value per sample.
    pub fn elapsed_seconds(&self) -> Vec<Second> {
        let jd0 = self.samples[0].jd_tdb;
        self.samples
            .iter()
            .map(|s| elapsed_seconds(s.jd_tdb, jd0))
            .collect()
    }
}

/// All trajectories of an analysis, keyed by spacecraft.
pub type TrajectorySet = SpacecraftMap<Trajectory>;

/// Collect trajectories into a [`TrajectorySet`], rejecting duplicated identifiers.
pub fn trajectory_set<I>(trajectories: I) -> Result<TrajectorySet, FlybyError>
where
    I: IntoIterator<Item = Trajectory>,
{
    let mut set = TrajectorySet::default();
    for traj in trajectories {
        if set.contains_key(traj.id()) {
            return Err(FlybyError::InvalidInput(format!(
                "duplicated trajectory for spacecraft {}",
                traj.id()
            )));
        }
        set.insert(traj.id().clone(), traj);
    }
    Ok(set)
}
