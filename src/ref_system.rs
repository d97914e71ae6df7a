//! Elementary rotations and Earth-fixed coordinate systems.
//!
//! * [`rotmt`] – rotation of a vector about a coordinate axis,
//! * [`GeodeticPosition`] – WGS84 latitude / longitude / ellipsoidal height,
//! * [`SphericalPosition`] – geocentric radius / colatitude / longitude,
//! * [`ned_to_fixed`] – local North-East-Down frame → Earth-fixed Cartesian axes.

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::constants::{Meter, Radian, EARTH_MAJOR_AXIS, EARTH_MINOR_AXIS};

/// Construct a rotation matrix around a principal axis (X, Y, or Z).
///
/// The matrix rotates a **vector** by `alpha` radians about axis `k`
/// (`0 = X`, `1 = Y`, `2 = Z`), counter-clockwise when looking down the axis. The
/// change of *frame* by an angle `θ` (the usual `Rk(θ)` of the astronomical literature)
/// is therefore `rotmt(-θ, k)`.
///
/// Any `k > 2` is treated as the Z axis.
pub fn rotmt(alpha: Radian, k: usize) -> Matrix3<f64> {
    let axis = match k {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Squared first eccentricity of the WGS84 ellipsoid.
fn eccentricity_squared() -> f64 {
    1.0 - (EARTH_MINOR_AXIS / EARTH_MAJOR_AXIS).powi(2)
}

/// Position above the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPosition {
    /// Geodetic latitude (rad), within `[-π/2, π/2]`
    pub latitude: Radian,
    /// East longitude (rad), within `(-π, π]`
    pub longitude: Radian,
    /// Height above the ellipsoid (m)
    pub height: Meter,
}

impl GeodeticPosition {
    /// Geodetic coordinates of an Earth-fixed Cartesian position (meters).
    ///
    /// Fixed-point iteration on the latitude. The height is evaluated with the
    /// `p cos φ + z sin φ − a²/N` form, which stays finite on the polar axis; the
    /// geocenter maps to latitude 0 and height `−a`.
    pub fn from_fixed(position: &Vector3<f64>) -> Self {
        let e2 = eccentricity_squared();
        let a = EARTH_MAJOR_AXIS;

        let p = position.x.hypot(position.y);
        let z = position.z;
        let longitude = position.y.atan2(position.x);

        let mut latitude = z.atan2(p * (1.0 - e2));
        for _ in 0..10 {
            let sin_lat = latitude.sin();
            let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            let next = (z + e2 * n * sin_lat).atan2(p);
            let converged = (next - latitude).abs() < 1e-14;
            latitude = next;
            if converged {
                break;
            }
        }

        let (sin_lat, cos_lat) = latitude.sin_cos();
        let height = p * cos_lat + z * sin_lat - a * (1.0 - e2 * sin_lat * sin_lat).sqrt();

        GeodeticPosition {
            latitude,
            longitude,
            height,
        }
    }

    /// Earth-fixed Cartesian position (meters).
    pub fn to_fixed(&self) -> Vector3<f64> {
        let e2 = eccentricity_squared();
        let (sin_lat, cos_lat) = self.latitude.sin_cos();
        let (sin_lon, cos_lon) = self.longitude.sin_cos();
        let n = EARTH_MAJOR_AXIS / (1.0 - e2 * sin_lat * sin_lat).sqrt();

        Vector3::new(
            (n + self.height) * cos_lat * cos_lon,
            (n + self.height) * cos_lat * sin_lon,
            (n * (1.0 - e2) + self.height) * sin_lat,
        )
    }
}

/// Geocentric spherical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalPosition {
    /// Distance to the geocenter (m)
    pub radius: Meter,
    /// Geocentric colatitude (rad), within `[0, π]`
    pub colatitude: Radian,
    /// East longitude (rad)
    pub longitude: Radian,
}

impl SphericalPosition {
    pub fn from_fixed(position: &Vector3<f64>) -> Self {
        let p = position.x.hypot(position.y);
        SphericalPosition {
            radius: position.norm(),
            colatitude: p.atan2(position.z),
            longitude: position.y.atan2(position.x),
        }
    }

    /// Geocentric latitude (rad)
    pub fn latitude(&self) -> Radian {
        std::f64::consts::FRAC_PI_2 - self.colatitude
    }
}

/// Rotation taking a vector expressed in the local North-East-Down frame at
/// `(latitude, longitude)` into Earth-fixed Cartesian components.
///
/// The columns of the matrix are the north, east and down unit vectors:
///
/// ```text
/// b_x = −N sinφ cosλ − E sinλ − D cosφ cosλ
/// b_y = −N sinφ sinλ + E cosλ − D cosφ sinλ
/// b_z =  N cosφ               − D sinφ
/// ```
pub fn ned_to_fixed(latitude: Radian, longitude: Radian) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_lon, cos_lon) = longitude.sin_cos();

    Matrix3::new(
        -sin_lat * cos_lon,
        -sin_lon,
        -cos_lat * cos_lon,
        -sin_lat * sin_lon,
        cos_lon,
        -cos_lat * sin_lon,
        cos_lat,
        0.0,
        -sin_lat,
    )
}
