//! Earth orientation: precession, nutation and sidereal rotation.
//!
//! The celestial-to-terrestrial matrix is built as
//!
//! ```text
//! M(t) = R3(GAST) · N(t) · P(t)
//! ```
//!
//! with the IAU 1976 precession `P`, the IAU 1980 nutation `N` and the Greenwich apparent
//! sidereal time `GAST = GMST + equation of the equinoxes`. Polar motion and the frame
//! bias between ICRF and the dynamical J2000 frame are neglected; both are at the
//! milli-arcsecond level, far below what the flyby integrals are sensitive to.
//!
//! Nutation keeps the leading terms of the IAU 1980 series (the ones larger than 0.5 mas),
//! which reproduces the full theory to about 0.02 arcsecond.

use nalgebra::Matrix3;

use crate::constants::{ArcSec, Radian, DPI, MJD, RADEG, RADSEC};
use crate::ref_system::rotmt;
use crate::time::{gmst, julian_centuries};

/// One periodic term of the IAU 1980 nutation series.
///
/// `args` are the integer multipliers of (l, l', F, D, Ω); the amplitudes are in units
/// of 0.0001 arcsecond, with their linear rate per Julian century.
struct NutationTerm {
    args: [i8; 5],
    psi: f64,
    psi_t: f64,
    eps: f64,
    eps_t: f64,
}

const fn term(args: [i8; 5], psi: f64, psi_t: f64, eps: f64, eps_t: f64) -> NutationTerm {
    NutationTerm {
        args,
        psi,
        psi_t,
        eps,
        eps_t,
    }
}

#[rustfmt::skip]
const NUTATION_1980: [NutationTerm; 43] = [
    term([ 0,  0, 0,  0, 1], -171996.0, -174.2, 92025.0,  8.9),
    term([ 0,  0, 2, -2, 2],  -13187.0,   -1.6,  5736.0, -3.1),
    term([ 0,  0, 2,  0, 2],   -2274.0,   -0.2,   977.0, -0.5),
    term([ 0,  0, 0,  0, 2],    2062.0,    0.2,  -895.0,  0.5),
    term([ 0,  1, 0,  0, 0],    1426.0,   -3.4,    54.0, -0.1),
    term([ 1,  0, 0,  0, 0],     712.0,    0.1,    -7.0,  0.0),
    term([ 0,  1, 2, -2, 2],    -517.0,    1.2,   224.0, -0.6),
    term([ 0,  0, 2,  0, 1],    -386.0,   -0.4,   200.0,  0.0),
    term([ 1,  0, 2,  0, 2],    -301.0,    0.0,   129.0, -0.1),
    term([ 0, -1, 2, -2, 2],     217.0,   -0.5,   -95.0,  0.3),
    term([ 1,  0, 0, -2, 0],    -158.0,    0.0,     0.0,  0.0),
    term([ 0,  0, 2, -2, 1],     129.0,    0.1,   -70.0,  0.0),
    term([-1,  0, 2,  0, 2],     123.0,    0.0,   -53.0,  0.0),
    term([ 1,  0, 0,  0, 1],      63.0,    0.1,   -33.0,  0.0),
    term([ 0,  0, 0,  2, 0],      63.0,    0.0,     0.0,  0.0),
    term([-1,  0, 2,  2, 2],     -59.0,    0.0,    26.0,  0.0),
    term([-1,  0, 0,  0, 1],     -58.0,   -0.1,    32.0,  0.0),
    term([ 1,  0, 2,  0, 1],     -51.0,    0.0,    27.0,  0.0),
    term([ 2,  0, 2,  0, 2],     -38.0,    0.0,    16.0,  0.0),
    term([ 0,  0, 2,  2, 2],     -31.0,    0.0,    13.0,  0.0),
    term([ 2,  0, 0,  0, 0],      29.0,    0.0,     0.0,  0.0),
    term([ 1,  0, 2, -2, 2],      29.0,    0.0,   -12.0,  0.0),
    term([ 0,  0, 2,  0, 0],      26.0,    0.0,     0.0,  0.0),
    term([ 0,  0, 2, -2, 0],     -22.0,    0.0,     0.0,  0.0),
    term([-1,  0, 2,  0, 1],      21.0,    0.0,   -10.0,  0.0),
    term([ 0,  2, 0,  0, 0],      17.0,   -0.1,     0.0,  0.0),
    term([ 0,  2, 2, -2, 2],     -16.0,    0.1,     7.0,  0.0),
    term([-1,  0, 0,  2, 1],      16.0,    0.0,    -8.0,  0.0),
    term([ 0,  1, 0,  0, 1],     -15.0,    0.0,     9.0,  0.0),
    term([ 1,  0, 0, -2, 1],     -13.0,    0.0,     7.0,  0.0),
    term([ 0, -1, 0,  0, 1],     -12.0,    0.0,     6.0,  0.0),
    term([ 2,  0, -2, 0, 0],      11.0,    0.0,     0.0,  0.0),
    term([-1,  0, 2,  2, 1],     -10.0,    0.0,     5.0,  0.0),
    term([ 1,  0, 2,  2, 2],      -8.0,    0.0,     3.0,  0.0),
    term([ 0, -1, 2,  0, 2],      -7.0,    0.0,     3.0,  0.0),
    term([ 0,  0, 2,  2, 1],      -7.0,    0.0,     3.0,  0.0),
    term([ 1,  1, 0, -2, 0],      -7.0,    0.0,     0.0,  0.0),
    term([ 0,  1, 2,  0, 2],       7.0,    0.0,    -3.0,  0.0),
    term([-2,  0, 0,  2, 1],      -6.0,    0.0,     3.0,  0.0),
    term([ 0,  0, 0,  2, 1],      -6.0,    0.0,     3.0,  0.0),
    term([ 2,  0, 2, -2, 2],       6.0,    0.0,    -3.0,  0.0),
    term([ 1,  0, 0,  2, 0],       6.0,    0.0,     0.0,  0.0),
    term([ 1,  0, 2, -2, 1],       6.0,    0.0,    -3.0,  0.0),
];

/// Compute the mean obliquity of the ecliptic (IAU 1976), in radians.
///
/// # Arguments
/// * `tjm` - Modified Julian Date (TT)
pub fn obleq(tjm: MJD) -> Radian {
    let ob0 = ((23.0 * 3600.0 + 26.0 * 60.0) + 21.448) * RADSEC;
    let ob1 = -46.815 * RADSEC;
    let ob2 = -0.0006 * RADSEC;
    let ob3 = 0.00181 * RADSEC;

    let t = julian_centuries(tjm);

    ((ob3 * t + ob2) * t + ob1) * t + ob0
}

/// Fundamental lunisolar arguments (l, l', F, D, Ω) in radians.
fn fundamental_arguments(t: f64) -> [Radian; 5] {
    let t2 = t * t;
    let t3 = t2 * t;

    let l = 485866.733 + 1717915922.633 * t + 31.310 * t2 + 0.064 * t3;
    let lp = 1287099.804 + 129596581.224 * t - 0.577 * t2 - 0.012 * t3;
    let f = 335778.877 + 1739527263.137 * t - 13.257 * t2 + 0.011 * t3;
    let d = 1072261.307 + 1602961601.328 * t - 6.891 * t2 + 0.019 * t3;
    let n = 450160.280 - 6962890.539 * t + 7.455 * t2 + 0.008 * t3;

    [l, lp, f, d, n].map(|arcsec| (arcsec * RADSEC) % DPI)
}

/// Nutation in longitude and obliquity `(Δψ, Δε)`, in arcseconds.
///
/// # Arguments
/// * `tjm` - Modified Julian Date (TT)
pub fn nutn80(tjm: MJD) -> (ArcSec, ArcSec) {
    let t = julian_centuries(tjm);
    let fa = fundamental_arguments(t);

    let (dpsi, deps) = NUTATION_1980.iter().fold((0.0, 0.0), |(dpsi, deps), nt| {
        let arg: f64 = nt
            .args
            .iter()
            .zip(fa.iter())
            .map(|(&k, &a)| k as f64 * a)
            .sum();
        (
            dpsi + (nt.psi + nt.psi_t * t) * arg.sin(),
            deps + (nt.eps + nt.eps_t * t) * arg.cos(),
        )
    });

    (dpsi * 1e-4, deps * 1e-4)
}

/// Nutation matrix: mean equator and equinox of date → true equator and equinox of date.
///
/// `N = R1(−ε−Δε) · R3(−Δψ) · R1(ε)` in frame-rotation notation.
pub fn rnut80(tjm: MJD) -> Matrix3<f64> {
    let epsm = obleq(tjm);
    let (dpsi, deps) = nutn80(tjm);
    let epst = epsm + deps * RADSEC;

    rotmt(epst, 0) * rotmt(dpsi * RADSEC, 2) * rotmt(-epsm, 0)
}

/// Equation of the equinoxes `Δψ · cos ε`, in radians.
pub fn equequ(tjm: MJD) -> Radian {
    let (dpsi, _) = nutn80(tjm);
    RADSEC * dpsi * obleq(tjm).cos()
}

/// Precession matrix (IAU 1976): mean J2000 frame → mean equator and equinox of date,
/// so that `x_mean(tjm) = P · x_J2000`.
///
/// `P = R3(−z) · R2(θ) · R3(−ζ)` in frame-rotation notation, with the angles of the
/// Astronomical Almanac (1987, B18).
pub fn prec(tjm: MJD) -> Matrix3<f64> {
    let t = julian_centuries(tjm);

    let zeta = ((0.0000050 * t + 0.0000839) * t + 0.6406161) * t * RADEG;
    let z = ((0.0000051 * t + 0.0003041) * t + 0.6406161) * t * RADEG;
    let theta = ((-0.0000116 * t - 0.0001185) * t + 0.5567530) * t * RADEG;

    rotmt(z, 2) * rotmt(-theta, 1) * rotmt(zeta, 2)
}

/// Greenwich apparent sidereal time, in radians within `[0, 2π)`.
///
/// # Arguments
/// * `mjd_ut1` - epoch in the UT1 scale (sidereal rotation)
/// * `mjd_tt` - the same epoch in the TT scale (nutation)
pub fn gast(mjd_ut1: MJD, mjd_tt: MJD) -> Radian {
    (gmst(mjd_ut1) + equequ(mjd_tt)).rem_euclid(DPI)
}

/// Celestial (J2000 equatorial) → terrestrial (Earth-fixed) rotation matrix.
pub fn celestial_to_terrestrial(mjd_ut1: MJD, mjd_tt: MJD) -> Matrix3<f64> {
    rotmt(-gast(mjd_ut1, mjd_tt), 2) * rnut80(mjd_tt) * prec(mjd_tt)
}
