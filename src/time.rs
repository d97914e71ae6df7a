//! Time scale helpers.
//!
//! Trajectory epochs are Julian dates in the TDB scale (the `JDTDB` column of JPL Horizons
//! vector tables). The frame conversion needs them in TT (precession, nutation), in UT1
//! (sidereal time) and as a decimal year (geomagnetic model). All conversions go through
//! [`hifitime::Epoch`].

use hifitime::{ut1::Ut1Provider, Epoch};

use crate::constants::{Second, DAYS_PER_JULIAN_CENTURY, DPI, JD, MJD, SECONDS_PER_DAY, T2000};

/// How UT1 is obtained from UTC.
#[derive(Debug, Clone)]
pub enum Ut1Correction {
    /// Constant `UT1 − UTC` offset in seconds (0 means UT1 ≈ UTC).
    Constant(Second),
    /// Tabulated Earth orientation data.
    Provider(Ut1Provider),
}

impl Default for Ut1Correction {
    fn default() -> Self {
        Ut1Correction::Constant(0.0)
    }
}

/// Build an epoch from a Julian date expressed in TDB.
pub fn epoch_from_jd_tdb(jd: JD) -> Epoch {
    Epoch::from_jde_tdb(jd)
}

/// Seconds elapsed between two Julian dates of the same time scale.
#[inline]
pub fn elapsed_seconds(jd: JD, jd0: JD) -> Second {
    (jd - jd0) * SECONDS_PER_DAY
}

/// Julian centuries elapsed since J2000.0 for a Modified Julian Date.
#[inline]
pub(crate) fn julian_centuries(tjm: MJD) -> f64 {
    (tjm - T2000) / DAYS_PER_JULIAN_CENTURY
}

/// Modified Julian Date in the UT1 scale.
///
/// With [`Ut1Correction::Provider`], the conversion is delegated to hifitime's tabulated
/// `UT1 − TAI` offsets.
pub fn mjd_ut1(epoch: &Epoch, correction: &Ut1Correction) -> MJD {
    match correction {
        Ut1Correction::Constant(dut1) => epoch.to_mjd_utc_days() + dut1 / SECONDS_PER_DAY,
        Ut1Correction::Provider(provider) => epoch.to_ut1(provider).to_mjd_tai_days(),
    }
}

/// Fractional year in UTC, e.g. `1998.5` for early July 1998.
///
/// The fraction is computed from the actual length of the calendar year, so leap years
/// are handled exactly.
pub fn decimal_year(epoch: &Epoch) -> f64 {
    let (year, ..) = epoch.to_gregorian_utc();
    let start = Epoch::from_gregorian_utc_at_midnight(year, 1, 1);
    let end = Epoch::from_gregorian_utc_at_midnight(year + 1, 1, 1);

    let elapsed = (*epoch - start).to_seconds();
    let length = (end - start).to_seconds();

    year as f64 + elapsed / length
}

/// Compute the Greenwich Mean Sidereal Time (GMST) in radians
/// for a given Modified Julian Date (UT1 time scale).
///
/// IAU 1982 polynomial for the mean sidereal time at 0h UT1, plus the rotation
/// accumulated during the fraction of the day. The result is normalized to `[0, 2π)`.
///
/// # Arguments
/// * `tjm` - Modified Julian Date (MJD, UT1 time scale)
pub fn gmst(tjm: MJD) -> f64 {
    // Polynomial coefficients for GMST at 0h UT1 (in seconds)
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;

    // Ratio of sidereal day to solar day
    const RAP: f64 = 1.00273790934;

    let t = julian_centuries(tjm.floor());

    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / SECONDS_PER_DAY;
    let h = tjm.fract() * DPI;

    (gmst0 + h * RAP).rem_euclid(DPI)
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gmst() {
        let tut = 57028.478514610404;
        assert_relative_eq!(gmst(tut), 4.851925725092499, epsilon = 1e-12);

        assert_relative_eq!(gmst(T2000), 4.894961212789145, epsilon = 1e-12);
    }

    #[test]
    fn test_elapsed_seconds() {
        assert_eq!(elapsed_seconds(2451545.5, 2451545.0), 43_200.0);
        assert_eq!(elapsed_seconds(2451545.0, 2451545.0), 0.0);
    }

    #[test]
    fn test_epoch_from_jd_tdb_round_trip() {
        let jd = 2_450_846.5;
        let epoch = epoch_from_jd_tdb(jd);
        assert_relative_eq!(epoch.to_jde_tdb_days(), jd, epsilon = 1e-9);
    }

    #[test]
    fn test_decimal_year() {
        let start = Epoch::from_gregorian_utc_at_midnight(1998, 1, 1);
        assert_relative_eq!(decimal_year(&start), 1998.0, epsilon = 1e-12);

        // 2000 is a leap year: 183 days after January 1st is exactly mid-year
        let mid = Epoch::from_gregorian_utc_at_midnight(2000, 7, 2);
        assert_relative_eq!(decimal_year(&mid), 2000.5, epsilon = 1e-9);
    }

    #[test]
    fn test_mjd_ut1_constant_offset() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2005, 3, 4);
        let utc = epoch.to_mjd_utc_days();
        assert_relative_eq!(mjd_ut1(&epoch, &Ut1Correction::default()), utc);
        assert_relative_eq!(
            mjd_ut1(&epoch, &Ut1Correction::Constant(0.5)),
            utc + 0.5 / SECONDS_PER_DAY,
            epsilon = 1e-12
        );
    }
}
