use log::warn;

use super::{GaussCoefficients, SphericalHarmonicModel};

/// IGRF-13 main field at 2020.0 and its 2020–2025 secular variation, degrees 1 to 4.
///
/// Rows are `(is_g, n, m, value nT, secular variation nT/yr)`.
#[rustfmt::skip]
const IGRF13_2020_DEGREE4: [(bool, usize, usize, f64, f64); 24] = [
    (true,  1, 0, -29404.8,   5.7),
    (true,  1, 1,  -1450.9,   7.4),
    (false, 1, 1,   4652.5, -25.9),
    (true,  2, 0,  -2499.6, -11.0),
    (true,  2, 1,   2982.0,  -7.0),
    (false, 2, 1,  -2991.6, -30.2),
    (true,  2, 2,   1677.0,  -2.1),
    (false, 2, 2,   -734.6, -22.4),
    (true,  3, 0,   1363.2,   2.2),
    (true,  3, 1,  -2381.2,  -5.9),
    (false, 3, 1,    -82.1,   6.0),
    (true,  3, 2,   1236.2,   3.1),
    (false, 3, 2,    241.9,  -1.1),
    (true,  3, 3,    525.7, -12.0),
    (false, 3, 3,   -543.4,   0.5),
    (true,  4, 0,    903.0,  -1.2),
    (true,  4, 1,    809.5,  -1.6),
    (false, 4, 1,    281.9,  -0.1),
    (true,  4, 2,     86.3,  -5.9),
    (false, 4, 2,   -158.4,   6.5),
    (true,  4, 3,   -309.4,   5.2),
    (false, 4, 3,    199.7,   3.6),
    (true,  4, 4,     48.0,  -5.1),
    (false, 4, 4,   -349.7,  -5.0),
];

impl SphericalHarmonicModel {
    /// Built-in IGRF-13 model truncated at degree 4.
    ///
    /// The dipole and the large-scale terms carry most of the field at flyby altitudes
    /// (hundreds of km and above), where the truncated degrees decay as `(a/r)^(n+2)`.
    /// The single 2020 epoch is extrapolated with the secular variation in both
    /// directions, which degrades for epochs decades away; load the full table with
    /// [`SphericalHarmonicModel::from_igrf_file`] when that matters.
    pub fn igrf13_degree4() -> Self {
        let mut main = GaussCoefficients::zeros(4);
        let mut sv = GaussCoefficients::zeros(4);
        for &(is_g, n, m, value, rate) in IGRF13_2020_DEGREE4.iter() {
            let n_m_ok = if is_g {
                main.set_g(n, m, value).and(sv.set_g(n, m, rate))
            } else {
                main.set_h(n, m, value).and(sv.set_h(n, m, rate))
            };
            if let Err(e) = n_m_ok {
                // the table is static and indexed within degree 4
                warn!("skipping built-in IGRF coefficient: {e}");
            }
        }

        SphericalHarmonicModel {
            name: "IGRF-13 (degree 4)".to_string(),
            epochs: vec![2020.0],
            snapshots: vec![main],
            secular_variation: sv,
            forward_span: 5.0,
            backward: true,
        }
    }
}
