/// Projection of glider positions onto a survey line.
///
/// Uses a local flat-earth approximation centred on the line's inshore
/// endpoint. Errors over the ~500 km extent of a CUGN line are well below
/// the width of a distance bin.

use crate::lines::Line;

/// Kilometres per degree of latitude on a sphere of radius 6371 km.
pub const KM_PER_DEG: f64 = 111.194_926_644_558_73;

/// Cross-shelf distance and signed offset of each position from `line`.
///
/// `dist` is the along-line component in km, measured from the inshore
/// endpoint toward the offshore one (negative inshore of the endpoint).
/// `offset` is the perpendicular distance in km, positive to the right of
/// the offshore-pointing direction. Non-finite positions give NaN.
pub fn calc_dist_offset(line: &Line, lons: &[f64], lats: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (lon0, lat0) = line.inshore;
    let coslat = lat0.to_radians().cos();

    let ex = (line.offshore.0 - lon0) * coslat * KM_PER_DEG;
    let ey = (line.offshore.1 - lat0) * KM_PER_DEG;
    let norm = ex.hypot(ey);
    let (ux, uy) = (ex / norm, ey / norm);

    lons.iter()
        .zip(lats)
        .map(|(&lon, &lat)| {
            if !lon.is_finite() || !lat.is_finite() {
                return (f64::NAN, f64::NAN);
            }
            let x = (lon - lon0) * coslat * KM_PER_DEG;
            let y = (lat - lat0) * KM_PER_DEG;
            (x * ux + y * uy, x * uy - y * ux)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::line;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_inshore_endpoint_is_origin() {
        let l = line("90.0").unwrap();
        let (d, o) = calc_dist_offset(l, &[l.inshore.0], &[l.inshore.1]);
        assert_abs_diff_eq!(d[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(o[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_offshore_endpoint_lies_on_line() {
        let l = line("80.0").unwrap();
        let (d, o) = calc_dist_offset(l, &[l.offshore.0], &[l.offshore.1]);
        assert!(d[0] > 300.0, "line 80 is several hundred km long, got {}", d[0]);
        assert_abs_diff_eq!(o[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_midpoint_is_half_the_distance() {
        let l = line("66.7").unwrap();
        let mid = (
            0.5 * (l.inshore.0 + l.offshore.0),
            0.5 * (l.inshore.1 + l.offshore.1),
        );
        let (d, _) = calc_dist_offset(l, &[mid.0, l.offshore.0], &[mid.1, l.offshore.1]);
        assert_abs_diff_eq!(d[0], 0.5 * d[1], epsilon = 1e-9);
    }

    #[test]
    fn test_points_either_side_have_opposite_offsets() {
        let l = line("90.0").unwrap();
        let (lon, lat) = (l.inshore.0 - 1.0, l.inshore.1 - 0.5);
        let (_, o) = calc_dist_offset(l, &[lon - 0.3, lon + 0.3], &[lat, lat]);
        assert!(o[0] * o[1] < 0.0, "offsets {:?} should straddle the line", o);
    }

    #[test]
    fn test_nan_position_gives_nan() {
        let l = line("56.0").unwrap();
        let (d, o) = calc_dist_offset(l, &[f64::NAN], &[38.0]);
        assert!(d[0].is_nan() && o[0].is_nan());
    }
}
