//! Quantities derived from the raw glider fields.
//!
//! Solubility and density come in precomputed; this module only combines
//! them into saturation and stratification, and blanks profiles that are
//! known to have left the line. `add_derived` runs all three on a raw
//! dataset and yields the "potential" dataset the gridder reads.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};

use crate::geometry::calc_dist_offset;
use crate::ingest::dataset::ProfileDataset;
use crate::lines::Line;
use crate::logging::{self, Stage};
use crate::model::{COL_DOXY, COL_N, COL_SIGMA0, COL_SO, CugnError, Result};

/// Gravitational acceleration (m/s^2) used for N.
const GRAVITY: f64 = 9.8;
/// Reference seawater density (kg/m^3).
const RHO_0: f64 = 1025.0;

/// Oxygen saturation `doxy / oc`.
///
/// NaN wherever the solubility is missing or non-positive.
pub fn oxygen_saturation(doxy: &Array2<f64>, oc: &Array2<f64>) -> Result<Array2<f64>> {
    if doxy.dim() != oc.dim() {
        return Err(CugnError::ShapeMismatch(format!(
            "doxy {:?} vs solubility {:?}",
            doxy.dim(),
            oc.dim()
        )));
    }
    Ok(Zip::from(doxy)
        .and(oc)
        .map_collect(|&o, &s| if s > 0.0 { o / s } else { f64::NAN }))
}

/// Buoyancy frequency in cycles per hour from `sigma0` on levels spaced
/// `dz` metres apart.
///
/// The vertical derivative uses central differences in the interior and
/// one-sided differences on the top and bottom levels. Unstable
/// (negative) gradients are clipped to zero.
pub fn buoyancy_frequency(sigma0: &Array2<f64>, dz: f64) -> Result<Array2<f64>> {
    let (nz, np) = sigma0.dim();
    if nz < 2 {
        return Err(CugnError::ShapeMismatch(format!(
            "need at least 2 depth levels for a gradient, got {}",
            nz
        )));
    }
    if !(dz.is_finite() && dz > 0.0) {
        return Err(CugnError::InvalidArgument(format!(
            "depth spacing must be positive, got {}",
            dz
        )));
    }

    let mut n = Array2::<f64>::zeros((nz, np));
    for iz in 0..nz {
        let (lo, hi, span) = if iz == 0 {
            (0, 1, dz)
        } else if iz == nz - 1 {
            (nz - 2, nz - 1, dz)
        } else {
            (iz - 1, iz + 1, 2.0 * dz)
        };
        for ip in 0..np {
            let grad = (sigma0[[hi, ip]] - sigma0[[lo, ip]]) / span;
            // NaN passes through untouched.
            let grad = if grad < 0.0 { 0.0 } else { grad };
            n[[iz, ip]] = (GRAVITY / RHO_0 * grad).sqrt() / (2.0 * PI) * 3600.0;
        }
    }
    Ok(n)
}

/// Blank every variable on profiles that wandered off `line`.
///
/// Line 80.0 has a 2020 excursion toward San Diego (`dist < -50 km`); line
/// 90.0 lost mission 63 to a trip into Mexican waters. Other lines are
/// untouched. Returns the number of profiles blanked.
pub fn mask_line_excursions(ds: &mut ProfileDataset, line: &Line) -> Result<usize> {
    let bad: Vec<bool> = match line.label {
        "80.0" => {
            let (dist, _) = calc_dist_offset(line, &ds.lon, &ds.lat);
            dist.iter().map(|&d| d < -50.0).collect()
        }
        "90.0" => {
            if ds.mission.is_empty() {
                return Err(CugnError::MissingColumn("mission".to_string()));
            }
            ds.mission.iter().map(|&m| m == 63).collect()
        }
        _ => return Ok(0),
    };

    let n_bad = bad.iter().filter(|&&b| b).count();
    for field in ds.variables.values_mut() {
        for (mut column, &is_bad) in field.columns_mut().into_iter().zip(&bad) {
            if is_bad {
                column.fill(f64::NAN);
            }
        }
    }

    if n_bad > 0 {
        logging::info(
            Stage::Grid,
            Some(line.label),
            &format!("Blanked {} off-line profiles", n_bad),
        );
    }
    Ok(n_bad)
}

/// Spacing of the dataset's depth levels in metres.
///
/// The levels must be evenly spaced; `buoyancy_frequency` assumes it.
pub fn level_spacing(depth: &[f64]) -> Result<f64> {
    if depth.len() < 2 {
        return Err(CugnError::ShapeMismatch(format!(
            "need at least 2 depth levels, got {}",
            depth.len()
        )));
    }
    let dz = depth[1] - depth[0];
    let uneven = depth
        .windows(2)
        .any(|w| ((w[1] - w[0]) - dz).abs() > 1e-6 * dz.abs().max(1.0));
    if uneven {
        return Err(CugnError::InvalidArgument(
            "depth levels are not evenly spaced".to_string(),
        ));
    }
    Ok(dz)
}

/// Add `SO` and `N` to a raw dataset, then blank the line's excursions.
///
/// `solubility` names the oxygen-solubility variable. Existing `SO`/`N`
/// fields are replaced. Returns the number of profiles blanked.
pub fn add_derived(ds: &mut ProfileDataset, line: &Line, solubility: &str) -> Result<usize> {
    ds.validate()?;
    let dz = level_spacing(&ds.depth)?;
    let so = oxygen_saturation(ds.variable(COL_DOXY)?, ds.variable(solubility)?)?;
    let n = buoyancy_frequency(ds.variable(COL_SIGMA0)?, dz)?;
    ds.variables.insert(COL_SO.to_string(), so);
    ds.variables.insert(COL_N.to_string(), n);

    logging::info(
        Stage::Grid,
        Some(line.label),
        &format!(
            "Derived SO and N for {} profiles on {} levels ({} m spacing)",
            ds.n_profile(),
            ds.n_depth(),
            dz
        ),
    );
    mask_line_excursions(ds, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::dataset::tests::tiny_dataset;
    use crate::lines::line;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_saturation_is_ratio_where_solubility_positive() {
        let so = oxygen_saturation(
            &array![[250.0, 200.0], [100.0, 90.0]],
            &array![[250.0, 0.0], [200.0, f64::NAN]],
        )
        .unwrap();
        assert_eq!(so[[0, 0]], 1.0);
        assert!(so[[0, 1]].is_nan(), "zero solubility must not divide");
        assert_eq!(so[[1, 0]], 0.5);
        assert!(so[[1, 1]].is_nan());
    }

    #[test]
    fn test_saturation_rejects_shape_mismatch() {
        let err = oxygen_saturation(&Array2::zeros((2, 3)), &Array2::zeros((3, 2))).unwrap_err();
        assert!(matches!(err, CugnError::ShapeMismatch(_)));
    }

    #[test]
    fn test_buoyancy_frequency_of_linear_stratification() {
        // dsigma/dz = 0.01 kg/m^3 per metre at every level.
        let sigma0 = array![[24.0], [24.1], [24.2], [24.3]];
        let n = buoyancy_frequency(&sigma0, 10.0).unwrap();
        let expected = (9.8 / 1025.0 * 0.01_f64).sqrt() / (2.0 * PI) * 3600.0;
        for iz in 0..4 {
            assert_abs_diff_eq!(n[[iz, 0]], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_buoyancy_frequency_clips_unstable_gradient() {
        let sigma0 = array![[25.0], [24.0]];
        let n = buoyancy_frequency(&sigma0, 10.0).unwrap();
        assert_eq!(n[[0, 0]], 0.0, "inverted density gives zero N");
        assert_eq!(n[[1, 0]], 0.0);
    }

    #[test]
    fn test_buoyancy_frequency_needs_two_levels() {
        let err = buoyancy_frequency(&array![[24.0, 24.5]], 10.0).unwrap_err();
        assert!(matches!(err, CugnError::ShapeMismatch(_)));
    }

    #[test]
    fn test_line_90_blanks_mission_63() {
        let mut ds = tiny_dataset();
        let n = mask_line_excursions(&mut ds, line("90.0").unwrap()).unwrap();
        assert_eq!(n, 2);
        let doxy = ds.variable("doxy").unwrap();
        assert!(doxy.column(2).iter().all(|v| v.is_nan()));
        assert!(doxy.column(3).iter().all(|v| v.is_nan()));
        assert_eq!(doxy[[1, 0]], 230.0, "mission 60 is kept");
    }

    #[test]
    fn test_line_80_blanks_profiles_south_of_inshore_end() {
        let l = line("80.0").unwrap();
        let mut ds = tiny_dataset();
        // One profile on the line, one far down the coast toward San Diego.
        ds.lon = vec![l.inshore.0 - 0.5, -117.2, l.inshore.0 - 0.5, l.inshore.0 - 0.5];
        ds.lat = vec![l.inshore.1 - 0.3, 32.7, l.inshore.1 - 0.3, l.inshore.1 - 0.3];
        let n = mask_line_excursions(&mut ds, l).unwrap();
        assert_eq!(n, 1);
        assert!(ds.variable("doxy").unwrap().column(1).iter().all(|v| v.is_nan()));
    }

    fn raw_dataset() -> ProfileDataset {
        let mut ds = tiny_dataset();
        ds.variables.insert("OC".to_string(), Array2::from_elem((3, 4), 250.0));
        ds.variables.insert(
            "sigma0".to_string(),
            array![
                [24.0, 24.0, 24.0, 24.0],
                [24.1, 24.1, 24.1, 24.1],
                [24.2, 24.2, 24.2, 24.2]
            ],
        );
        ds
    }

    #[test]
    fn test_add_derived_inserts_so_and_n_then_masks() {
        let mut ds = raw_dataset();
        let blanked = add_derived(&mut ds, line("90.0").unwrap(), "OC").unwrap();
        assert_eq!(blanked, 2, "mission 63 is blanked after deriving");

        let so = ds.variable("SO").unwrap();
        assert_abs_diff_eq!(so[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(so[[2, 1]], 205.0 / 250.0, epsilon = 1e-12);
        assert!(so[[0, 2]].is_nan(), "derived fields are masked too");

        let n = ds.variable("N").unwrap();
        let expected = (9.8 / 1025.0 * 0.01_f64).sqrt() / (2.0 * PI) * 3600.0;
        assert_abs_diff_eq!(n[[1, 0]], expected, epsilon = 1e-9);
        assert!(n[[1, 3]].is_nan());
        ds.validate().expect("derived fields keep the dataset shape");
    }

    #[test]
    fn test_add_derived_needs_solubility() {
        let mut ds = raw_dataset();
        let err = add_derived(&mut ds, line("66.7").unwrap(), "O2sol").unwrap_err();
        assert!(matches!(err, CugnError::MissingColumn(ref c) if c == "O2sol"), "got {:?}", err);
        assert!(!ds.variables.contains_key("SO"), "nothing is added on failure");
    }

    #[test]
    fn test_level_spacing_rejects_uneven_levels() {
        assert_eq!(level_spacing(&[10.0, 20.0, 30.0]).unwrap(), 10.0);
        assert!(matches!(
            level_spacing(&[10.0, 20.0, 35.0]),
            Err(CugnError::InvalidArgument(_))
        ));
        assert!(matches!(level_spacing(&[10.0]), Err(CugnError::ShapeMismatch(_))));
    }

    #[test]
    fn test_other_lines_are_untouched() {
        let mut ds = tiny_dataset();
        let before = ds.clone();
        assert_eq!(mask_line_excursions(&mut ds, line("66.7").unwrap()).unwrap(), 0);
        assert_eq!(ds.profile, before.profile);
        assert_eq!(ds.variable("doxy").unwrap()[[2, 2]], 190.0);
    }
}
