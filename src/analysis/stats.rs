//! NaN-aware summary statistics.
//!
//! Every function ignores NaN entries and returns `None` when nothing is
//! left to summarise.

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let v = finite(values);
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / v.len() as f64)
}

/// Population standard deviation (ddof = 0).
pub fn std(values: &[f64]) -> Option<f64> {
    let v = finite(values);
    let m = mean(&v)?;
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / v.len() as f64;
    Some(var.sqrt())
}

/// Biased sample skewness, `m3 / m2^1.5`. Zero for constant input.
pub fn skew(values: &[f64]) -> Option<f64> {
    let v = finite(values);
    let m = mean(&v)?;
    let n = v.len() as f64;
    let m2 = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    let m3 = v.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    if m2 == 0.0 {
        return Some(0.0);
    }
    Some(m3 / m2.powf(1.5))
}

pub fn median(values: &[f64]) -> Option<f64> {
    nanpercentile(values, 50.0)
}

/// Percentile `q` in [0, 100] with linear interpolation between order
/// statistics.
pub fn nanpercentile(values: &[f64], q: f64) -> Option<f64> {
    let mut v = finite(values);
    if v.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let pos = q / 100.0 * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(v[lo] + (v[hi] - v[lo]) * frac)
}
