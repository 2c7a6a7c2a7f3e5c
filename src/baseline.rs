//! Baseline correction.
//!
//! The baseline window is resolved against a time axis the way a
//! `rescale` does it: the first sample at or after `bmin` up to the last
//! sample at or before `bmax`.  A window starting before the data is
//! clamped to the first sample; a window that selects nothing is an error.
//!
//! Modes, with `m` the baseline mean and `s` the baseline std:
//!
//! ```text
//! Mean      x − m
//! Ratio     x / m
//! LogRatio  log10(x / m)
//! Percent   (x − m) / m
//! ZScore    (x − m) / s
//! ```
use ndarray::{Array3, ArrayViewMut1, Axis};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    Mean,
    Ratio,
    LogRatio,
    Percent,
    ZScore,
}

/// Half-open sample range `[imin, imax)` covered by `(bmin, bmax)`.
pub fn baseline_indices(times: &[f64], (bmin, bmax): (f64, f64)) -> Result<(usize, usize)> {
    if bmin > bmax {
        return Err(PipelineError::invalid(format!("baseline start {bmin} is after its end {bmax}")));
    }
    // Half a sample of slack absorbs rounding in the time axis.
    let tol = match times {
        [a, b, ..] => (b - a).abs() * 1e-3,
        _ => 0.0,
    };
    let imin = times
        .iter()
        .position(|&t| t >= bmin - tol)
        .ok_or_else(|| PipelineError::invalid(format!("baseline start {bmin} s is after the data")))?;
    let imax = times
        .iter()
        .rposition(|&t| t <= bmax + tol)
        .ok_or_else(|| PipelineError::invalid(format!("baseline end {bmax} s is before the data")))?
        + 1;
    if imax <= imin {
        return Err(PipelineError::invalid(format!("baseline ({bmin}, {bmax}) selects no samples")));
    }
    Ok((imin, imax))
}

/// Rescale one time course in place against its `[imin, imax)` segment.
pub fn rescale_inplace(mut x: ArrayViewMut1<'_, f64>, imin: usize, imax: usize, mode: BaselineMode) {
    let seg = x.slice(ndarray::s![imin..imax]);
    let n = seg.len() as f64;
    let m = seg.sum() / n;
    match mode {
        BaselineMode::Mean => x.mapv_inplace(|v| v - m),
        BaselineMode::Ratio => x.mapv_inplace(|v| v / m),
        BaselineMode::LogRatio => x.mapv_inplace(|v| (v / m).log10()),
        BaselineMode::Percent => x.mapv_inplace(|v| (v - m) / m),
        BaselineMode::ZScore => {
            let s = (seg.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n).sqrt();
            x.mapv_inplace(|v| (v - m) / s);
        }
    }
}

/// Per-epoch, per-channel mean subtraction.
/// `epochs`: [E, C, T]  →  epoch[e, c, :] -= mean(epoch[e, c, imin..imax])
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, imin: usize, imax: usize) {
    for lane in epochs.lanes_mut(Axis(2)) {
        rescale_inplace(lane, imin, imax, BaselineMode::Mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn axis(tmin: f64, n: usize, sfreq: f64) -> Vec<f64> {
        (0..n).map(|i| tmin + i as f64 / sfreq).collect()
    }

    #[test]
    fn indices_cover_closed_window() {
        // −0.25 … 0.75 at 4 Hz → samples at −0.25, 0, 0.25, 0.5, 0.75
        let t = axis(-0.25, 5, 4.0);
        assert_eq!(baseline_indices(&t, (-0.25, 0.0)).unwrap(), (0, 2));
    }

    #[test]
    fn window_before_data_is_clamped() {
        let t = axis(-0.2, 100, 100.0);
        assert_eq!(baseline_indices(&t, (-0.5, 0.0)).unwrap(), (0, 21));
    }

    #[test]
    fn empty_window_is_an_error() {
        let t = axis(0.0, 10, 10.0);
        assert!(baseline_indices(&t, (-1.0, -0.5)).is_err());
        assert!(baseline_indices(&t, (5.0, 6.0)).is_err());
    }

    #[test]
    fn baseline_removes_window_mean() {
        let mut epochs = Array3::from_shape_fn((3, 4, 50), |(e, c, t)| {
            e as f64 * 10.0 + c as f64 * 5.0 + if t < 10 { 1.0 } else { 3.0 }
        });
        baseline_correct_inplace(&mut epochs, 0, 10);
        for lane in epochs.lanes(Axis(2)) {
            approx::assert_abs_diff_eq!(lane[0], 0.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(lane[49], 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn logratio_of_constant_is_zero() {
        let mut x = Array1::from_elem(20, 4.0);
        rescale_inplace(x.view_mut(), 0, 5, BaselineMode::LogRatio);
        assert!(x.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn zscore_mode() {
        let mut x = Array1::from_vec(vec![1.0, 3.0, 1.0, 3.0, 10.0]);
        rescale_inplace(x.view_mut(), 0, 4, BaselineMode::ZScore);
        approx::assert_abs_diff_eq!(x[4], 8.0, epsilon = 1e-12);
    }
}
