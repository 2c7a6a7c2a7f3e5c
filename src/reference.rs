//! Average reference: subtract the mean across EEG channels at each time point.
//!
//! `data`: [C, T]  →  `data[c, t] -= mean(data[picks, t])` for every `c` in `picks`.
//! Rows outside `picks` (stim, misc) neither contribute to nor receive the
//! reference.
use ndarray::{Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::raw::Raw;

pub fn average_reference_inplace(data: &mut Array2<f64>, picks: &[usize]) {
    // `mean_axis` is `None` only for an empty selection.
    let Some(means) = data.select(Axis(0), picks).mean_axis(Axis(0)) else {
        return;
    }; // shape [T]
    for &c in picks {
        let mut row = data.row_mut(c);
        row -= &means;
    }
}

/// Re-reference the EEG channels of `raw` to their common average.
pub fn set_average_reference(mut raw: Raw) -> Result<Raw> {
    let picks = raw.eeg_picks();
    if picks.is_empty() {
        return Err(PipelineError::invalid("average reference needs at least one EEG channel"));
    }
    average_reference_inplace(&mut raw.data, &picks);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn channel_sum_is_zero_after_reference() {
        let mut data = Array2::from_shape_fn((8, 512), |(c, t)| ((c * 7 + t * 3) as f64).sin());
        let picks: Vec<usize> = (0..8).collect();
        average_reference_inplace(&mut data, &picks);
        for &s in data.sum_axis(Axis(0)).iter() {
            approx::assert_abs_diff_eq!(s, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn reference_of_constant_gives_zero() {
        let mut data = Array2::from_elem((4, 100), 5.0);
        average_reference_inplace(&mut data, &[0, 1, 2, 3]);
        for &v in data.iter() {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn unpicked_rows_are_left_alone() {
        // Row 2 plays the trigger channel.
        let mut data = Array2::from_shape_fn((3, 10), |(c, _)| [2.0, 4.0, 7.0][c]);
        average_reference_inplace(&mut data, &[0, 1]);
        for t in 0..10 {
            approx::assert_abs_diff_eq!(data[[0, t]], -1.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(data[[1, t]], 1.0, epsilon = 1e-12);
            assert_eq!(data[[2, t]], 7.0);
        }
    }
}
