//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc band-pass / high-pass / low-pass
//!   design with automatic transition bandwidths and lengths.
//! - [`apply`]: overlap-add zero-phase convolution.

pub mod apply;
pub mod design;

pub use design::{
    auto_filter_length, auto_h_trans_bandwidth, auto_trans_bandwidth, create_filter,
    design_bandpass, design_highpass, design_lowpass, firwin, frequency_response, hamming,
};
pub use apply::{apply_fir_zero_phase, filter_1d, OverlapAdd};

use ndarray::Array2;

use crate::error::Result;

/// Design a filter for `sfreq` and run it over the `picks` rows of `data`.
pub fn filter_data(
    data: &mut Array2<f64>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    picks: &[usize],
) -> Result<usize> {
    let h = create_filter(l_freq, h_freq, sfreq)?;
    apply_fir_zero_phase(data, &h, picks);
    Ok(h.len())
}
