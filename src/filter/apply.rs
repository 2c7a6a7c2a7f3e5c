//! Overlap-add zero-phase FIR convolution.
//!
//! Zero phase comes from reading the convolution output `(N-1)/2` samples
//! early, not from a forward-backward pass.  Each signal is extended by
//! `N-1` samples of odd reflection on both sides before filtering so the
//! edge transient lands in the discarded padding.
//!
//! ```text
//! x ──pad──► [refl | x | refl] ──blocks of n_fft-N+1──► FFT · Ĥ ──► IFFT
//!                                                                   │
//!            y ◄──crop──  Σ overlap-add, shifted by (N-1)/2  ◄──────┘
//! ```
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Apply a zero-phase FIR filter in-place to the rows of `data` ([C, T])
/// listed in `picks`.  Other rows (stim channels) are left untouched.
///
/// `h` must have odd length (guaranteed by the designers in [`super::design`]).
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64], picks: &[usize]) {
    let kernel = OverlapAdd::new(h, data.ncols());
    for &ch in picks {
        let filtered = kernel.filter(&data.row(ch).to_vec());
        data.row_mut(ch).assign(&ArrayView1::from(&filtered));
    }
}

/// Filter a single 1-D signal; the output has the length of `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Vec<f64> {
    OverlapAdd::new(h, x.len()).filter(x)
}

/// FFT plans and taps spectrum for one filter, sized for signals of a
/// given length and reusable across channels.
pub struct OverlapAdd {
    n_taps: usize,
    n_fft: usize,
    h_hat: Vec<Complex<f64>>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    pub fn new(h: &[f64], n_signal: usize) -> Self {
        let n_taps = h.len();
        let n_fft = fft_block_len(n_taps, n_signal + 2 * (n_taps - 1));
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_hat = vec![Complex::default(); n_fft];
        for (dst, &v) in h_hat.iter_mut().zip(h) {
            dst.re = v;
        }
        fwd.process(&mut h_hat);
        Self { n_taps, n_fft, h_hat, fwd, inv }
    }

    pub fn filter(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let n_edge = self.n_taps - 1;
        let shift = n_edge / 2;
        let padded = reflect_limited_pad(x, n_edge, n_edge);
        let block = self.n_fft - self.n_taps + 1;
        let scale = 1.0 / self.n_fft as f64;

        let mut out = vec![0.0; padded.len()];
        let mut buf = vec![Complex::default(); self.n_fft];
        for start in (0..padded.len()).step_by(block) {
            let stop = (start + block).min(padded.len());
            buf.fill(Complex::default());
            for (b, &v) in buf.iter_mut().zip(&padded[start..stop]) {
                b.re = v;
            }
            self.fwd.process(&mut buf);
            for (b, &hf) in buf.iter_mut().zip(&self.h_hat) {
                *b *= hf;
            }
            self.inv.process(&mut buf);

            // Product sample p lands on output sample start + p - shift.
            let skip = shift.saturating_sub(start);
            for (o, b) in out.iter_mut().skip(start + skip - shift).zip(&buf[skip..]) {
                *o += b.re * scale;
            }
        }
        out[n_edge..n_edge + x.len()].to_vec()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Odd reflection around the end samples, zero-filled where the request
/// exceeds the signal.
///
/// Left:  `2·x[0] − x[i]`      for i = n_l..1
/// Right: `2·x[n−1] − x[n−1−i]` for i = 1..n_r
pub(crate) fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let l = n_l.min(n - 1);
    let r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.extend(std::iter::repeat(0.0).take(n_l - l));
    out.extend((1..=l).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_r - r));
    out
}

/// Power-of-two block length minimising
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn fft_block_len(n_h: usize, n_x: usize) -> usize {
    let lo = (2 * n_h - 1).next_power_of_two().trailing_zeros();
    let hi = (n_x as f64).log2().ceil() as u32 + 1;
    let cost = |pow: u32| {
        let n = (1_usize << pow) as f64;
        (n_x as f64 / (n - n_h as f64 + 1.0)).ceil() * n * (pow as f64 + 1.0) + 4e-5 * n * n_x as f64
    };
    (lo..=hi)
        .min_by(|&a, &b| cost(a).total_cmp(&cost(b)))
        .map_or(1 << hi, |pow| 1 << pow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_bandpass, design_highpass};
    use std::f64::consts::PI;

    #[test]
    fn filter_preserves_length() {
        let x: Vec<f64> = (0..1024).map(|i| (i as f64 / 1024.0).sin()).collect();
        let h = design_highpass(0.5, 256.0);
        assert_eq!(filter_1d(&x, &h).len(), x.len());
    }

    #[test]
    fn filter_removes_dc() {
        let x = vec![1.0_f64; 4096];
        let h = design_highpass(0.5, 256.0);
        let y = filter_1d(&x, &h);
        let n_h = h.len();
        let max_val = y[n_h..y.len() - n_h].iter().map(|v| v.abs()).fold(0.0, f64::max);
        assert!(max_val < 1e-3, "DC not removed: max={max_val}");
    }

    #[test]
    fn bandpass_keeps_alpha_and_drops_line_noise() {
        let sfreq = 256.0;
        let x: Vec<f64> = (0..(20.0 * sfreq) as usize)
            .map(|i| {
                let t = i as f64 / sfreq;
                (2.0 * PI * 10.0 * t).sin() + (2.0 * PI * 50.0 * t).sin()
            })
            .collect();
        let h = design_bandpass(1.0, 25.0, sfreq);
        let y = filter_1d(&x, &h);
        let mid = y.len() / 2;
        let residual = (mid - 512..mid + 512)
            .map(|i| (y[i] - (2.0 * PI * 10.0 * i as f64 / sfreq).sin()).abs())
            .fold(0.0, f64::max);
        assert!(residual < 2e-2, "residual {residual}");
    }

    #[test]
    fn unpicked_rows_untouched() {
        let mut data = Array2::from_elem((2, 2048), 1.0);
        let h = design_highpass(1.0, 256.0);
        apply_fir_zero_phase(&mut data, &h, &[0]);
        assert!(data.row(1).iter().all(|&v| v == 1.0));
        assert!(data[[0, 1024]].abs() < 1e-3);
    }

    #[test]
    fn shared_kernel_matches_single_shot() {
        let h = design_bandpass(1.0, 25.0, 128.0);
        let x: Vec<f64> = (0..3000).map(|i| ((i * 7919) % 101) as f64 - 50.0).collect();
        let kernel = OverlapAdd::new(&h, x.len());
        assert_eq!(kernel.filter(&x), filter_1d(&x, &h));
    }

    #[test]
    fn block_len_fits_filter() {
        let n = fft_block_len(415, 10_000);
        assert!(n.is_power_of_two());
        assert!(n >= 2 * 415 - 1);
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_limited_pad(&x, 3, 0);
        // 2·1 − 4 = −2, 2·1 − 3 = −1, 2·1 − 2 = 0
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..], &x[..]);
    }

    #[test]
    fn reflect_pad_zero_fills_short_signals() {
        let padded = reflect_limited_pad(&[1.0, 3.0], 3, 3);
        assert_eq!(padded, vec![0.0, 0.0, -1.0, 1.0, 3.0, 5.0, 0.0, 0.0]);
    }
}
