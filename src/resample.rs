//! FFT-based rational resampler (`method='fft'` semantics).
//!
//! Algorithm:
//!   1. Pad to the next power of two with reflect-limited samples.
//!   2. rfft(padded)  →  complex half-spectrum.
//!   3. If downsampling: double the Nyquist bin (use_len = new_len).
//!      If upsampling:   halve  the Nyquist bin (use_len = old_len).
//!   4. Scale all bins by `new_len_padded / old_len_padded`.
//!   5. irfft(spectrum, n=new_len_padded), truncating or zero-padding the
//!      spectrum.
//!   6. Strip the resampled padding edges.
//!
//! Stim channels are never pushed through the FFT: every non-zero run of a
//! trigger channel is mapped onto the new grid instead, so that short pulses
//! survive decimation with their codes intact.
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{PipelineError, Result};
use crate::filter::apply::reflect_limited_pad;
use crate::raw::{ChannelKind, Raw};

/// Padding on each side: pad to the next power of 2.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// npads   = [total // 2, total - total // 2]
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

fn check_rates(src_sfreq: f64, dst_sfreq: f64) -> Result<()> {
    for (name, f) in [("source", src_sfreq), ("target", dst_sfreq)] {
        if !(f.is_finite() && f > 0.0) {
            return Err(PipelineError::invalid(format!("{name} sampling rate must be positive, got {f}")));
        }
    }
    Ok(())
}

/// Resample every row of `data` ([C, T]) from `src_sfreq` to `dst_sfreq`.
pub fn resample(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    check_rates(src_sfreq, dst_sfreq)?;
    if (src_sfreq - dst_sfreq).abs() < 1e-9 {
        return Ok(data.clone());
    }
    Ok(resample_rows(data, dst_sfreq / src_sfreq, |_| false))
}

/// Resample a recording, treating stim channels as event trains.
pub fn resample_raw(mut raw: Raw, dst_sfreq: f64) -> Result<Raw> {
    check_rates(raw.sfreq, dst_sfreq)?;
    if (raw.sfreq - dst_sfreq).abs() > 1e-9 {
        let kinds = &raw.ch_kinds;
        raw.data = resample_rows(&raw.data, dst_sfreq / raw.sfreq, |ch| kinds[ch] == ChannelKind::Stim);
    }
    raw.sfreq = dst_sfreq;
    Ok(raw)
}

fn resample_rows(data: &Array2<f64>, ratio: f64, is_stim: impl Fn(usize) -> bool) -> Array2<f64> {
    let n_in = data.ncols();
    let final_len = final_length(n_in, ratio);
    let (npad_l, npad_r) = auto_npad(n_in);

    let mut out = Array2::<f64>::zeros((data.nrows(), final_len));
    for (ch, row) in data.rows().into_iter().enumerate() {
        let x = row.to_vec();
        let resampled = if is_stim(ch) {
            resample_stim(&x, ratio, final_len)
        } else {
            resample_1d(&x, ratio, npad_l, npad_r)
        };
        out.row_mut(ch).assign(&ArrayView1::from(&resampled));
    }
    out
}

/// Resample a single 1-D signal with explicit (possibly asymmetric) padding.
///
/// Padding beyond `x.len() - 1` samples is clamped.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let pad_l = npad_l.min(x.len() - 1);
    let pad_r = npad_r.min(x.len() - 1);
    let padded = reflect_limited_pad(x, pad_l, pad_r);
    let new_len = ((ratio * padded.len() as f64).round() as usize).max(1);

    let n_out = final_length(x.len(), ratio);
    let skip = ((ratio * pad_l as f64).round() as usize).min(new_len);
    let mut out: Vec<f64> = fourier_resize(&padded, new_len).into_iter().skip(skip).take(n_out).collect();
    out.resize(n_out, 0.0);
    out
}

/// Band-limited change of length: `irfft(rfft(x) · new/old, n = new)`.
///
/// The Nyquist bin of the shorter of the two lengths is doubled when
/// shrinking and halved when growing, as `scipy.signal.resample` does.
fn fourier_resize(x: &[f64], new_len: usize) -> Vec<f64> {
    let old_len = x.len();
    let shrinking = new_len < old_len;
    let use_len = old_len.min(new_len);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let mut spectrum: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut spectrum);
    spectrum.truncate(old_len / 2 + 1);

    if use_len % 2 == 0 {
        if let Some(bin) = spectrum.get_mut(use_len / 2) {
            *bin *= if shrinking { 2.0 } else { 0.5 };
        }
    }

    // Half-spectrum of the output, completed to Hermitian symmetry.
    let half = new_len / 2 + 1;
    let gain = new_len as f64 / old_len as f64;
    let mut full = vec![Complex::<f64>::default(); new_len];
    for (dst, &src) in full.iter_mut().zip(spectrum.iter().take(half)) {
        *dst = src * gain;
    }
    for i in 1..half {
        let mirror = new_len - i;
        if mirror >= half {
            full[mirror] = full[i].conj();
        }
    }

    planner.plan_fft_inverse(new_len).process(&mut full);
    let norm = 1.0 / new_len as f64;
    full.iter().map(|c| c.re * norm).collect()
}

/// Map every non-zero run of a trigger channel onto a grid `ratio` times
/// as dense.  A run keeps at least one sample on the new grid.
pub fn resample_stim(x: &[f64], ratio: f64, final_len: usize) -> Vec<f64> {
    let mut out = vec![0.0; final_len];
    if final_len == 0 {
        return out;
    }
    // End of the last written run; adjacent codes never share a sample.
    let mut filled = 0;
    let mut i = 0;
    while i < x.len() {
        let value = x[i];
        let start = i;
        while i < x.len() && x[i] == value {
            i += 1;
        }
        if value == 0.0 {
            continue;
        }
        let new_start = ((start as f64 * ratio).round() as usize).max(filled);
        if new_start >= final_len {
            log::debug!("stim code {value} at sample {start} has no free slot after resampling");
            continue;
        }
        let new_end = ((i as f64 * ratio).round() as usize).clamp(new_start + 1, final_len);
        out[new_start..new_end].fill(value);
        filled = new_end;
    }
    out
}

/// Output length: `round(n * ratio)`.
pub fn final_length(n: usize, ratio: f64) -> usize {
    (n as f64 * ratio).round() as usize
}
