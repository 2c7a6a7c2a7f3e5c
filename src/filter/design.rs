//! Linear-phase FIR design (Hamming-windowed sinc, `firwin` style).
//!
//! Automatic parameters:
//!   • high-pass transition  = min(max(0.25 · l_freq, 2), l_freq)
//!   • low-pass transition   = min(max(0.25 · h_freq, 2), nyquist − h_freq)
//!   • filter length N       = ceil(3.3 / min(transitions) · sfreq), rounded to odd
//!   • each cutoff sits in the middle of its transition band
use std::f64::consts::PI;

use crate::error::{PipelineError, Result};

/// Transition bandwidth below a high-pass edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth above a low-pass edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_h_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of taps for a given transition bandwidth, always odd.
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Zero-phase high-pass FIR at `l_freq`.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Vec<f64> {
    let trans_bw = auto_trans_bandwidth(l_freq);
    let n = auto_filter_length(trans_bw, sfreq);
    let cutoff_hz = l_freq - trans_bw / 2.0;
    firwin(n, cutoff_hz, sfreq, false)
}

/// Zero-phase low-pass FIR at `h_freq`.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Vec<f64> {
    let trans_bw = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(trans_bw, sfreq);
    let cutoff_hz = h_freq + trans_bw / 2.0;
    firwin(n, cutoff_hz, sfreq, true)
}

/// Zero-phase band-pass FIR passing `l_freq ..= h_freq`.
///
/// Built as the difference of two low-passes sharing the length demanded by
/// the narrower transition, then scaled to unit gain at the band centre.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let l_trans = auto_trans_bandwidth(l_freq);
    let h_trans = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);
    let lo_cut = l_freq - l_trans / 2.0;
    let hi_cut = h_freq + h_trans / 2.0;

    let upper = windowed_sinc(n, hi_cut, sfreq);
    let lower = windowed_sinc(n, lo_cut, sfreq);
    let mut h: Vec<f64> = upper.iter().zip(&lower).map(|(u, l)| u - l).collect();

    let centre = 0.5 * (lo_cut + hi_cut);
    let gain = frequency_response(&h, centre, sfreq);
    if gain > 0.0 {
        h.iter_mut().for_each(|v| *v /= gain);
    }
    h
}

/// Pick the design matching which edges are present.
pub fn create_filter(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    for (name, f) in [("l_freq", l_freq), ("h_freq", h_freq)] {
        if let Some(f) = f {
            if !(f.is_finite() && f > 0.0 && f < nyq) {
                return Err(PipelineError::invalid(format!(
                    "{name} = {f} Hz must lie in (0, {nyq}) Hz"
                )));
            }
        }
    }
    match (l_freq, h_freq) {
        (Some(l), Some(h)) if l >= h => Err(PipelineError::invalid(format!(
            "l_freq ({l} Hz) must be below h_freq ({h} Hz)"
        ))),
        (Some(l), Some(h)) => Ok(design_bandpass(l, h, sfreq)),
        (Some(l), None) => Ok(design_highpass(l, sfreq)),
        (None, Some(h)) => Ok(design_lowpass(h, sfreq)),
        (None, None) => Err(PipelineError::invalid("at least one of l_freq / h_freq is required")),
    }
}

/// Hamming-windowed sinc, normalised to unit DC gain.
///
/// `pass_zero = false` turns the low-pass into a high-pass by spectral
/// inversion.  `cutoff_hz` is the −6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    let mut h = windowed_sinc(n, cutoff_hz, sfreq);
    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }
    h
}

fn windowed_sinc(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // sin(π·fc·x) / (π·x) → fc as x → 0
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the frequency response of `h` at `freq` Hz.
pub fn frequency_response(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        let ph = w * k as f64;
        (re + c * ph.cos(), im - c * ph.sin())
    });
    (re * re + im * im).sqrt()
}
