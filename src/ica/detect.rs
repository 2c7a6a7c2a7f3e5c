//! Artifact scoring of ICA components.
//!
//! ## Ocular
//!
//! Sources and a frontal reference channel are band-passed to
//! [`EOG_BAND`]; each component is scored by its Pearson correlation with
//! the reference and outliers are found by iterative z-scoring.
//!
//! ## Muscle
//!
//! Three per-component features, each squashed through a logistic:
//!
//! ```text
//! slope       log-log Welch PSD slope over MUSCLE_BAND   expit((s + 0.5) / 0.25)
//! focus       |A|-weighted mean distance from centre     expit((d − 0.065) / 0.005)
//! smoothness  Σ spatial proximity × value difference     1 − expit((m − 300) / 100)
//! ```
//!
//! A component is marked when the product exceeds the configured threshold.
use ndarray::{Array1, Array2};
use rustfft::{num_complex::Complex, FftPlanner};

use super::{Ica, IcaConfig};
use crate::error::{PipelineError, Result};
use crate::filter::{apply_fir_zero_phase, create_filter, filter_1d};
use crate::montage::topomap_coords;
use crate::raw::Raw;

pub const EOG_BAND: (f64, f64) = (1.0, 10.0);
pub const MUSCLE_BAND: (f64, f64) = (7.0, 45.0);

/// Welch segment length in samples.
const WELCH_NFFT: usize = 256;

/// Marked components and the score of every component.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Marked components, strongest first.
    pub indices: Vec<usize>,
    pub scores: Vec<f64>,
}

impl Ica {
    /// Components correlating with `ch_name`.
    pub fn find_bads_eog(&self, raw: &Raw, ch_name: &str, cfg: &IcaConfig) -> Result<Detection> {
        let ch = raw
            .find_channel(ch_name)
            .ok_or_else(|| PipelineError::ReferenceChannelMissing(ch_name.to_string()))?;

        let h = create_filter(Some(EOG_BAND.0), Some(EOG_BAND.1), raw.sfreq)?;
        let mut sources = self.sources(raw)?;
        let picks: Vec<usize> = (0..sources.nrows()).collect();
        apply_fir_zero_phase(&mut sources, &h, &picks);
        let reference = filter_1d(&raw.data.row(ch).to_vec(), &h);
        let reference = Array1::from_vec(reference);

        let scores: Vec<f64> = sources.outer_iter().map(|s| pearson(&s.to_owned(), &reference)).collect();
        let mut indices = find_outliers(&scores, cfg.eog_threshold, 2);
        indices.sort_by(|&a, &b| scores[b].abs().total_cmp(&scores[a].abs()));
        log::debug!("EOG ({ch_name}) components: {indices:?}");
        Ok(Detection { indices, scores })
    }

    /// Components with a muscle-like spectrum and topography.
    pub fn find_bads_muscle(&self, raw: &Raw, cfg: &IcaConfig) -> Result<Detection> {
        let positions: Vec<[f64; 3]> = self
            .positions
            .iter()
            .map(|p| p.ok_or_else(|| PipelineError::invalid("muscle scoring needs electrode positions")))
            .collect::<Result<_>>()?;

        let sources = self.sources(raw)?;
        let slopes: Vec<f64> = sources
            .outer_iter()
            .map(|s| psd_slope(&s.to_vec(), raw.sfreq, MUSCLE_BAND))
            .collect::<Result<_>>()?;

        let mut pos: Vec<[f64; 2]> = positions.iter().map(|&p| topomap_coords(p)).collect();
        let n = pos.len() as f64;
        let cx = pos.iter().map(|p| p[0]).sum::<f64>() / n;
        let cy = pos.iter().map(|p| p[1]).sum::<f64>() / n;
        for p in &mut pos {
            p[0] -= cx;
            p[1] -= cy;
        }
        let radius: Vec<f64> = pos.iter().map(|p| p[0].hypot(p[1])).collect();
        let dists = Array2::from_shape_fn((pos.len(), pos.len()), |(i, j)| {
            (pos[i][0] - pos[j][0]).hypot(pos[i][1] - pos[j][1])
        });
        let dmax = dists.iter().fold(0.0_f64, |a, &v| a.max(v));
        let proximity = dists.mapv(|d| if dmax > 0.0 { 1.0 - d / dmax } else { 0.0 });

        let mut scores = Vec::with_capacity(self.n_components);
        for (k, slope) in slopes.iter().enumerate() {
            let comp = self.mixing.column(k);
            let peak = comp.iter().fold(0.0_f64, |a, &v| a.max(v.abs()));
            let w: Vec<f64> = comp.iter().map(|v| if peak > 0.0 { v.abs() / peak } else { 0.0 }).collect();
            let wsum: f64 = w.iter().sum();
            let focus = if wsum > 0.0 {
                w.iter().zip(&radius).map(|(a, r)| a * r).sum::<f64>() / wsum
            } else {
                0.0
            };

            let diff = Array2::from_shape_fn((comp.len(), comp.len()), |(i, j)| (comp[i] - comp[j]).abs());
            let dpeak = diff.iter().fold(0.0_f64, |a, &v| a.max(v));
            let smoothness = if dpeak > 0.0 { (&proximity * &diff).sum() / dpeak } else { 0.0 };

            scores.push(
                expit((slope + 0.5) / 0.25)
                    * expit((focus - 0.065) / 0.005)
                    * (1.0 - expit((smoothness - 300.0) / 100.0)),
            );
        }
        let mut indices: Vec<usize> = (0..scores.len()).filter(|&k| scores[k] > cfg.muscle_threshold).collect();
        indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        log::debug!("muscle components: {indices:?}");
        Ok(Detection { indices, scores })
    }
}

/// Indices whose |z-score| exceeds `threshold`, re-estimating mean and std
/// without the already-marked values for up to `max_iter` passes.
pub fn find_outliers(scores: &[f64], threshold: f64, max_iter: usize) -> Vec<usize> {
    let mut marked = vec![false; scores.len()];
    for _ in 0..max_iter {
        let rest: Vec<f64> = scores.iter().zip(&marked).filter(|(_, m)| !**m).map(|(v, _)| *v).collect();
        if rest.len() < 2 {
            break;
        }
        let n = rest.len() as f64;
        let mean = rest.iter().sum::<f64>() / n;
        let std = (rest.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt();
        if std == 0.0 {
            break;
        }
        let mut any = false;
        for (i, &v) in scores.iter().enumerate() {
            if !marked[i] && ((v - mean) / std).abs() > threshold {
                marked[i] = true;
                any = true;
            }
        }
        if !any {
            break;
        }
    }
    marked.iter().enumerate().filter(|(_, m)| **m).map(|(i, _)| i).collect()
}

fn pearson(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let (ma, mb) = (a.mean().unwrap_or(0.0), b.mean().unwrap_or(0.0));
    let da = a - ma;
    let db = b - mb;
    let denom = (da.dot(&da) * db.dot(&db)).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        da.dot(&db) / denom
    }
}

fn expit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Welch PSD: non-overlapping periodic-Hamming segments, mean of the
/// one-sided periodograms.  Returns `(freqs, psd)`.
pub(crate) fn welch_psd(x: &[f64], sfreq: f64) -> (Vec<f64>, Vec<f64>) {
    let nfft = WELCH_NFFT.min(x.len()).max(1);
    let window: Vec<f64> = (0..nfft)
        .map(|i| 0.54 - 0.46 * (std::f64::consts::TAU * i as f64 / nfft as f64).cos())
        .collect();
    let wpow: f64 = window.iter().map(|w| w * w).sum();
    let n_bins = nfft / 2 + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut psd = vec![0.0; n_bins];
    let mut n_seg = 0usize;
    let mut buf = vec![Complex::<f64>::default(); nfft];
    for seg in x.chunks_exact(nfft) {
        let mean = seg.iter().sum::<f64>() / nfft as f64;
        for (b, (&v, &w)) in buf.iter_mut().zip(seg.iter().zip(&window)) {
            *b = Complex { re: (v - mean) * w, im: 0.0 };
        }
        fft.process(&mut buf);
        for (k, p) in psd.iter_mut().enumerate() {
            let mut v = buf[k].norm_sqr() / (sfreq * wpow);
            if k != 0 && !(nfft % 2 == 0 && k == nfft / 2) {
                v *= 2.0;
            }
            *p += v;
        }
        n_seg += 1;
    }
    for p in &mut psd {
        *p /= n_seg.max(1) as f64;
    }
    let freqs = (0..n_bins).map(|k| k as f64 * sfreq / nfft as f64).collect();
    (freqs, psd)
}

/// Least-squares slope of `log10 psd` against `log10 f` inside `band`.
fn psd_slope(x: &[f64], sfreq: f64, band: (f64, f64)) -> Result<f64> {
    let (freqs, psd) = welch_psd(x, sfreq);
    let pts: Vec<(f64, f64)> = freqs
        .iter()
        .zip(&psd)
        .filter(|(f, p)| **f >= band.0 && **f <= band.1 && **p > 0.0)
        .map(|(f, p)| (f.log10(), p.log10()))
        .collect();
    if pts.len() < 2 {
        return Err(PipelineError::invalid(format!(
            "no spectral bins between {} and {} Hz at {sfreq} Hz",
            band.0, band.1
        )));
    }
    let n = pts.len() as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = pts.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let sxx: f64 = pts.iter().map(|p| (p.0 - mx) * (p.0 - mx)).sum();
    Ok(sxy / sxx)
}
