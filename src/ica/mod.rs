//! Independent component analysis for artifact removal.
//!
//! Fitting, on the EEG channels of a recording:
//!   1. Centre every channel and divide by the global EEG standard deviation
//!      (pre-whitening, so the decomposition sees unit-scale data).
//!   2. Estimate the numerical rank from the channel covariance; the number
//!      of components is capped at it (an average-referenced montage loses
//!      one dimension).
//!   3. FastICA with the log-cosh contrast and a fixed seed (`linfa-ica`).
//!   4. Mixing matrix by least squares against the sources:
//!      `A = Xᵀ S (Sᵀ S)⁻¹`, `X ≈ S Aᵀ`.
//!
//! Removing components subtracts their back-projection `S_k A_kᵀ` from the
//! data; every other part of the signal, including anything outside the
//! fitted subspace, is left as it was.
mod detect;

use std::collections::BTreeSet;

use linfa::prelude::*;
use linfa_ica::fast_ica::{FastIca, GFunc};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::raw::Raw;

pub use detect::{find_outliers, Detection, EOG_BAND, MUSCLE_BAND};

/// Decomposition parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IcaConfig {
    /// Requested number of components.
    ///
    /// Default: `40`.
    pub n_components: usize,

    /// Seed of the FastICA initial unmixing matrix.
    ///
    /// Default: `2`.
    pub random_state: usize,

    /// Default: `200`.
    pub max_iter: usize,

    /// Default: `1e-4`.
    pub tol: f64,

    /// |z| above which an EOG correlation marks a component.
    ///
    /// Default: `3.0`.
    pub eog_threshold: f64,

    /// Product of the three muscle sub-scores above which a component is
    /// marked.
    ///
    /// Default: `0.125`.
    pub muscle_threshold: f64,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            n_components: 40,
            random_state: 2,
            max_iter: 200,
            tol: 1e-4,
            eog_threshold: 3.0,
            muscle_threshold: 0.125,
        }
    }
}

/// A decomposition fitted on one recording.
pub struct Ica {
    model: FastIca<f64>,
    /// EEG channel names the model was fitted on, in order.
    pub ch_names: Vec<String>,
    /// Positions of those channels, for topographies.
    pub positions: Vec<Option<[f64; 3]>>,
    /// Per-channel mean removed before fitting.
    pub mean: Array1<f64>,
    /// Global scale the centred data was divided by.
    pub pre_whitener: f64,
    /// `[C, K]` mixing matrix in pre-whitened units.
    pub mixing: Array2<f64>,
    pub n_components: usize,
    /// Components [`Ica::apply`] will remove.
    pub exclude: BTreeSet<usize>,
    pub sfreq: f64,
}

impl Ica {
    /// Fit on the EEG channels of `raw`.
    pub fn fit(raw: &Raw, cfg: &IcaConfig) -> Result<Self> {
        if cfg.n_components == 0 {
            return Err(PipelineError::invalid("ica.n_components must be at least 1"));
        }
        let picks = raw.eeg_picks();
        if picks.len() < 2 {
            return Err(PipelineError::invalid(format!(
                "ICA needs at least two EEG channels, got {}",
                picks.len()
            )));
        }
        // linfa works on [samples, features]
        let x = raw.data.select(Axis(0), &picks).reversed_axes();
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::invalid("ICA on an empty recording"))?;
        let centred = &x - &mean;
        let std = centred.std(0.0);
        if !(std.is_finite() && std > 0.0) {
            return Err(PipelineError::Ica(format!("EEG data has no variance (std = {std})")));
        }
        let scaled = centred / std;

        let rank = numerical_rank(&scaled);
        let n_components = cfg.n_components.min(rank);
        if n_components < cfg.n_components {
            log::warn!(
                "requested {} components but the EEG data has rank {rank}; fitting {n_components}",
                cfg.n_components
            );
        }
        log::debug!(
            "fitting ICA: {} channels × {} samples, {n_components} components, seed {}",
            picks.len(),
            scaled.nrows(),
            cfg.random_state
        );

        let dataset = DatasetBase::from(scaled.clone());
        let model = FastIca::params()
            .ncomponents(n_components)
            .gfunc(GFunc::Logcosh(1.0))
            .max_iter(cfg.max_iter)
            .tol(cfg.tol)
            .random_state(cfg.random_state)
            .fit(&dataset)
            .map_err(|e| PipelineError::Ica(format!("FastICA failed: {e}")))?;

        let sources = model.predict(&scaled);
        let mixing = least_squares_mixing(&scaled, &sources)?;

        Ok(Self {
            model,
            ch_names: picks.iter().map(|&i| raw.ch_names[i].clone()).collect(),
            positions: picks.iter().map(|&i| raw.positions[i]).collect(),
            mean,
            pre_whitener: std,
            mixing,
            n_components,
            exclude: BTreeSet::new(),
            sfreq: raw.sfreq,
        })
    }

    /// EEG rows of `raw`, checked against the fitted channel list.
    fn eeg_rows(&self, raw: &Raw) -> Result<Vec<usize>> {
        let picks = raw.eeg_picks();
        let same = picks.len() == self.ch_names.len()
            && picks.iter().zip(&self.ch_names).all(|(&i, n)| raw.ch_names[i] == *n);
        if !same {
            return Err(PipelineError::invalid(
                "recording does not have the EEG channels the ICA was fitted on",
            ));
        }
        Ok(picks)
    }

    /// `[K, T]` component time courses of `raw`.
    pub fn sources(&self, raw: &Raw) -> Result<Array2<f64>> {
        let picks = self.eeg_rows(raw)?;
        let x = raw.data.select(Axis(0), &picks).reversed_axes();
        let scaled = (&x - &self.mean) / self.pre_whitener;
        Ok(self.model.predict(&scaled).reversed_axes())
    }

    /// Mixing column of component `k`, for topographies.
    pub fn topography(&self, k: usize) -> Array1<f64> {
        self.mixing.column(k).to_owned()
    }

    /// Remove every component in [`Ica::exclude`] from `raw`.
    pub fn apply(&self, mut raw: Raw) -> Result<Raw> {
        let picks = self.eeg_rows(&raw)?;
        if self.exclude.is_empty() {
            log::debug!("no ICA components excluded");
            return Ok(raw);
        }
        if let Some(&k) = self.exclude.iter().find(|&&k| k >= self.n_components) {
            return Err(PipelineError::invalid(format!(
                "component {k} does not exist ({} fitted)",
                self.n_components
            )));
        }
        let excl: Vec<usize> = self.exclude.iter().copied().collect();
        let sources = self.sources(&raw)?; // [K, T]
        let s_ex = sources.select(Axis(0), &excl); // [k, T]
        let a_ex = self.mixing.select(Axis(1), &excl); // [C, k]
        let artefact = a_ex.dot(&s_ex) * self.pre_whitener; // [C, T]
        for (row, &ch) in picks.iter().enumerate() {
            let mut dst = raw.data.row_mut(ch);
            dst -= &artefact.row(row);
        }
        log::debug!("removed ICA components {excl:?}");
        Ok(raw)
    }
}

/// Eigenvalues of the covariance above `max · 1e-10` count towards the rank.
fn numerical_rank(x: &Array2<f64>) -> usize {
    let n = x.nrows().max(1) as f64;
    let cov = x.t().dot(x) / n;
    let c = cov.nrows();
    let m = DMatrix::from_row_slice(c, c, &cov.iter().copied().collect::<Vec<_>>());
    let eig = SymmetricEigen::new(m).eigenvalues;
    let max = eig.iter().fold(0.0_f64, |a, &v| a.max(v));
    eig.iter().filter(|&&v| v > max * 1e-10).count()
}

/// `A = Xᵀ S (Sᵀ S)⁻¹` for `X`: [T, C], `S`: [T, K].
fn least_squares_mixing(x: &Array2<f64>, s: &Array2<f64>) -> Result<Array2<f64>> {
    let sts = s.t().dot(s);
    let k = sts.nrows();
    let inv = DMatrix::from_row_slice(k, k, &sts.iter().copied().collect::<Vec<_>>())
        .try_inverse()
        .ok_or_else(|| PipelineError::Ica("source covariance is singular".into()))?;
    let inv = Array2::from_shape_fn((k, k), |(i, j)| inv[(i, j)]);
    Ok(x.t().dot(s).dot(&inv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::ChannelKind;
    use std::f64::consts::TAU;

    /// Three non-Gaussian sources mixed into six channels.
    fn mixed_raw() -> Raw {
        let sfreq = 128.0;
        let n = 4096;
        let src = Array2::from_shape_fn((3, n), |(k, t)| {
            let tt = t as f64 / sfreq;
            match k {
                0 => (TAU * 3.0 * tt).sin(),
                1 => if (TAU * 0.7 * tt).sin() > 0.0 { 1.0 } else { -1.0 },
                _ => ((tt * 5.3) % 1.0) * 2.0 - 1.0,
            }
        });
        let a = Array2::from_shape_fn((6, 3), |(c, k)| ((c * 3 + k * 7) % 5) as f64 * 0.3 + 0.1 * k as f64 + 0.2);
        let data = a.dot(&src) * 1e-5;
        Raw::new(
            data,
            sfreq,
            (0..6).map(|i| format!("E{i}")).collect(),
            vec![ChannelKind::Eeg; 6],
        )
        .unwrap()
    }

    #[test]
    fn rank_caps_components() {
        let raw = mixed_raw();
        let ica = Ica::fit(&raw, &IcaConfig { n_components: 40, ..Default::default() }).unwrap();
        assert_eq!(ica.n_components, 3);
        assert_eq!(ica.mixing.dim(), (6, 3));
    }

    #[test]
    fn excluding_nothing_is_identity() {
        let raw = mixed_raw();
        let ica = Ica::fit(&raw, &IcaConfig::default()).unwrap();
        let out = ica.apply(raw.clone()).unwrap();
        assert_eq!(out.data, raw.data);
    }

    #[test]
    fn excluding_everything_leaves_channel_means() {
        let raw = mixed_raw();
        let mut ica = Ica::fit(&raw, &IcaConfig::default()).unwrap();
        ica.exclude = (0..ica.n_components).collect();
        let out = ica.apply(raw.clone()).unwrap();
        for (c, row) in out.data.outer_iter().enumerate() {
            for &v in row.iter() {
                approx::assert_abs_diff_eq!(v, ica.mean[c], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let raw = mixed_raw();
        let a = Ica::fit(&raw, &IcaConfig::default()).unwrap();
        let b = Ica::fit(&raw, &IcaConfig::default()).unwrap();
        assert_eq!(a.mixing, b.mixing);
    }

    #[test]
    fn apply_rejects_other_montage() {
        let raw = mixed_raw();
        let ica = Ica::fit(&raw, &IcaConfig::default()).unwrap();
        let other = raw.drop_channels(&["E5"]).unwrap();
        assert!(ica.apply(other).is_err());
    }
}
