//! Multitaper time-frequency power.
//!
//! For every frequency `f` with `n_cycles` cycles:
//!
//! ```text
//! t_win   = n_cycles / f                       wavelet duration
//! t       = 0, 1/sfreq, … < t_win
//! W_k(t)  = exp(2πi f (t − t_win/2)) · dpss_k(t)      k < floor(tb − 1)
//! W_k    -= mean(W_k)                          (zero_mean)
//! W_k    /= sqrt(0.5) · ‖W_k‖
//! P(f, t) = mean_k |x ∗ W_k|²                  "same"-length convolution
//! ```
//!
//! Tapers whose concentration falls below 0.9 are skipped.  Power is then
//! averaged over epochs.
use std::collections::{BTreeMap, HashMap};

use ndarray::{s, Array1, Array2, Array3, Axis};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Deserialize;

use crate::baseline::{baseline_indices, rescale_inplace, BaselineMode};
use crate::dpss::{dpss_windows, Dpss};
use crate::epochs::Epochs;
use crate::error::{PipelineError, Result};
use crate::events::Condition;

/// Frequency axis and taper parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TfrConfig {
    /// Default: `5.0` Hz.
    pub fmin: f64,
    /// Default: `20.0` Hz.
    pub fmax: f64,
    /// Number of log-spaced frequencies.
    ///
    /// Default: `30`.
    pub n_freqs: usize,
    /// `n_cycles = f / cycles_divisor`.
    ///
    /// Default: `2.0`, i.e. a constant 0.5 s window.
    pub cycles_divisor: f64,
    /// Time-bandwidth product of the tapers.
    ///
    /// Default: `4.0` (three tapers).
    pub time_bandwidth: f64,
    /// Default: `true`.
    pub zero_mean: bool,
}

impl Default for TfrConfig {
    fn default() -> Self {
        Self {
            fmin: 5.0,
            fmax: 20.0,
            n_freqs: 30,
            cycles_divisor: 2.0,
            time_bandwidth: 4.0,
            zero_mean: true,
        }
    }
}

impl TfrConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fmin > 0.0 && self.fmax > self.fmin) {
            return Err(PipelineError::invalid(format!(
                "tfr frequency range ({}, {}) must be positive and increasing",
                self.fmin, self.fmax
            )));
        }
        if self.n_freqs == 0 {
            return Err(PipelineError::invalid("tfr.n_freqs must be at least 1"));
        }
        if !(self.cycles_divisor > 0.0) {
            return Err(PipelineError::invalid("tfr.cycles_divisor must be positive"));
        }
        if self.time_bandwidth < 2.0 {
            return Err(PipelineError::invalid(format!(
                "time_bandwidth must be at least 2 for one taper, got {}",
                self.time_bandwidth
            )));
        }
        Ok(())
    }

    /// `logspace(log10(fmin), log10(fmax), n_freqs)`
    pub fn freqs(&self) -> Vec<f64> {
        logspace(self.fmin, self.fmax, self.n_freqs)
    }

    pub fn n_cycles(&self, freqs: &[f64]) -> Vec<f64> {
        freqs.iter().map(|f| f / self.cycles_divisor).collect()
    }
}

pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let (a, b) = (start.log10(), stop.log10());
    match n {
        0 => vec![],
        1 => vec![start],
        _ => (0..n)
            .map(|i| 10f64.powf(a + (b - a) * i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// Epoch-averaged power.
#[derive(Debug, Clone)]
pub struct AverageTfr {
    /// `[C, F, T]`
    pub data: Array3<f64>,
    pub freqs: Vec<f64>,
    pub tmin: f64,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub positions: Vec<Option<[f64; 3]>>,
    pub nave: usize,
    pub condition: Option<Condition>,
    pub subject: String,
    /// Set once [`AverageTfr::apply_baseline`] has run.
    pub baseline: Option<(BaselineMode, (f64, f64))>,
}

impl AverageTfr {
    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |i| self.tmin + i as f64 / self.sfreq)
    }

    pub fn ch_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Rescale every channel/frequency row against `window`.
    pub fn apply_baseline(&mut self, mode: BaselineMode, window: (f64, f64)) -> Result<()> {
        if self.baseline.is_some() {
            return Err(PipelineError::invalid("baseline already applied to this TFR"));
        }
        let times = self.times().to_vec();
        let (imin, imax) = baseline_indices(&times, window)?;
        for lane in self.data.lanes_mut(Axis(2)) {
            rescale_inplace(lane, imin, imax, mode);
        }
        self.baseline = Some((mode, window));
        Ok(())
    }

    /// Baseline-corrected copy.
    pub fn with_baseline(&self, mode: BaselineMode, window: (f64, f64)) -> Result<Self> {
        let mut out = self.clone();
        out.apply_baseline(mode, window)?;
        Ok(out)
    }

    /// `[F, T]` mean over the named channels.
    pub fn combine_mean(&self, names: &[&str]) -> Result<Array2<f64>> {
        let picks = names
            .iter()
            .map(|n| self.ch_index(n).ok_or_else(|| PipelineError::ChannelNotFound((*n).to_string())))
            .collect::<Result<Vec<_>>>()?;
        self.data
            .select(Axis(0), &picks)
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::invalid("no channels to combine"))
    }

    /// Per-channel value at the grid point nearest `(t, f)`.
    pub fn snapshot(&self, t: f64, f: f64) -> Result<Array1<f64>> {
        let ti = ((t - self.tmin) * self.sfreq).round();
        if ti < 0.0 || ti as usize >= self.n_times() {
            return Err(PipelineError::invalid(format!("time {t} s is outside the TFR")));
        }
        let fi = self
            .freqs
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - f).abs().total_cmp(&(b.1 - f).abs()))
            .map(|(i, _)| i)
            .ok_or_else(|| PipelineError::invalid("TFR has no frequencies"))?;
        Ok(self.data.slice(s![.., fi, ti as usize]).to_owned())
    }
}

/// `[F][K]` complex wavelets.
fn multitaper_wavelets(
    sfreq: f64,
    freqs: &[f64],
    n_cycles: &[f64],
    time_bandwidth: f64,
    zero_mean: bool,
) -> Result<Vec<Vec<Vec<Complex<f64>>>>> {
    let n_taps = (time_bandwidth - 1.0).floor() as usize;
    let mut tapers: HashMap<usize, Dpss> = HashMap::new();
    let mut out = Vec::with_capacity(freqs.len());
    for (&f, &nc) in freqs.iter().zip(n_cycles) {
        let t_win = nc / f;
        let n = ((t_win * sfreq) - 1e-9).ceil().max(1.0) as usize;
        if !tapers.contains_key(&n) {
            tapers.insert(n, dpss_windows(n, time_bandwidth / 2.0, n_taps, false)?);
        }
        let dpss = &tapers[&n];
        let mut per_taper = Vec::with_capacity(n_taps);
        for (taper, &conc) in dpss.tapers.outer_iter().zip(&dpss.concentrations) {
            if conc <= 0.9 {
                continue;
            }
            let mut w: Vec<Complex<f64>> = taper
                .iter()
                .enumerate()
                .map(|(i, &tap)| {
                    let t = i as f64 / sfreq - t_win / 2.0;
                    Complex::from_polar(1.0, std::f64::consts::TAU * f * t) * tap
                })
                .collect();
            if zero_mean {
                let mean = w.iter().sum::<Complex<f64>>() / n as f64;
                w.iter_mut().for_each(|v| *v -= mean);
            }
            let norm = w.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt() * 0.5f64.sqrt();
            w.iter_mut().for_each(|v| *v /= norm);
            per_taper.push(w);
        }
        if per_taper.is_empty() {
            return Err(PipelineError::invalid(format!("no well-concentrated taper at {f} Hz")));
        }
        out.push(per_taper);
    }
    Ok(out)
}

/// Multitaper power of `epochs`, averaged over epochs.
pub fn tfr_multitaper(
    epochs: &Epochs,
    freqs: &[f64],
    n_cycles: &[f64],
    time_bandwidth: f64,
    zero_mean: bool,
) -> Result<AverageTfr> {
    if freqs.len() != n_cycles.len() {
        return Err(PipelineError::invalid("freqs and n_cycles differ in length"));
    }
    if epochs.is_empty() {
        return Err(PipelineError::NoEventsFound("TFR of an empty epoch collection".into()));
    }
    let wavelets = multitaper_wavelets(epochs.sfreq, freqs, n_cycles, time_bandwidth, zero_mean)?;
    let n_t = epochs.n_times();
    let max_len = wavelets.iter().flatten().map(Vec::len).max().unwrap_or(1);
    if max_len > n_t {
        return Err(PipelineError::invalid(format!(
            "wavelet of {max_len} samples is longer than the {n_t}-sample epochs"
        )));
    }
    let nfft = (n_t + max_len - 1).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fwd = planner.plan_fft_forward(nfft);
    let inv = planner.plan_fft_inverse(nfft);

    let spectra: Vec<Vec<(usize, Vec<Complex<f64>>)>> = wavelets
        .iter()
        .map(|per_taper| {
            per_taper
                .iter()
                .map(|w| {
                    let mut buf = vec![Complex::default(); nfft];
                    buf[..w.len()].copy_from_slice(w);
                    fwd.process(&mut buf);
                    (w.len(), buf)
                })
                .collect()
        })
        .collect();

    let (n_ep, n_ch) = (epochs.len(), epochs.n_channels());
    let mut power = Array3::<f64>::zeros((n_ch, freqs.len(), n_t));
    let mut x_fft = vec![Complex::<f64>::default(); nfft];
    let mut prod = vec![Complex::<f64>::default(); nfft];
    for e in 0..n_ep {
        for c in 0..n_ch {
            x_fft.fill(Complex::default());
            for (dst, &v) in x_fft.iter_mut().zip(epochs.data.slice(s![e, c, ..])) {
                dst.re = v;
            }
            fwd.process(&mut x_fft);
            for (fi, per_taper) in spectra.iter().enumerate() {
                let scale = 1.0 / (per_taper.len() as f64 * n_ep as f64);
                for (w_len, w_fft) in per_taper {
                    for ((p, a), b) in prod.iter_mut().zip(&x_fft).zip(w_fft) {
                        *p = a * b;
                    }
                    inv.process(&mut prod);
                    let start = (w_len - 1) / 2;
                    let mut row = power.slice_mut(s![c, fi, ..]);
                    for (t, acc) in row.iter_mut().enumerate() {
                        let v = prod[start + t] / nfft as f64;
                        *acc += v.norm_sqr() * scale;
                    }
                }
            }
        }
    }

    let condition = match epochs.events.first() {
        Some(&(_, first)) if epochs.events.iter().all(|&(_, c)| c == first) => Some(first),
        _ => None,
    };
    Ok(AverageTfr {
        data: power,
        freqs: freqs.to_vec(),
        tmin: epochs.tmin,
        sfreq: epochs.sfreq,
        ch_names: epochs.ch_names.clone(),
        positions: epochs.positions.clone(),
        nave: n_ep,
        condition,
        subject: epochs.subject.clone(),
        baseline: None,
    })
}

/// Power for each condition, computed independently.
pub fn perform_tfr(epochs: &Epochs, cfg: &TfrConfig) -> Result<BTreeMap<Condition, AverageTfr>> {
    cfg.validate()?;
    let freqs = cfg.freqs();
    let n_cycles = cfg.n_cycles(&freqs);
    Condition::ALL
        .iter()
        .map(|&cond| {
            let subset = epochs.select(cond)?;
            log::debug!("TFR for {cond}: {} epochs, {} frequencies", subset.len(), freqs.len());
            let power = tfr_multitaper(&subset, &freqs, &n_cycles, cfg.time_bandwidth, cfg.zero_mean)?;
            Ok((cond, power))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{ChannelKind, Raw};
    use ndarray::Array2;
    use std::f64::consts::TAU;

    fn sine_epochs(freq: f64) -> Epochs {
        let sfreq = 128.0;
        let n = 20 * 128;
        let mut data = Array2::from_shape_fn((2, n), |(_, t)| 1e-6 * (TAU * freq * t as f64 / sfreq).sin());
        for onset in [640usize, 1280, 1920] {
            data.slice_mut(s![1, onset..onset + 2]).fill(1.0);
        }
        let raw = Raw::new(
            data,
            sfreq,
            vec!["Oz".into(), "Status".into()],
            vec![ChannelKind::Eeg, ChannelKind::Stim],
        )
        .unwrap();
        Epochs::from_raw(&raw, -0.5, 1.5, (-0.2, 0.05)).unwrap()
    }

    #[test]
    fn default_axis() {
        let cfg = TfrConfig::default();
        let f = cfg.freqs();
        assert_eq!(f.len(), 30);
        approx::assert_abs_diff_eq!(f[0], 5.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(f[29], 20.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(cfg.n_cycles(&f)[29], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn power_peaks_at_signal_frequency() {
        let ep = sine_epochs(12.0);
        let freqs = logspace(5.0, 20.0, 30);
        let cycles: Vec<f64> = freqs.iter().map(|f| f / 2.0).collect();
        let tfr = tfr_multitaper(&ep, &freqs, &cycles, 4.0, true).unwrap();
        assert_eq!(tfr.data.dim(), (1, 30, ep.n_times()));
        let mid = ep.n_times() / 2;
        let column = tfr.data.slice(s![0, .., mid]);
        let peak = column.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map(|(i, _)| i).unwrap();
        approx::assert_abs_diff_eq!(freqs[peak], 12.0, epsilon = 1.0);
    }

    #[test]
    fn logratio_of_stationary_power_is_near_zero() {
        let ep = sine_epochs(10.0);
        let freqs = vec![10.0];
        let tfr = tfr_multitaper(&ep, &freqs, &[5.0], 4.0, true).unwrap();
        let corrected = tfr.with_baseline(BaselineMode::LogRatio, (-0.25, 0.0)).unwrap();
        let mid = ep.n_times() / 2;
        assert!(corrected.data[[0, 0, mid]].abs() < 0.05);
        assert!(tfr.baseline.is_none());
        let mut twice = corrected.clone();
        assert!(twice.apply_baseline(BaselineMode::LogRatio, (-0.25, 0.0)).is_err());
    }

    #[test]
    fn wavelet_longer_than_epoch_is_rejected() {
        let ep = sine_epochs(10.0);
        assert!(tfr_multitaper(&ep, &[2.0], &[10.0], 4.0, true).is_err());
    }
}
