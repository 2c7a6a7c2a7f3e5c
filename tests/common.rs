/// Shared synthetic-recording builders for the integration tests.
use std::path::Path;

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use eegsym::{BidsPath, ChannelKind, Raw};

pub const BIOSEMI64: [&str; 64] = [
    "Fp1", "AF7", "AF3", "F1", "F3", "F5", "F7", "FT7", "FC5", "FC3", "FC1", "C1", "C3", "C5", "T7",
    "TP7", "CP5", "CP3", "CP1", "P1", "P3", "P5", "P7", "P9", "PO7", "PO3", "O1", "Iz", "Oz", "POz",
    "Pz", "CPz", "Fpz", "Fp2", "AF8", "AF4", "AFz", "Fz", "F2", "F4", "F6", "F8", "FT8", "FC6",
    "FC4", "FC2", "FCz", "Cz", "C2", "C4", "C6", "T8", "TP8", "CP6", "CP4", "CP2", "P2", "P4", "P6",
    "P8", "P10", "PO8", "PO4", "O2",
];

#[allow(unused)]
pub const TASK: &str = "sym";

/// Regular/random markers every 3.5 s from 2 s, alternating codes 1 and 3.
#[allow(unused)]
pub fn alternating_events(seconds: f64) -> Vec<(f64, i32)> {
    let mut out = Vec::new();
    let mut t = 2.0;
    let mut code = 1;
    while t + 3.0 < seconds {
        out.push((t, code));
        code = if code == 1 { 3 } else { 1 };
        t += 3.5;
    }
    out
}

/// BioSemi-64 cap plus `EXG1`..`EXG8` and a `Status` trigger channel.
///
/// The EEG is a random mixture of an alpha rhythm, a theta rhythm and a
/// frontal blink source, plus per-channel noise and a posterior response
/// after each marker; amplitudes are in volts.
#[allow(unused)]
pub fn synthetic_raw(sfreq: f64, seconds: f64, events: &[(f64, i32)], seed: u64) -> Raw {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_t = (seconds * sfreq).round() as usize;
    let n_eeg = BIOSEMI64.len();
    let n_ch = n_eeg + 8 + 1;
    let tau = std::f64::consts::TAU;

    let alpha: Vec<f64> = (0..n_t)
        .map(|t| {
            let s = t as f64 / sfreq;
            (tau * 10.0 * s).sin() * (1.0 + 0.5 * (tau * 0.1 * s).sin())
        })
        .collect();
    let theta: Vec<f64> = (0..n_t).map(|t| (tau * 6.0 * t as f64 / sfreq + 0.3).sin()).collect();
    let blink: Vec<f64> = (0..n_t)
        .map(|t| {
            let s = t as f64 / sfreq;
            let phase = (s % 4.3) - 1.0;
            (-(phase * phase) / (2.0 * 0.05 * 0.05)).exp() * 8.0
        })
        .collect();
    let mut evoked = vec![0.0; n_t];
    for &(onset, code) in events {
        let gain = if code == 1 { 1.0 } else { 0.6 };
        for (t, v) in evoked.iter_mut().enumerate() {
            let d = t as f64 / sfreq - onset - 0.3;
            *v += gain * (-(d * d) / (2.0 * 0.08 * 0.08)).exp();
        }
    }

    let mut data = Array2::<f64>::zeros((n_ch, n_t));
    for (c, name) in BIOSEMI64.iter().enumerate() {
        let w_alpha: f64 = rng.random_range(-1.0..1.0);
        let w_theta: f64 = rng.random_range(-1.0..1.0);
        let w_blink = if name.starts_with("Fp") || name.starts_with("AF") { 1.0 } else { 0.05 };
        let w_erp = if name.starts_with("PO") || name.starts_with('O') { 1.0 } else { 0.1 };
        for t in 0..n_t {
            let noise: f64 = rng.random_range(-1.0..1.0);
            data[[c, t]] = 1e-5 * (w_alpha * alpha[t] + w_theta * theta[t] + w_blink * blink[t])
                + 5e-6 * w_erp * evoked[t]
                + 2e-6 * noise;
        }
    }
    for c in n_eeg..n_eeg + 8 {
        for t in 0..n_t {
            data[[c, t]] = 1e-5 * rng.random_range(-1.0..1.0);
        }
    }
    let stim = n_ch - 1;
    for &(onset, code) in events {
        let s = (onset * sfreq).round() as usize;
        for t in s..(s + 3).min(n_t) {
            data[[stim, t]] = code as f64;
        }
    }

    let mut names: Vec<String> = BIOSEMI64.iter().map(|s| s.to_string()).collect();
    names.extend((1..=8).map(|i| format!("EXG{i}")));
    names.push("Status".into());
    let mut kinds = vec![ChannelKind::Eeg; n_eeg];
    kinds.extend([ChannelKind::Misc; 8]);
    kinds.push(ChannelKind::Stim);
    Raw::new(data, sfreq, names, kinds).unwrap()
}

/// Write `raw` into a BIDS layout under `root` and return its path.
#[allow(unused)]
pub fn write_bids(root: &Path, subject: &str, raw: &Raw, extension: &str) -> BidsPath {
    let bids = BidsPath::new(root, subject, TASK).with_extension(extension);
    std::fs::create_dir_all(bids.directory()).unwrap();
    match bids.extension.as_str() {
        ".bdf" => eegsym::bdf::write_bdf(raw, &bids.fpath()).unwrap(),
        _ => eegsym::io::write_raw(raw, &bids.fpath()).unwrap(),
    }
    bids
}
