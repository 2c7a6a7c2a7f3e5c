//! In-memory continuous recording.
//!
//! [`Raw`] owns a `[C, T]` sample buffer in volts together with the channel
//! metadata every later stage relies on.  Cleaning steps take a `Raw` by
//! value and hand the mutated instance back, so a recording never has two
//! live owners.
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Broad channel category.  Only [`ChannelKind::Eeg`] channels are
/// referenced, filtered, decomposed and epoched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Eeg,
    Stim,
    Misc,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eeg => "eeg",
            Self::Stim => "stim",
            Self::Misc => "misc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eeg" => Some(Self::Eeg),
            "stim" | "trig" | "status" => Some(Self::Stim),
            "misc" | "exg" | "eog" | "emg" => Some(Self::Misc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Raw {
    /// `[C, T]` samples.  EEG channels are in volts; stim channels hold
    /// integer trigger codes stored as `f64`.
    pub data: Array2<f64>,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub ch_kinds: Vec<ChannelKind>,
    /// Head-frame positions in metres, filled by [`crate::montage`].
    pub positions: Vec<Option<[f64; 3]>>,
    pub subject: String,
}

impl Raw {
    pub fn new(
        data: Array2<f64>,
        sfreq: f64,
        ch_names: Vec<String>,
        ch_kinds: Vec<ChannelKind>,
    ) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(PipelineError::invalid(format!("sampling rate must be positive, got {sfreq}")));
        }
        let n_ch = data.nrows();
        if ch_names.len() != n_ch || ch_kinds.len() != n_ch {
            return Err(PipelineError::invalid(format!(
                "{n_ch} data rows but {} names and {} kinds",
                ch_names.len(),
                ch_kinds.len()
            )));
        }
        Ok(Self {
            data,
            sfreq,
            ch_names,
            ch_kinds,
            positions: vec![None; n_ch],
            subject: String::new(),
        })
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    /// Sample times in seconds from the first sample.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |i| i as f64 / self.sfreq)
    }

    /// Exact-name lookup.
    pub fn ch_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Case-insensitive lookup.
    pub fn find_channel(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn picks(&self, kind: ChannelKind) -> Vec<usize> {
        self.ch_kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == kind)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn eeg_picks(&self) -> Vec<usize> {
        self.picks(ChannelKind::Eeg)
    }

    /// First stim channel, if any.
    pub fn stim_channel(&self) -> Option<usize> {
        self.ch_kinds.iter().position(|k| *k == ChannelKind::Stim)
    }

    pub fn eeg_names(&self) -> Vec<String> {
        self.eeg_picks().into_iter().map(|i| self.ch_names[i].clone()).collect()
    }

    /// `[n_eeg, T]` copy of the EEG rows.
    pub fn eeg_data(&self) -> Array2<f64> {
        self.data.select(Axis(0), &self.eeg_picks())
    }

    /// Positions of the EEG channels; `None` if any is missing.
    pub fn eeg_positions(&self) -> Option<Vec<[f64; 3]>> {
        self.eeg_picks().into_iter().map(|i| self.positions[i]).collect()
    }

    /// Remove channels by exact name.
    ///
    /// Every name is checked before anything is removed; the first absent
    /// one is reported as [`PipelineError::ChannelNotFound`].
    pub fn drop_channels(mut self, names: &[&str]) -> Result<Self> {
        let mut drop = Vec::with_capacity(names.len());
        for name in names {
            match self.ch_index(name) {
                Some(i) => drop.push(i),
                None => return Err(PipelineError::ChannelNotFound((*name).to_string())),
            }
        }
        let keep: Vec<usize> = (0..self.n_channels()).filter(|i| !drop.contains(i)).collect();
        self.data = self.data.select(Axis(0), &keep);
        self.ch_names = keep.iter().map(|&i| self.ch_names[i].clone()).collect();
        self.ch_kinds = keep.iter().map(|&i| self.ch_kinds[i]).collect();
        self.positions = keep.iter().map(|&i| self.positions[i]).collect();
        Ok(self)
    }
}
