//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the single record threaded through every stage.  It
//! carries the two debug switches together with every fixed parameter of
//! the analysis; the defaults are the values the study was run with.
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::ica::IcaConfig;
use crate::tfr::TfrConfig;

/// Configuration for one subject run.
///
/// All fields are `pub`, so struct-update syntax works:
///
/// ```
/// use eegsym::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     debug_logs: true,
///     ..PipelineConfig::default()
/// };
/// assert_eq!(cfg.target_sfreq, 128.0);
/// ```
///
/// It can also be read from JSON; absent keys keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Promote messages from the numeric routines from `debug` to `info`.
    pub debug_logs: bool,

    /// Render intermediate diagnostic figures into [`Self::debug_dir`].
    ///
    /// Never changes a numeric result; rendering failures are logged and
    /// otherwise ignored.
    pub debug_images: bool,

    /// Directory for diagnostic figures.
    ///
    /// Default: `debug/`.
    pub debug_dir: PathBuf,

    /// Non-physiological channels removed right after loading.
    ///
    /// Default: `EXG1` … `EXG8` (four facial and four ocular electrodes).
    pub aux_channels: Vec<String>,

    /// High-pass edge of the band-pass filter in Hz.  `None` disables it.
    ///
    /// Default: `1.0` Hz.
    pub l_freq: Option<f64>,

    /// Low-pass edge of the band-pass filter in Hz.  `None` disables it.
    ///
    /// Default: `25.0` Hz.
    pub h_freq: Option<f64>,

    /// Sampling rate after resampling.
    ///
    /// Default: `128.0` Hz.
    pub target_sfreq: f64,

    pub ica: IcaConfig,

    /// Channel whose activity stands in for the EOG when scoring
    /// ocular components.
    ///
    /// Default: `AFz`.
    pub eog_channel: String,

    /// Baseline window for epoch correction, seconds relative to the marker.
    ///
    /// Default: `(-0.2, 0.05)`.
    pub baseline: (f64, f64),

    pub tfr: TfrConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debug_logs: false,
            debug_images: false,
            debug_dir: PathBuf::from("debug"),
            aux_channels: (1..=8).map(|i| format!("EXG{i}")).collect(),
            l_freq: Some(1.0),
            h_freq: Some(25.0),
            target_sfreq: 128.0,
            ica: IcaConfig::default(),
            eog_channel: "AFz".to_string(),
            baseline: (-0.2, 0.05),
            tfr: TfrConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::Format(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no stage could honour.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_sfreq.is_finite() && self.target_sfreq > 0.0) {
            return Err(PipelineError::invalid(format!(
                "target_sfreq must be positive, got {}",
                self.target_sfreq
            )));
        }
        if let (Some(l), Some(h)) = (self.l_freq, self.h_freq) {
            if l >= h {
                return Err(PipelineError::invalid(format!("l_freq ({l}) must be below h_freq ({h})")));
            }
        }
        if let Some(h) = self.h_freq {
            if h >= self.target_sfreq / 2.0 {
                log::warn!(
                    "h_freq {h} Hz is at or above the post-resampling Nyquist ({} Hz)",
                    self.target_sfreq / 2.0
                );
            }
        }
        if self.baseline.0 >= self.baseline.1 {
            return Err(PipelineError::invalid(format!(
                "baseline start {} must precede its end {}",
                self.baseline.0, self.baseline.1
            )));
        }
        if self.ica.n_components == 0 {
            return Err(PipelineError::invalid("ica.n_components must be at least 1"));
        }
        self.tfr.validate()
    }

    /// Level used by the numeric stages for their progress messages.
    pub fn verbosity(&self) -> log::Level {
        if self.debug_logs {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }

    pub fn aux_channel_refs(&self) -> Vec<&str> {
        self.aux_channels.iter().map(String::as_str).collect()
    }
}
