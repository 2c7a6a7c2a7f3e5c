//! # eegsym: regular/random symmetry EEG pipeline in pure Rust
//!
//! `eegsym` takes a subject's BioSemi recording from a BIDS-style dataset
//! through cleaning, ICA artifact removal, epoching and multitaper
//! time-frequency analysis, and builds the figures that compare "regular"
//! and "random" trials.  The numeric steps follow MNE-Python conventions
//! (FIR design rules, sample-exact epoch windows, DPSS tapers, log-ratio
//! baselines) on top of `ndarray`, `rustfft`, `nalgebra` and `linfa-ica`.
//!
//! ## Pipeline overview
//!
//! ```text
//! sub-XX_task-T_eeg.bdf
//!   │
//!   ├─ bids::read_raw_bids         BDF / safetensors reader, channels.tsv
//!   ├─ drop EXG1..EXG8             ChannelNotFound if one is absent
//!   ├─ montage::set_montage        standard_1020, case-insensitive
//!   ├─ reference                   average over EEG channels
//!   ├─ filter                      1–25 Hz firwin band-pass, zero phase
//!   ├─ resample                    FFT resampler → 128 Hz
//!   ├─ ica                         FastICA(40, seed 2), EOG (AFz) ∪ muscle
//!   ├─ epochs                      codes 1 / 3, baseline (-0.2, 0.05)
//!   └─ tfr                         multitaper, 30 log freqs 5–20 Hz
//!        │
//!        ├─→ Epochs → Evoked        plot_erp, plot_topomap
//!        └─→ {Condition: AverageTfr} plot_tfr
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegsym::{pipeline, plot, BidsPath, PipelineConfig};
//!
//! let cfg = PipelineConfig::default();
//! let bids = BidsPath::new("data/ds", "01", "sym");
//!
//! let raw = pipeline::load_subject(&bids, &cfg).unwrap();
//! let raw = pipeline::filter_data(raw, &cfg).unwrap();
//! let raw = pipeline::remove_artifacts(raw, &cfg).unwrap();
//!
//! let epochs = pipeline::epoch_data(&raw, -0.5, 2.5, None, &cfg).unwrap();
//! let powers = pipeline::perform_tfr(&epochs, &cfg).unwrap();
//!
//! plot::plot_erp(&epochs, "01").unwrap().save_svg("erp.svg".as_ref()).unwrap();
//! plot::plot_tfr(&powers, "01").unwrap().save_svg("tfr.svg".as_ref()).unwrap();
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use eegsym::filter::filter_data;
//! use eegsym::reference::average_reference_inplace;
//! use eegsym::resample::resample;
//! use ndarray::Array2;
//!
//! let mut data: Array2<f64> = Array2::zeros((64, 2048 * 10)); // [C, T]
//! let picks: Vec<usize> = (0..64).collect();
//!
//! average_reference_inplace(&mut data, &picks);
//! filter_data(&mut data, 2048.0, Some(1.0), Some(25.0), &picks).unwrap();
//! let data = resample(&data, 2048.0, 128.0).unwrap();
//! assert_eq!(data.ncols(), 1280);
//! ```

pub mod baseline;
pub mod bdf;
pub mod bids;
pub mod config;
pub mod debug;
pub mod dpss;
pub mod epochs;
pub mod error;
pub mod events;
pub mod evoked;
pub mod filter;
pub mod ica;
pub mod io;
pub mod montage;
pub mod pipeline;
pub mod plot;
pub mod raw;
pub mod reference;
pub mod resample;
pub mod tfr;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// data model
pub use epochs::{DropLogEntry, DropReason, Epochs};
pub use events::{Condition, Event};
pub use evoked::{grand_average, Evoked};
pub use raw::{ChannelKind, Raw};
pub use tfr::{AverageTfr, TfrConfig};

// configuration + errors
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};

// ingestion
pub use bids::{read_raw_bids, BidsPath};
pub use montage::{make_standard_montage, set_montage, Montage};

// artifact model
pub use ica::{Detection, Ica, IcaConfig};

// stages
pub use pipeline::{
    epoch_data, filter_data, fit_artifact_model, load_subject, perform_tfr, process_subject,
    remove_artifacts, SubjectOutput,
};

// figures
pub use plot::{plot_average_erp, plot_erp, plot_tfr, plot_topomap, Figure};
