//! Per-subject stages.
//!
//! ```text
//! BidsPath
//!   │
//!   ├─ load_subject        read, drop EXG1..EXG8, standard_1020 montage
//!   ├─ filter_data         average reference → 1–25 Hz FIR → 128 Hz
//!   ├─ remove_artifacts    FastICA(40, seed 2), EOG (AFz) ∪ muscle, apply
//!   ├─ epoch_data          codes 1/3, baseline (-0.2, 0.05), optional reject
//!   └─ perform_tfr         per-condition multitaper power
//! ```
//!
//! The recording moves by value through the cleaning stages; each returns
//! the instance the next one must use.  Diagnostic figures are written
//! through [`crate::debug::save_debug_figure`] and never touch the data.
use std::collections::BTreeMap;

use crate::bids::{read_raw_bids, BidsPath};
use crate::config::PipelineConfig;
use crate::debug::save_debug_figure;
use crate::epochs::Epochs;
use crate::error::Result;
use crate::events::Condition;
use crate::ica::{Ica, EOG_BAND};
use crate::montage::{make_standard_montage, set_montage};
use crate::plot::{plot_ica_components, plot_ica_scores, plot_raw, plot_sensors};
use crate::raw::Raw;
use crate::reference::set_average_reference;
use crate::resample::resample_raw;
use crate::tfr::AverageTfr;

// ── Ingestion ────────────────────────────────────────────────────────────────

/// Load a subject, drop the auxiliary channels and attach the montage.
pub fn load_subject(bids: &BidsPath, cfg: &PipelineConfig) -> Result<Raw> {
    let level = cfg.verbosity();
    let raw = read_raw_bids(bids)?;
    log::log!(
        level,
        "sub-{}: {} channels, {:.1} s at {} Hz",
        raw.subject,
        raw.n_channels(),
        raw.duration_secs(),
        raw.sfreq
    );

    let raw = raw.drop_channels(&cfg.aux_channel_refs())?;
    let montage = make_standard_montage("standard_1020")?;
    let raw = set_montage(raw, &montage, false)?;

    let sub = raw.subject.clone();
    save_debug_figure(cfg, &format!("sub-{sub}_sensors"), || plot_sensors(&raw));
    save_debug_figure(cfg, &format!("sub-{sub}_raw"), || plot_raw(&raw, &format!("Subject {sub} raw")));
    Ok(raw)
}

// ── Cleaning ─────────────────────────────────────────────────────────────────

/// Average reference, band-pass and resample, in that order.
pub fn filter_data(raw: Raw, cfg: &PipelineConfig) -> Result<Raw> {
    let level = cfg.verbosity();
    let sub = raw.subject.clone();

    let raw = set_average_reference(raw)?;
    log::log!(level, "sub-{sub}: average reference over {} EEG channels", raw.eeg_picks().len());
    save_debug_figure(cfg, &format!("sub-{sub}_referenced"), || {
        plot_raw(&raw, &format!("Subject {sub} after average reference"))
    });

    let mut raw = raw;
    let picks = raw.eeg_picks();
    let n_taps = crate::filter::filter_data(&mut raw.data, raw.sfreq, cfg.l_freq, cfg.h_freq, &picks)?;
    log::log!(
        level,
        "sub-{sub}: FIR {:?}–{:?} Hz, {n_taps} taps at {} Hz",
        cfg.l_freq,
        cfg.h_freq,
        raw.sfreq
    );
    save_debug_figure(cfg, &format!("sub-{sub}_filtered"), || {
        plot_raw(&raw, &format!("Subject {sub} after band-pass"))
    });

    let src = raw.sfreq;
    let raw = resample_raw(raw, cfg.target_sfreq)?;
    log::log!(level, "sub-{sub}: resampled {src} → {} Hz, {} samples", raw.sfreq, raw.n_times());
    save_debug_figure(cfg, &format!("sub-{sub}_resampled"), || {
        plot_raw(&raw, &format!("Subject {sub} after resampling"))
    });
    Ok(raw)
}

// ── Artifact removal ─────────────────────────────────────────────────────────

/// Fit the decomposition on `raw` and mark ocular and muscle components.
///
/// The returned model's [`Ica::exclude`] is the union of both detectors.
pub fn fit_artifact_model(raw: &Raw, cfg: &PipelineConfig) -> Result<Ica> {
    let level = cfg.verbosity();
    let mut ica = Ica::fit(raw, &cfg.ica)?;
    log::log!(level, "sub-{}: ICA fitted with {} components", raw.subject, ica.n_components);

    let eog = ica.find_bads_eog(raw, &cfg.eog_channel, &cfg.ica)?;
    let muscle = ica.find_bads_muscle(raw, &cfg.ica)?;
    log::log!(level, "sub-{}: EOG components {:?}, muscle components {:?}", raw.subject, eog.indices, muscle.indices);
    ica.exclude.extend(eog.indices.iter().copied());
    ica.exclude.extend(muscle.indices.iter().copied());

    let sub = &raw.subject;
    save_debug_figure(cfg, &format!("sub-{sub}_ica_components"), || plot_ica_components(&ica));
    save_debug_figure(cfg, &format!("sub-{sub}_ica_eog_scores"), || {
        Ok(plot_ica_scores(
            &eog,
            &format!("Correlation with {} ({}–{} Hz)", cfg.eog_channel, EOG_BAND.0, EOG_BAND.1),
            None,
        ))
    });
    save_debug_figure(cfg, &format!("sub-{sub}_ica_muscle_scores"), || {
        Ok(plot_ica_scores(&muscle, "Muscle artifact score", Some(cfg.ica.muscle_threshold)))
    });
    Ok(ica)
}

/// Fit, detect and remove artifact components from `raw`.
pub fn remove_artifacts(raw: Raw, cfg: &PipelineConfig) -> Result<Raw> {
    let ica = fit_artifact_model(&raw, cfg)?;
    log::log!(cfg.verbosity(), "sub-{}: removing components {:?}", raw.subject, ica.exclude);
    let raw = ica.apply(raw)?;
    let sub = raw.subject.clone();
    save_debug_figure(cfg, &format!("sub-{sub}_cleaned"), || {
        plot_raw(&raw, &format!("Subject {sub} after ICA"))
    });
    Ok(raw)
}

// ── Segmentation & spectral analysis ─────────────────────────────────────────

/// Cut regular/random epochs and, with `reject`, drop those whose
/// peak-to-peak amplitude exceeds it on any channel.
pub fn epoch_data(raw: &Raw, tmin: f64, tmax: f64, reject: Option<f64>, cfg: &PipelineConfig) -> Result<Epochs> {
    let level = cfg.verbosity();
    let mut epochs = Epochs::from_raw(raw, tmin, tmax, cfg.baseline)?;
    if let Some(threshold) = reject {
        let dropped = epochs.drop_bad(threshold)?;
        log::log!(level, "sub-{}: rejected {dropped} epochs above {threshold:e} V", raw.subject);
    }
    log::log!(
        level,
        "sub-{}: {} regular, {} random epochs",
        raw.subject,
        epochs.count(Condition::Regular),
        epochs.count(Condition::Random)
    );
    Ok(epochs)
}

/// Per-condition multitaper power with the configured frequency axis.
pub fn perform_tfr(epochs: &Epochs, cfg: &PipelineConfig) -> Result<BTreeMap<Condition, AverageTfr>> {
    let freqs = cfg.tfr.freqs();
    log::log!(
        cfg.verbosity(),
        "sub-{}: multitaper TFR, {} frequencies {:.1}–{:.1} Hz",
        epochs.subject,
        freqs.len(),
        cfg.tfr.fmin,
        cfg.tfr.fmax
    );
    crate::tfr::perform_tfr(epochs, &cfg.tfr)
}

/// Everything one subject contributes to the group figures.
#[derive(Debug, Clone)]
pub struct SubjectOutput {
    pub epochs: Epochs,
    pub powers: BTreeMap<Condition, AverageTfr>,
}

/// All stages for one subject.
pub fn process_subject(
    bids: &BidsPath,
    tmin: f64,
    tmax: f64,
    reject: Option<f64>,
    cfg: &PipelineConfig,
) -> Result<SubjectOutput> {
    cfg.validate()?;
    let raw = load_subject(bids, cfg)?;
    let raw = filter_data(raw, cfg)?;
    let raw = remove_artifacts(raw, cfg)?;
    let epochs = epoch_data(&raw, tmin, tmax, reject, cfg)?;
    let powers = perform_tfr(&epochs, cfg)?;
    Ok(SubjectOutput { epochs, powers })
}
