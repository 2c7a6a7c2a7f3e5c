mod common;
use common::{alternating_events, synthetic_raw};

use rand::{rngs::StdRng, Rng, SeedableRng};

use eegsym::montage::{make_standard_montage, set_montage};
use eegsym::{fit_artifact_model, remove_artifacts, IcaConfig, PipelineConfig, PipelineError, Raw};

/// Cleaned-rate recording with montage, ready for decomposition.
fn recording(seed: u64) -> Raw {
    let raw = synthetic_raw(128.0, 40.0, &alternating_events(40.0), seed)
        .drop_channels(&PipelineConfig::default().aux_channel_refs())
        .unwrap();
    let raw = set_montage(raw, &make_standard_montage("standard_1020").unwrap(), false).unwrap();
    eegsym::reference::set_average_reference(raw).unwrap()
}

/// Add one broadband source over the left temporal sites.
fn with_temporal_emg(mut raw: Raw, seed: u64) -> Raw {
    let mut rng = StdRng::seed_from_u64(seed);
    let emg: Vec<f64> = (0..raw.n_times()).map(|_| 3e-5 * rng.random_range(-1.0..1.0)).collect();
    for name in ["T7", "TP7", "FT7"] {
        let ch = raw.ch_index(name).unwrap();
        for (v, e) in raw.data.row_mut(ch).iter_mut().zip(&emg) {
            *v += e;
        }
    }
    raw
}

fn energy(raw: &Raw, name: &str) -> f64 {
    raw.data.row(raw.ch_index(name).unwrap()).iter().map(|v| v * v).sum()
}

fn small_cfg() -> PipelineConfig {
    PipelineConfig { ica: IcaConfig { n_components: 12, ..IcaConfig::default() }, ..PipelineConfig::default() }
}

#[test]
fn exclusion_set_is_reproducible() {
    let raw = recording(23);
    let cfg = PipelineConfig::default();
    let a = fit_artifact_model(&raw, &cfg).unwrap();
    let b = fit_artifact_model(&raw, &cfg).unwrap();
    assert!(!a.exclude.is_empty());
    assert_eq!(a.exclude, b.exclude);
    assert_eq!(a.mixing, b.mixing);
    assert_eq!(a.n_components, 40);
}

#[test]
fn blink_component_is_found_and_removed() {
    let raw = recording(23);
    let cfg = PipelineConfig::default();
    let ica = fit_artifact_model(&raw, &cfg).unwrap();
    let eog = ica.find_bads_eog(&raw, &cfg.eog_channel, &cfg.ica).unwrap();
    assert!(!eog.indices.is_empty(), "no ocular component, scores {:?}", eog.scores);
    assert!(eog.indices.iter().all(|k| ica.exclude.contains(k)));

    let before = energy(&raw, "AFz");
    let cleaned = remove_artifacts(raw, &cfg).unwrap();
    let ratio = energy(&cleaned, "AFz") / before;
    assert!(ratio < 0.8, "AFz energy ratio {ratio}");
}

#[test]
fn temporal_emg_is_flagged_as_muscle() {
    let raw = with_temporal_emg(recording(23), 7);
    let cfg = PipelineConfig::default();
    let ica = fit_artifact_model(&raw, &cfg).unwrap();
    let muscle = ica.find_bads_muscle(&raw, &cfg.ica).unwrap();
    assert!(!muscle.indices.is_empty(), "no muscle component, scores {:?}", muscle.scores);
    assert!(muscle.indices.iter().all(|k| ica.exclude.contains(k)));
}

#[test]
fn missing_reference_channel_is_reported() {
    let raw = recording(21);
    let cfg = PipelineConfig { eog_channel: "EOG061".into(), ..small_cfg() };
    match fit_artifact_model(&raw, &cfg) {
        Err(PipelineError::ReferenceChannelMissing(name)) => assert_eq!(name, "EOG061"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("expected ReferenceChannelMissing"),
    }
}

#[test]
fn removal_keeps_layout_and_leaves_stim_alone() {
    let raw = recording(22);
    let stim = raw.stim_channel().unwrap();
    let before = raw.data.row(stim).to_owned();
    let cleaned = remove_artifacts(raw.clone(), &small_cfg()).unwrap();
    assert_eq!(cleaned.ch_names, raw.ch_names);
    assert_eq!(cleaned.sfreq, raw.sfreq);
    assert_eq!(cleaned.data.dim(), raw.data.dim());
    assert_eq!(cleaned.data.row(stim), before);
}

#[test]
fn exclusions_are_the_union_of_both_detectors() {
    let raw = with_temporal_emg(recording(23), 7);
    let cfg = PipelineConfig::default();
    let ica = fit_artifact_model(&raw, &cfg).unwrap();
    let eog = ica.find_bads_eog(&raw, &cfg.eog_channel, &cfg.ica).unwrap();
    let muscle = ica.find_bads_muscle(&raw, &cfg.ica).unwrap();
    let mut union: Vec<usize> = eog.indices.iter().chain(&muscle.indices).copied().collect();
    union.sort_unstable();
    union.dedup();
    assert!(!union.is_empty());
    assert_eq!(ica.exclude.iter().copied().collect::<Vec<_>>(), union);
    assert_eq!(eog.scores.len(), 40);
    assert_eq!(muscle.scores.len(), 40);
}
