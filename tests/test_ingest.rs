mod common;
use common::{alternating_events, synthetic_raw, write_bids};

use eegsym::{load_subject, ChannelKind, PipelineConfig, PipelineError};

#[test]
fn load_subject_drops_aux_channels_and_places_every_electrode() {
    let dir = tempfile::tempdir().unwrap();
    let raw = synthetic_raw(256.0, 20.0, &alternating_events(20.0), 1);
    let bids = write_bids(dir.path(), "01", &raw, ".safetensors");

    let loaded = load_subject(&bids, &PipelineConfig::default()).unwrap();
    assert_eq!(loaded.subject, "01");
    assert_eq!(loaded.n_channels(), 65);
    assert!(loaded.ch_names.iter().all(|n| !n.starts_with("EXG")));
    for i in loaded.eeg_picks() {
        assert!(loaded.positions[i].is_some(), "{} has no position", loaded.ch_names[i]);
    }
    let stim = loaded.stim_channel().unwrap();
    assert!(loaded.positions[stim].is_none());
    assert_eq!(loaded.data, raw.drop_channels(&PipelineConfig::default().aux_channel_refs()).unwrap().data);
}

#[test]
fn missing_aux_channel_fails_before_any_processing() {
    let dir = tempfile::tempdir().unwrap();
    let raw = synthetic_raw(256.0, 5.0, &[], 2).drop_channels(&["EXG3"]).unwrap();
    let bids = write_bids(dir.path(), "02", &raw, ".safetensors");

    match load_subject(&bids, &PipelineConfig::default()) {
        Err(PipelineError::ChannelNotFound(name)) => assert_eq!(name, "EXG3"),
        other => panic!("expected ChannelNotFound, got {other:?}"),
    }
}

#[test]
fn unknown_electrode_is_a_montage_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = synthetic_raw(256.0, 5.0, &[], 3);
    raw.ch_names[5] = "Xq9".into();
    let bids = write_bids(dir.path(), "03", &raw, ".safetensors");

    match load_subject(&bids, &PipelineConfig::default()) {
        Err(PipelineError::MontageMismatch(names)) => assert_eq!(names, vec!["Xq9".to_string()]),
        other => panic!("expected MontageMismatch, got {other:?}"),
    }
}

#[test]
fn montage_matching_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = synthetic_raw(256.0, 5.0, &[], 4);
    raw.ch_names[0] = "FP1".into();
    let bids = write_bids(dir.path(), "04", &raw, ".safetensors");
    let loaded = load_subject(&bids, &PipelineConfig::default()).unwrap();
    assert!(loaded.positions[0].is_some());
}

#[test]
fn bdf_recording_loads_through_bids() {
    let dir = tempfile::tempdir().unwrap();
    let events = alternating_events(12.0);
    let raw = synthetic_raw(256.0, 12.0, &events, 5);
    let bids = write_bids(dir.path(), "05", &raw, ".bdf");

    let loaded = load_subject(&bids, &PipelineConfig::default()).unwrap();
    assert_eq!(loaded.sfreq, 256.0);
    assert_eq!(loaded.n_times(), raw.n_times());
    assert_eq!(loaded.ch_kinds.iter().filter(|k| **k == ChannelKind::Eeg).count(), 64);

    let fz = loaded.ch_index("Fz").unwrap();
    let src = raw.ch_index("Fz").unwrap();
    for t in (0..raw.n_times()).step_by(97) {
        approx::assert_abs_diff_eq!(loaded.data[[fz, t]], raw.data[[src, t]], epsilon = 1e-7);
    }
    let events_back = eegsym::events::find_events(&loaded).unwrap();
    assert_eq!(events_back.len(), events.len());
}

#[test]
fn missing_recording_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let bids = eegsym::BidsPath::new(dir.path(), "99", common::TASK);
    assert!(matches!(load_subject(&bids, &PipelineConfig::default()), Err(PipelineError::Io(_))));
}
