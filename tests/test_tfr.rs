mod common;
use common::{alternating_events, synthetic_raw};

use eegsym::tfr::{tfr_multitaper, TfrConfig};
use eegsym::{epoch_data, perform_tfr, Condition, Epochs, PipelineConfig};

fn epochs() -> Epochs {
    let events = alternating_events(30.0);
    let raw = synthetic_raw(128.0, 30.0, &events, 40)
        .drop_channels(&PipelineConfig::default().aux_channel_refs())
        .unwrap()
        .drop_channels(&common::BIOSEMI64[8..56])
        .unwrap();
    epoch_data(&raw, -0.5, 2.5, None, &PipelineConfig::default()).unwrap()
}

#[test]
fn per_condition_maps_on_the_fixed_axis() {
    let ep = epochs();
    let powers = perform_tfr(&ep, &PipelineConfig::default()).unwrap();
    assert_eq!(powers.len(), 2);
    for (cond, p) in &powers {
        assert_eq!(p.condition, Some(*cond));
        assert_eq!(p.freqs.len(), 30);
        approx::assert_abs_diff_eq!(p.freqs[0], 5.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(p.freqs[29], 20.0, epsilon = 1e-9);
        assert_eq!(p.data.dim(), (ep.n_channels(), 30, ep.n_times()));
        assert_eq!(p.nave, ep.count(*cond));
        assert!(p.data.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}

#[test]
fn conditions_are_computed_independently() {
    let ep = epochs();
    let cfg = TfrConfig::default();
    let freqs = cfg.freqs();
    let cycles = cfg.n_cycles(&freqs);

    let together = perform_tfr(&ep, &PipelineConfig::default()).unwrap();
    let random_first = tfr_multitaper(&ep.select(Condition::Random).unwrap(), &freqs, &cycles, 4.0, true).unwrap();
    let regular_after = tfr_multitaper(&ep.select(Condition::Regular).unwrap(), &freqs, &cycles, 4.0, true).unwrap();

    assert_eq!(together[&Condition::Regular].data, regular_after.data);
    assert_eq!(together[&Condition::Random].data, random_first.data);
}

#[test]
fn epochs_are_not_modified() {
    let ep = epochs();
    let copy = ep.data.clone();
    perform_tfr(&ep, &PipelineConfig::default()).unwrap();
    assert_eq!(ep.data, copy);
}

#[test]
fn missing_condition_is_no_events() {
    let raw = synthetic_raw(128.0, 20.0, &[(3.0, 1), (8.0, 1)], 41)
        .drop_channels(&PipelineConfig::default().aux_channel_refs())
        .unwrap();
    let ep = epoch_data(&raw, -0.5, 2.5, None, &PipelineConfig::default()).unwrap();
    assert!(matches!(
        perform_tfr(&ep, &PipelineConfig::default()),
        Err(eegsym::PipelineError::NoEventsFound(_))
    ));
}
