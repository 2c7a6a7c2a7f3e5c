mod common;
use std::collections::BTreeMap;

use common::{alternating_events, synthetic_raw};

use eegsym::montage::{make_standard_montage, set_montage};
use eegsym::plot::{
    plot_ica_components, plot_ica_scores, plot_raw, plot_sensors, Panel, DEFAULT_TOPOMAP_TIMES,
};
use eegsym::{
    epoch_data, grand_average, perform_tfr, plot_average_erp, plot_erp, plot_tfr, plot_topomap, Condition,
    Epochs, Evoked, Figure, Ica, IcaConfig, PipelineConfig, PipelineError, Raw,
};

fn raw(seed: u64) -> Raw {
    let raw = synthetic_raw(128.0, 30.0, &alternating_events(30.0), seed)
        .drop_channels(&PipelineConfig::default().aux_channel_refs())
        .unwrap()
        .with_subject(format!("{seed:02}"));
    set_montage(raw, &make_standard_montage("standard_1020").unwrap(), false).unwrap()
}

fn epochs(seed: u64) -> Epochs {
    epoch_data(&raw(seed), -0.5, 2.5, None, &PipelineConfig::default()).unwrap()
}

fn evokeds(ep: &Epochs) -> BTreeMap<Condition, Evoked> {
    Condition::ALL.iter().map(|&c| (c, ep.select(c).unwrap().average().unwrap())).collect()
}

fn assert_renders(fig: &Figure) {
    let svg = fig.render_svg().unwrap();
    assert!(svg.starts_with("<svg"), "not an SVG document");
    assert!(svg.len() > 1000);
}

#[test]
fn erp_comparison() {
    let ep = epochs(50);
    let fig = plot_erp(&ep, "50").unwrap();
    assert_eq!(fig.title, "Subject 50 PO7 & PO8 ERP");
    let Panel::Lines(lines) = &fig.panel else { panic!("expected a line panel") };
    assert_eq!(lines.series.len(), 2);
    assert_ne!(lines.series[0].color, lines.series[1].color);
    assert_eq!(lines.series[0].points.len(), ep.n_times());
    assert_renders(&fig);
}

#[test]
fn grand_average_comparison() {
    let (a, b) = (evokeds(&epochs(51)), evokeds(&epochs(52)));
    let grand: BTreeMap<Condition, Evoked> = Condition::ALL
        .iter()
        .map(|&c| (c, grand_average(&[a[&c].clone(), b[&c].clone()]).unwrap()))
        .collect();
    let fig = plot_average_erp(&grand).unwrap();
    assert_eq!(fig.title, "Average PO7 & PO8 ERP");
    assert_renders(&fig);
}

#[test]
fn tfr_overview_is_a_titled_two_by_two_grid() {
    let ep = epochs(53);
    let powers = perform_tfr(&ep, &PipelineConfig::default()).unwrap();
    let before = powers[&Condition::Regular].data.clone();

    let fig = plot_tfr(&powers, "53").unwrap();
    assert_eq!(fig.title, "Subject 53 TFR overview");
    let Panel::Grid(grid) = &fig.panel else { panic!("expected a grid") };
    assert_eq!((grid.rows, grid.cols), (2, 2));
    let title = |r, c| grid.cell(r, c).unwrap().title.clone().unwrap();
    assert!(title(0, 0).contains("PO3 & PO7") && title(0, 0).contains("regular"));
    assert!(title(0, 1).contains("right posterior"));
    assert!(title(1, 0).contains("random"));

    // inputs untouched
    assert!(powers[&Condition::Regular].baseline.is_none());
    assert_eq!(powers[&Condition::Regular].data, before);
    assert_renders(&fig);
}

#[test]
fn topomap_rows_per_condition() {
    let ev = evokeds(&epochs(54));
    let fig = plot_topomap(&ev, &DEFAULT_TOPOMAP_TIMES, "Subject 54 topography").unwrap();
    let Panel::Grid(grid) = &fig.panel else { panic!("expected a grid") };
    assert_eq!((grid.rows, grid.cols), (2, 1));
    assert_eq!(grid.cell(0, 0).unwrap().title.as_deref(), Some("Regular trials"));
    assert_eq!(grid.cell(1, 0).unwrap().title.as_deref(), Some("Random trials"));
    assert_renders(&fig);
}

#[test]
fn topomap_outside_the_epoch_is_invalid() {
    let ev = evokeds(&epochs(55));
    assert!(matches!(plot_topomap(&ev, &[9.0], "x"), Err(PipelineError::InvalidParameter(_))));
}

#[test]
fn erp_needs_the_posterior_pair() {
    let r = raw(56).drop_channels(&["PO8"]).unwrap();
    let ep = epoch_data(&r, -0.5, 2.5, None, &PipelineConfig::default()).unwrap();
    assert!(matches!(plot_erp(&ep, "56"), Err(PipelineError::ChannelNotFound(_))));
}

#[test]
fn diagnostics_render() {
    let r = raw(57);
    assert_renders(&plot_sensors(&r).unwrap());
    assert_renders(&plot_raw(&r, "raw").unwrap());

    let cfg = IcaConfig { n_components: 6, ..IcaConfig::default() };
    let ica = Ica::fit(&r, &cfg).unwrap();
    assert_renders(&plot_ica_components(&ica).unwrap());
    let det = ica.find_bads_muscle(&r, &cfg).unwrap();
    assert_renders(&plot_ica_scores(&det, "muscle", Some(cfg.muscle_threshold)));
}

#[test]
fn figures_save_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fig = plot_erp(&epochs(58), "58").unwrap();
    let path = dir.path().join("erp.svg");
    fig.save_svg(&path).unwrap();
    assert!(std::fs::read_to_string(path).unwrap().contains("Subject 58"));
}
