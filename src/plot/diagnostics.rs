//! Intermediate-stage figures written under `debug_images`.
use super::colormap::{symmetric_limits, Colormap};
use super::figure::{BarPanel, Cell, Figure, Grid, LinePanel, Panel, Series, TopomapPanel};
use super::topomap::{layout, topomap_panel};
use crate::error::{PipelineError, Result};
use crate::ica::{Detection, Ica};
use crate::montage::topomap_coords;
use crate::raw::{ChannelKind, Raw};

const RAW_MAX_CHANNELS: usize = 20;
const RAW_WINDOW_SECS: f64 = 10.0;
const TRACE: [u8; 3] = [0, 0, 139];

/// First seconds of the first data channels, stacked top to bottom.
pub fn plot_raw(raw: &Raw, title: &str) -> Result<Figure> {
    let picks: Vec<usize> = (0..raw.n_channels())
        .filter(|&i| raw.ch_kinds[i] != ChannelKind::Stim)
        .take(RAW_MAX_CHANNELS)
        .collect();
    if picks.is_empty() {
        return Err(PipelineError::invalid("recording has no data channels to plot"));
    }
    let n_t = ((RAW_WINDOW_SECS * raw.sfreq) as usize).min(raw.n_times());

    // one spacing for every trace: three times the median channel std, in µV
    let mut stds: Vec<f64> = picks
        .iter()
        .map(|&c| {
            let row = raw.data.row(c);
            let seg = row.slice(ndarray::s![..n_t]);
            seg.std(0.0) * 1e6
        })
        .collect();
    stds.sort_by(f64::total_cmp);
    let median = stds[stds.len() / 2];
    let spacing = if median > 0.0 { 3.0 * median } else { 1.0 };

    let mut series = Vec::with_capacity(picks.len());
    let mut annotations = Vec::with_capacity(picks.len());
    for (k, &c) in picks.iter().enumerate() {
        let offset = -(k as f64) * spacing;
        let row = raw.data.row(c);
        let mean = row.slice(ndarray::s![..n_t]).mean().unwrap_or(0.0);
        series.push(Series {
            label: raw.ch_names[c].clone(),
            color: TRACE,
            points: (0..n_t).map(|t| (t as f64 / raw.sfreq, (row[t] - mean) * 1e6 + offset)).collect(),
        });
        annotations.push((0.0, offset + spacing * 0.3, raw.ch_names[c].clone()));
    }
    Ok(Figure::new(
        title,
        (1000, 60 + 40 * picks.len() as u32),
        Panel::Lines(LinePanel {
            x_label: "Time (s)".into(),
            y_label: format!("µV (spacing {spacing:.1})"),
            series,
            zero_lines: false,
            legend: false,
            annotations,
        }),
    ))
}

/// Electrode layout with names.
pub fn plot_sensors(raw: &Raw) -> Result<Figure> {
    let (positions, names): (Vec<[f64; 2]>, Vec<String>) = raw
        .positions
        .iter()
        .zip(&raw.ch_names)
        .filter_map(|(p, n)| p.map(|p| (topomap_coords(p), n.clone())))
        .unzip();
    if positions.is_empty() {
        return Err(PipelineError::invalid("no channel positions; attach a montage first"));
    }
    Ok(Figure::new(
        format!("Subject {} sensor layout", raw.subject),
        (700, 700),
        Panel::Topomap(TopomapPanel {
            positions,
            values: None,
            names: Some(names),
            vmin: -1.0,
            vmax: 1.0,
            colormap: Colormap::RdBuR,
            resolution: 2,
        }),
    ))
}

/// Topography of every fitted component; excluded ones are marked.
pub fn plot_ica_components(ica: &Ica) -> Result<Figure> {
    let cols = ica.n_components.clamp(1, 8);
    let rows = ica.n_components.div_ceil(cols).max(1);
    let mut cells = Vec::with_capacity(ica.n_components);
    for k in 0..ica.n_components {
        let topo = ica.topography(k).to_vec();
        let (pos, vals) = layout(&ica.positions, &topo)?;
        let limits = symmetric_limits(vals.iter());
        let mark = if ica.exclude.contains(&k) { " (excluded)" } else { "" };
        cells.push(Cell { title: Some(format!("ICA{k:03}{mark}")), panel: topomap_panel(pos, vals, limits) });
    }
    Ok(Figure::new(
        "ICA components",
        (150 * cols as u32 + 40, 160 * rows as u32 + 60),
        Panel::Grid(Grid::new(rows, cols, cells)),
    ))
}

/// Per-component detection scores, marked components highlighted.
pub fn plot_ica_scores(detection: &Detection, title: &str, threshold: Option<f64>) -> Figure {
    Figure::new(
        title,
        (900, 400),
        Panel::Bars(BarPanel {
            x_label: "ICA component".into(),
            y_label: "Score".into(),
            values: detection.scores.clone(),
            highlighted: detection.indices.clone(),
            thresholds: threshold.into_iter().collect(),
        }),
    )
}
