//! Time-frequency overview: joint plots per hemisphere and condition.
//!
//! ```text
//!   ┌──────────────────────┬──────────────────────┐
//!   │ regular, left        │ regular, right       │
//!   │  [map @ m1][map @ m2]│  [map @ m1][map @ m2]│
//!   │  [  power image    ] │  [  power image    ] │
//!   ├──────────────────────┼──────────────────────┤
//!   │ random, left         │ random, right        │
//!   └──────────────────────┴──────────────────────┘
//! ```
use std::collections::BTreeMap;

use super::colormap::{symmetric_limits, Colormap};
use super::figure::{Cell, Figure, Grid, HeatmapPanel, Panel};
use super::topomap::{layout, topomap_panel};
use crate::baseline::BaselineMode;
use crate::error::{PipelineError, Result};
use crate::events::Condition;
use crate::tfr::AverageTfr;

/// Channel pairs of the overview, with the hemisphere they describe.
pub const TFR_PICKS: [([&str; 2], &str); 2] = [(["PO3", "PO7"], "left posterior"), (["PO4", "PO8"], "right posterior")];

/// Pre-stimulus window for the log-ratio baseline.
pub const TFR_BASELINE: (f64, f64) = (-0.5, 0.0);

/// `(time s, frequency Hz)` points marked on each joint plot.
pub const TFR_MARKERS: [(f64, f64); 2] = [(0.5, 12.0), (1.5, 12.0)];

/// Power image of `picks` with a topomap for every marker above it.
/// `power` must already be baseline corrected.
pub fn joint_panel(power: &AverageTfr, picks: &[&str], markers: &[(f64, f64)]) -> Result<Panel> {
    let image = power.combine_mean(picks)?;
    let (vmin, vmax) = symmetric_limits(image.iter());

    let mut maps = Vec::with_capacity(markers.len());
    for &(t, f) in markers {
        let snap = power.snapshot(t, f)?.to_vec();
        let (pos, vals) = layout(&power.positions, &snap)?;
        let limits = symmetric_limits(vals.iter());
        maps.push(Cell { title: Some(format!("{t:.2} s, {f:.0} Hz")), panel: topomap_panel(pos, vals, limits) });
    }
    let n_maps = maps.len().max(1);
    let heatmap = Panel::Heatmap(HeatmapPanel {
        x_label: "Time (s)".into(),
        y_label: "Frequency (Hz)".into(),
        x: power.times().to_vec(),
        y: power.freqs.clone(),
        values: image,
        vmin,
        vmax,
        colormap: Colormap::RdBuR,
        markers: markers.to_vec(),
        colorbar_label: "log ratio".into(),
    });
    let mut grid = Grid::new(
        2,
        1,
        vec![
            Cell { title: None, panel: Panel::Grid(Grid::new(1, n_maps, maps)) },
            Cell { title: None, panel: heatmap },
        ],
    );
    grid.row_weights = vec![1.0, 2.0];
    Ok(Panel::Grid(grid))
}

/// 2×2 overview of one subject's per-condition power.  Inputs are left
/// untouched; the log-ratio baseline is applied to copies.
pub fn plot_tfr(powers: &BTreeMap<Condition, AverageTfr>, subject: &str) -> Result<Figure> {
    let mut cells = Vec::with_capacity(4);
    for cond in Condition::ALL {
        let power = powers
            .get(&cond)
            .ok_or_else(|| PipelineError::NoEventsFound(format!("no {} TFR to plot", cond.label())))?;
        let corrected = if power.baseline.is_some() {
            log::warn!("{} TFR already baseline corrected; plotting as is", cond.label());
            power.clone()
        } else {
            power.with_baseline(BaselineMode::LogRatio, TFR_BASELINE)?
        };
        for (picks, side) in TFR_PICKS {
            cells.push(Cell {
                title: Some(format!(
                    "Subject {subject} {} & {} TFR, {side}, {} trials",
                    picks[0],
                    picks[1],
                    cond.label()
                )),
                panel: joint_panel(&corrected, &picks, &TFR_MARKERS)?,
            });
        }
    }
    Ok(Figure::new(
        format!("Subject {subject} TFR overview"),
        (1600, 1200),
        Panel::Grid(Grid::new(Condition::ALL.len(), TFR_PICKS.len(), cells)),
    ))
}
