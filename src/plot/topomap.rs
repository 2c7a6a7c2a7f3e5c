//! Scalp topographies.
//!
//! Sensor values are spread over the head disc by inverse-distance
//! weighting in the azimuthal-equidistant plane of
//! [`crate::montage::topomap_coords`].
use std::collections::BTreeMap;

use super::colormap::{symmetric_limits, Colormap};
use super::figure::{Cell, Figure, Grid, Panel, TopomapPanel};
use crate::error::{PipelineError, Result};
use crate::events::Condition;
use crate::evoked::Evoked;
use crate::montage::topomap_coords;

/// Post-stimulus instants shown by default, in seconds.
pub const DEFAULT_TOPOMAP_TIMES: [f64; 2] = [0.52, 2.0];

const IDW_POWER: f64 = 2.0;
const RESOLUTION: usize = 48;

/// Inverse-distance-weighted value at `at`.  Exact at a sensor.
pub fn interpolate_idw(positions: &[[f64; 2]], values: &[f64], at: [f64; 2]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (p, &v) in positions.iter().zip(values) {
        let d2 = (p[0] - at[0]).powi(2) + (p[1] - at[1]).powi(2);
        if d2 < 1e-18 {
            return v;
        }
        let w = 1.0 / d2.powf(IDW_POWER / 2.0);
        num += w * v;
        den += w;
    }
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Polylines for the head circle, nose and ears.
pub(crate) fn head_outline(radius: f64) -> Vec<Vec<(f64, f64)>> {
    let circle: Vec<(f64, f64)> = (0..=100)
        .map(|i| {
            let a = i as f64 / 100.0 * std::f64::consts::TAU;
            (radius * a.cos(), radius * a.sin())
        })
        .collect();
    let nose = vec![(-0.1 * radius, 0.995 * radius), (0.0, 1.1 * radius), (0.1 * radius, 0.995 * radius)];
    let ear = |side: f64| -> Vec<(f64, f64)> {
        [(0.0, 0.1), (0.04, 0.12), (0.08, 0.08), (0.09, -0.05), (0.05, -0.15), (0.0, -0.12)]
            .iter()
            .map(|&(dx, dy)| (side * radius * (1.0 + dx), radius * dy))
            .collect()
    };
    vec![circle, nose, ear(1.0), ear(-1.0)]
}

/// Projected positions and values of the channels that have a position.
pub(crate) fn layout(positions: &[Option<[f64; 3]>], values: &[f64]) -> Result<(Vec<[f64; 2]>, Vec<f64>)> {
    let (pos, vals): (Vec<[f64; 2]>, Vec<f64>) = positions
        .iter()
        .zip(values)
        .filter_map(|(p, &v)| p.map(|p| (topomap_coords(p), v)))
        .unzip();
    if pos.is_empty() {
        return Err(PipelineError::invalid("no channel positions; attach a montage first"));
    }
    Ok((pos, vals))
}

pub(crate) fn topomap_panel(pos: Vec<[f64; 2]>, values: Vec<f64>, (vmin, vmax): (f64, f64)) -> Panel {
    Panel::Topomap(TopomapPanel {
        positions: pos,
        values: Some(values),
        names: None,
        vmin,
        vmax,
        colormap: Colormap::RdBuR,
        resolution: RESOLUTION,
    })
}

/// One row of maps at `times`, sharing a colour scale.  Values in µV.
fn snapshot_row(evoked: &Evoked, times: &[f64]) -> Result<Panel> {
    let mut maps = Vec::with_capacity(times.len());
    for &t in times {
        let snap: Vec<f64> = evoked.snapshot(t)?.iter().map(|v| v * 1e6).collect();
        maps.push(layout(&evoked.positions, &snap)?);
    }
    let limits = symmetric_limits(maps.iter().flat_map(|(_, v)| v.iter()));
    let cells = maps
        .into_iter()
        .zip(times)
        .map(|((pos, vals), t)| Cell { title: Some(format!("{t:.3} s")), panel: topomap_panel(pos, vals, limits) })
        .collect();
    Ok(Panel::Grid(Grid::new(1, times.len(), cells)))
}

/// Scalp maps of both conditions at `times`, one row per condition.
pub fn plot_topomap(evokeds: &BTreeMap<Condition, Evoked>, times: &[f64], title: &str) -> Result<Figure> {
    if times.is_empty() {
        return Err(PipelineError::invalid("plot_topomap needs at least one time"));
    }
    let mut rows = Vec::with_capacity(Condition::ALL.len());
    for cond in Condition::ALL {
        let evoked = evokeds
            .get(&cond)
            .ok_or_else(|| PipelineError::NoEventsFound(format!("no {} evoked to plot", cond.label())))?;
        rows.push(Cell { title: Some(format!("{} trials", cond.title())), panel: snapshot_row(evoked, times)? });
    }
    let width = 260 * times.len() as u32 + 40;
    Ok(Figure::new(title, (width, 640), Panel::Grid(Grid::new(rows.len(), 1, rows))))
}
