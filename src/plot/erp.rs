//! Condition-comparison ERP figures.
use std::collections::BTreeMap;

use super::figure::{Figure, LinePanel, Panel, Series};
use crate::epochs::Epochs;
use crate::error::{PipelineError, Result};
use crate::events::Condition;
use crate::evoked::Evoked;

/// Posterior-lateral pair averaged for the ERP comparison.
pub const ERP_PICKS: [&str; 2] = ["PO7", "PO8"];

pub(crate) const BLUE: [u8; 3] = [31, 119, 180];
pub(crate) const ORANGE: [u8; 3] = [255, 127, 14];

fn condition_color(cond: Condition) -> [u8; 3] {
    match cond {
        Condition::Regular => BLUE,
        Condition::Random => ORANGE,
    }
}

/// One trace per condition, `ERP_PICKS` combined by mean, in µV.
fn comparison(evokeds: &BTreeMap<Condition, Evoked>, title: String) -> Result<Figure> {
    let mut series = Vec::with_capacity(Condition::ALL.len());
    for cond in Condition::ALL {
        let evoked = evokeds
            .get(&cond)
            .ok_or_else(|| PipelineError::NoEventsFound(format!("no {} evoked to plot", cond.label())))?;
        let wave = evoked.combine_mean(&ERP_PICKS)?;
        let points = evoked.times().iter().zip(wave.iter()).map(|(&t, &v)| (t, v * 1e6)).collect();
        series.push(Series {
            label: format!("{} (N={})", cond.label(), evoked.nave),
            color: condition_color(cond),
            points,
        });
    }
    Ok(Figure::new(
        title,
        (900, 500),
        Panel::Lines(LinePanel {
            x_label: "Time (s)".into(),
            y_label: "Amplitude (µV)".into(),
            series,
            zero_lines: true,
            legend: true,
            annotations: Vec::new(),
        }),
    ))
}

/// Regular versus random average of one subject's epochs.
pub fn plot_erp(epochs: &Epochs, subject: &str) -> Result<Figure> {
    let mut evokeds = BTreeMap::new();
    for cond in Condition::ALL {
        evokeds.insert(cond, epochs.select(cond)?.average()?);
    }
    comparison(&evokeds, format!("Subject {subject} PO7 & PO8 ERP"))
}

/// Regular versus random grand average.
pub fn plot_average_erp(evokeds: &BTreeMap<Condition, Evoked>) -> Result<Figure> {
    comparison(evokeds, "Average PO7 & PO8 ERP".to_string())
}
