//! Trial averages.
use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::events::Condition;

#[derive(Debug, Clone)]
pub struct Evoked {
    /// `[C, T]` mean over epochs.
    pub data: Array2<f64>,
    pub tmin: f64,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub positions: Vec<Option<[f64; 3]>>,
    /// Number of epochs (or, for a grand average, evoked responses) averaged.
    pub nave: usize,
    /// Set when every averaged epoch shares one condition.
    pub condition: Option<Condition>,
    pub subject: String,
}

impl Evoked {
    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |i| self.tmin + i as f64 / self.sfreq)
    }

    pub fn ch_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Index of the sample closest to `t` seconds.
    pub fn time_index(&self, t: f64) -> Result<usize> {
        let i = ((t - self.tmin) * self.sfreq).round();
        if i < 0.0 || i as usize >= self.n_times() {
            return Err(PipelineError::invalid(format!(
                "time {t} s is outside the evoked range ({:.3}, {:.3})",
                self.tmin,
                self.tmin + (self.n_times() - 1) as f64 / self.sfreq
            )));
        }
        Ok(i as usize)
    }

    /// Mean waveform over the named channels.
    pub fn combine_mean(&self, names: &[&str]) -> Result<Array1<f64>> {
        let picks = names
            .iter()
            .map(|n| self.ch_index(n).ok_or_else(|| PipelineError::ChannelNotFound((*n).to_string())))
            .collect::<Result<Vec<_>>>()?;
        self.data
            .select(Axis(0), &picks)
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::invalid("no channels to combine"))
    }

    /// Scalp map at `t` seconds, one value per channel.
    pub fn snapshot(&self, t: f64) -> Result<Array1<f64>> {
        Ok(self.data.column(self.time_index(t)?).to_owned())
    }
}

/// Equal-weight mean of per-subject evoked responses.
///
/// Every input must share channel names, sampling rate and time axis.
pub fn grand_average(evokeds: &[Evoked]) -> Result<Evoked> {
    let Some(first) = evokeds.first() else {
        return Err(PipelineError::invalid("grand average of zero evoked responses"));
    };
    for ev in &evokeds[1..] {
        if ev.ch_names != first.ch_names {
            return Err(PipelineError::invalid(format!(
                "subject {:?} has a different channel set than {:?}",
                ev.subject, first.subject
            )));
        }
        if ev.data.dim() != first.data.dim()
            || (ev.sfreq - first.sfreq).abs() > 1e-9
            || (ev.tmin - first.tmin).abs() > 0.5 / first.sfreq
        {
            return Err(PipelineError::invalid(format!(
                "subject {:?} has a different time axis than {:?}",
                ev.subject, first.subject
            )));
        }
    }
    let mut sum = Array2::<f64>::zeros(first.data.dim());
    for ev in evokeds {
        sum += &ev.data;
    }
    sum /= evokeds.len() as f64;

    let condition = first.condition.filter(|c| evokeds.iter().all(|e| e.condition == Some(*c)));
    Ok(Evoked {
        data: sum,
        tmin: first.tmin,
        sfreq: first.sfreq,
        ch_names: first.ch_names.clone(),
        positions: first.positions.clone(),
        nave: evokeds.len(),
        condition,
        subject: "average".to_string(),
    })
}
