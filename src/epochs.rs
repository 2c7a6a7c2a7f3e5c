//! Stimulus-locked epoching.
//!
//! Every marker of a known [`Condition`] yields one window of the EEG
//! channels:
//!
//! ```text
//! start = round(tmin · sfreq)          (sample offset, may be negative)
//! stop  = round(tmax · sfreq)          (inclusive)
//! epoch = raw[eeg, onset + start ..= onset + stop]
//! ```
//!
//! then each epoch/channel has the mean of its baseline window removed.
//! Windows that run past either end of the recording are dropped with a
//! [`DropReason::NoData`] entry in the drop log.
use ndarray::{s, Array1, Array3, Axis};

use crate::baseline::{baseline_correct_inplace, baseline_indices};
use crate::error::{PipelineError, Result};
use crate::events::{find_events, label_events, Condition};
use crate::evoked::Evoked;
use crate::raw::Raw;

/// Why an event did not make it into the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The window extends beyond the recording.
    NoData,
    /// Peak-to-peak amplitude on `channel` exceeded the threshold.
    Rejected { channel: String, ptp: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropLogEntry {
    pub sample: usize,
    pub condition: Condition,
    pub reason: DropReason,
}

#[derive(Debug, Clone)]
pub struct Epochs {
    /// `[E, C, T]`, EEG channels only.
    pub data: Array3<f64>,
    /// Onset sample and condition of each row of `data`.
    pub events: Vec<(usize, Condition)>,
    /// Sample-aligned window bounds in seconds.
    pub tmin: f64,
    pub tmax: f64,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub positions: Vec<Option<[f64; 3]>>,
    pub baseline: (f64, f64),
    /// Strictest threshold applied so far.
    pub reject: Option<f64>,
    pub drop_log: Vec<DropLogEntry>,
    pub subject: String,
}

impl Epochs {
    /// Cut `raw` around `events`.
    pub fn new(
        raw: &Raw,
        events: &[(usize, Condition)],
        tmin: f64,
        tmax: f64,
        baseline: (f64, f64),
    ) -> Result<Self> {
        if !(tmin.is_finite() && tmax.is_finite()) || tmin >= tmax {
            return Err(PipelineError::invalid(format!("epoch window ({tmin}, {tmax}) is empty")));
        }
        if events.is_empty() {
            return Err(PipelineError::NoEventsFound(format!(
                "subject {:?} has no regular or random markers",
                raw.subject
            )));
        }

        let start = (tmin * raw.sfreq).round() as i64;
        let stop = (tmax * raw.sfreq).round() as i64;
        let n_times = (stop - start + 1) as usize;
        let (tmin, tmax) = (start as f64 / raw.sfreq, stop as f64 / raw.sfreq);

        let slack = 0.5 / raw.sfreq;
        if baseline.0 < tmin - slack || baseline.1 > tmax + slack {
            return Err(PipelineError::invalid(format!(
                "baseline ({}, {}) lies outside the epoch window ({tmin:.4}, {tmax:.4})",
                baseline.0, baseline.1
            )));
        }
        let times: Vec<f64> = (0..n_times).map(|i| tmin + i as f64 / raw.sfreq).collect();
        let (imin, imax) = baseline_indices(&times, baseline)?;

        let picks = raw.eeg_picks();
        let mut kept = Vec::with_capacity(events.len());
        let mut drop_log = Vec::new();
        for &(sample, condition) in events {
            let first = sample as i64 + start;
            if first < 0 || first as usize + n_times > raw.n_times() {
                drop_log.push(DropLogEntry { sample, condition, reason: DropReason::NoData });
                continue;
            }
            kept.push((sample, condition, first as usize));
        }
        if kept.is_empty() {
            return Err(PipelineError::invalid(format!(
                "window ({tmin:.4}, {tmax:.4}) s does not fit around any of the {} markers",
                events.len()
            )));
        }
        if !drop_log.is_empty() {
            log::warn!("{} epoch(s) dropped: window runs past the recording", drop_log.len());
        }

        let mut data = Array3::<f64>::zeros((kept.len(), picks.len(), n_times));
        for (e, &(_, _, first)) in kept.iter().enumerate() {
            for (c, &ch) in picks.iter().enumerate() {
                data.slice_mut(s![e, c, ..])
                    .assign(&raw.data.slice(s![ch, first..first + n_times]));
            }
        }
        baseline_correct_inplace(&mut data, imin, imax);

        Ok(Self {
            data,
            events: kept.iter().map(|&(sample, cond, _)| (sample, cond)).collect(),
            tmin,
            tmax,
            sfreq: raw.sfreq,
            ch_names: picks.iter().map(|&i| raw.ch_names[i].clone()).collect(),
            positions: picks.iter().map(|&i| raw.positions[i]).collect(),
            baseline,
            reject: None,
            drop_log,
            subject: raw.subject.clone(),
        })
    }

    /// Decode the stim channel of `raw` and cut every known marker.
    pub fn from_raw(raw: &Raw, tmin: f64, tmax: f64, baseline: (f64, f64)) -> Result<Self> {
        let events = find_events(raw)?;
        if events.is_empty() {
            return Err(PipelineError::NoEventsFound(format!(
                "stim channel of subject {:?} carries no markers",
                raw.subject
            )));
        }
        let labelled = label_events(&events);
        log::debug!("{} markers, {} with a known condition", events.len(), labelled.len());
        Self::new(raw, &labelled, tmin, tmax, baseline)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |i| self.tmin + i as f64 / self.sfreq)
    }

    pub fn ch_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    pub fn count(&self, condition: Condition) -> usize {
        self.events.iter().filter(|(_, c)| *c == condition).count()
    }

    /// Drop every epoch whose peak-to-peak amplitude on any channel
    /// exceeds `threshold` (volts).  Returns how many were dropped.
    ///
    /// Applying the same threshold again drops nothing.
    pub fn drop_bad(&mut self, threshold: f64) -> Result<usize> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(PipelineError::invalid(format!(
                "rejection threshold must be positive, got {threshold}"
            )));
        }
        let mut keep = Vec::with_capacity(self.len());
        for (e, epoch) in self.data.outer_iter().enumerate() {
            let worst = epoch.outer_iter().enumerate().find_map(|(c, row)| {
                let (lo, hi) = row
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                (hi - lo > threshold).then_some((c, hi - lo))
            });
            match worst {
                None => keep.push(e),
                Some((c, ptp)) => {
                    let (sample, condition) = self.events[e];
                    self.drop_log.push(DropLogEntry {
                        sample,
                        condition,
                        reason: DropReason::Rejected { channel: self.ch_names[c].clone(), ptp },
                    });
                }
            }
        }
        let dropped = self.len() - keep.len();
        if dropped > 0 {
            self.data = self.data.select(Axis(0), &keep);
            self.events = keep.iter().map(|&e| self.events[e]).collect();
        }
        self.reject = Some(self.reject.map_or(threshold, |r| r.min(threshold)));
        log::debug!("rejection at {threshold:e}: {dropped} dropped, {} left", self.len());
        Ok(dropped)
    }

    /// The epochs of one condition.
    pub fn select(&self, condition: Condition) -> Result<Epochs> {
        let idx: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| *c == condition)
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            return Err(PipelineError::NoEventsFound(format!("no {condition} epochs")));
        }
        Ok(Epochs {
            data: self.data.select(Axis(0), &idx),
            events: idx.iter().map(|&i| self.events[i]).collect(),
            tmin: self.tmin,
            tmax: self.tmax,
            sfreq: self.sfreq,
            ch_names: self.ch_names.clone(),
            positions: self.positions.clone(),
            baseline: self.baseline,
            reject: self.reject,
            drop_log: self.drop_log.iter().filter(|d| d.condition == condition).cloned().collect(),
            subject: self.subject.clone(),
        })
    }

    /// Mean over epochs.
    pub fn average(&self) -> Result<Evoked> {
        let Some(mean) = self.data.mean_axis(Axis(0)) else {
            return Err(PipelineError::NoEventsFound("cannot average an empty collection".into()));
        };
        let condition = match self.events.first() {
            Some(&(_, first)) if self.events.iter().all(|&(_, c)| c == first) => Some(first),
            _ => None,
        };
        Ok(Evoked {
            data: mean,
            tmin: self.tmin,
            sfreq: self.sfreq,
            ch_names: self.ch_names.clone(),
            positions: self.positions.clone(),
            nave: self.len(),
            condition,
            subject: self.subject.clone(),
        })
    }
}
