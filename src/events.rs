//! Trigger decoding.
//!
//! Markers are read from the recording's stim channel: an event is any step
//! up to a non-zero value (`consecutive='increasing'`), and with
//! `initial_event` a channel that is already non-zero at the first sample
//! contributes an event at sample 0.
use std::fmt;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::raw::Raw;

/// The two stimulus classes of the paradigm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Regular,
    Random,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::Regular, Condition::Random];

    /// Trigger code on the stim channel.
    pub fn code(self) -> i32 {
        match self {
            Self::Regular => 1,
            Self::Random => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Regular),
            3 => Some(Self::Random),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Random => "random",
        }
    }

    /// Capitalised label for figure titles.
    pub fn title(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::Random => "Random",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub sample: usize,
    pub previous: i32,
    pub code: i32,
}

/// Decode a trigger trace.
pub fn find_events_in(stim: &[f64], initial_event: bool) -> Vec<Event> {
    let mut events = Vec::new();
    let Some(&first) = stim.first() else {
        return events;
    };
    let mut prev = first.round() as i32;
    if initial_event && prev != 0 {
        events.push(Event { sample: 0, previous: 0, code: prev });
    }
    for (i, &v) in stim.iter().enumerate().skip(1) {
        let code = v.round() as i32;
        if code != prev && code != 0 && code > prev {
            events.push(Event { sample: i, previous: prev, code });
        }
        prev = code;
    }
    events
}

/// Decode the first stim channel of `raw` with `initial_event = true`.
pub fn find_events(raw: &Raw) -> Result<Vec<Event>> {
    let stim = raw
        .stim_channel()
        .ok_or_else(|| PipelineError::ChannelNotFound("stim channel".to_string()))?;
    Ok(find_events_in(&raw.data.row(stim).to_vec(), true))
}

/// Keep the events whose code belongs to a [`Condition`].
///
/// Other codes mark non-task triggers in the recordings seen so far and are
/// dropped with a debug message.
pub fn label_events(events: &[Event]) -> Vec<(usize, Condition)> {
    let mut labelled = Vec::with_capacity(events.len());
    for ev in events {
        match Condition::from_code(ev.code) {
            Some(cond) => labelled.push((ev.sample, cond)),
            None => log::debug!("ignoring trigger code {} at sample {}", ev.code, ev.sample),
        }
    }
    labelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_up_are_events() {
        let mut stim = vec![0.0; 50];
        stim[10..14].fill(1.0);
        stim[30..32].fill(3.0);
        let ev = find_events_in(&stim, true);
        assert_eq!(
            ev,
            vec![
                Event { sample: 10, previous: 0, code: 1 },
                Event { sample: 30, previous: 0, code: 3 },
            ]
        );
    }

    #[test]
    fn initial_event_is_optional() {
        let mut stim = vec![0.0; 10];
        stim[0..3].fill(3.0);
        assert_eq!(find_events_in(&stim, true).len(), 1);
        assert!(find_events_in(&stim, false).is_empty());
    }

    #[test]
    fn decrease_to_nonzero_is_not_an_event() {
        let stim = [0.0, 3.0, 3.0, 1.0, 1.0, 0.0];
        let ev = find_events_in(&stim, true);
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].code, 3);
    }

    #[test]
    fn unknown_codes_are_dropped() {
        let events = [
            Event { sample: 5, previous: 0, code: 1 },
            Event { sample: 9, previous: 0, code: 7 },
            Event { sample: 12, previous: 0, code: 3 },
        ];
        assert_eq!(
            label_events(&events),
            vec![(5, Condition::Regular), (12, Condition::Random)]
        );
    }

    #[test]
    fn condition_codes_round_trip() {
        for c in Condition::ALL {
            assert_eq!(Condition::from_code(c.code()), Some(c));
        }
        assert_eq!(Condition::from_code(2), None);
    }
}
