//! BioSemi Data Format (24-bit EDF variant).
//!
//! File layout:
//!
//! ```text
//! 256 B            fixed header (ASCII fields, version byte 0xFF "BIOSEMI")
//! 256 B × ns       signal headers, stored field by field:
//!                  label 16 · transducer 80 · unit 8 · phys min 8 · phys max 8
//!                  dig min 8 · dig max 8 · prefilter 80 · samples/record 8 · reserved 32
//! records          for each record, for each signal: n × 3 B little-endian
//!                  two's complement
//! ```
//!
//! Physical value: `(d − dmin) · (pmax − pmin) / (dmax − dmin) + pmin`,
//! converted to volts from the signal's unit.  The `Status` channel keeps the
//! low 16 bits of the raw word as the trigger code.
use std::path::Path;

use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::raw::{ChannelKind, Raw};

const FIXED_HEADER: usize = 256;
const SIGNAL_HEADER: usize = 256;
const TRIGGER_MASK: i32 = 0xFFFF;

/// Per-signal header.
#[derive(Debug, Clone)]
pub struct SignalHeader {
    pub label: String,
    pub unit: String,
    pub phys_min: f64,
    pub phys_max: f64,
    pub dig_min: f64,
    pub dig_max: f64,
    pub samples_per_record: usize,
}

#[derive(Debug, Clone)]
pub struct BdfHeader {
    pub n_records: usize,
    pub record_duration: f64,
    pub signals: Vec<SignalHeader>,
}

fn format_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::Format(msg.into())
}

struct Fields<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn take(&mut self, n: usize) -> Result<&'a str> {
        let b = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| format_err("BDF header is truncated"))?;
        self.pos += n;
        Ok(std::str::from_utf8(b).map_err(|_| format_err("non-ASCII BDF header field"))?.trim())
    }

    fn number<T: std::str::FromStr>(&mut self, n: usize, what: &str) -> Result<T> {
        let s = self.take(n)?;
        s.parse().map_err(|_| format_err(format!("bad {what} field {s:?}")))
    }

    fn column<T: std::str::FromStr>(&mut self, ns: usize, n: usize, what: &str) -> Result<Vec<T>> {
        (0..ns).map(|_| self.number(n, what)).collect()
    }

    fn strings(&mut self, ns: usize, n: usize) -> Result<Vec<String>> {
        (0..ns).map(|_| self.take(n).map(String::from)).collect()
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<(BdfHeader, usize)> {
    if bytes.first() != Some(&0xFF) || bytes.get(1..8) != Some(b"BIOSEMI".as_slice()) {
        return Err(format_err("not a BDF file (missing 0xFF BIOSEMI signature)"));
    }
    let mut f = Fields { bytes, pos: 8 + 80 + 80 + 8 + 8 };
    let header_bytes: usize = f.number(8, "header size")?;
    f.take(44)?;
    let n_records: i64 = f.number(8, "record count")?;
    let record_duration: f64 = f.number(8, "record duration")?;
    let ns: usize = f.number(4, "signal count")?;
    if n_records < 0 {
        return Err(format_err("BDF with unknown record count is not supported"));
    }
    if header_bytes != FIXED_HEADER + SIGNAL_HEADER * ns {
        return Err(format_err(format!("header size {header_bytes} does not match {ns} signals")));
    }

    let labels = f.strings(ns, 16)?;
    f.strings(ns, 80)?;
    let units = f.strings(ns, 8)?;
    let phys_min: Vec<f64> = f.column(ns, 8, "physical minimum")?;
    let phys_max: Vec<f64> = f.column(ns, 8, "physical maximum")?;
    let dig_min: Vec<f64> = f.column(ns, 8, "digital minimum")?;
    let dig_max: Vec<f64> = f.column(ns, 8, "digital maximum")?;
    f.strings(ns, 80)?;
    let samples: Vec<usize> = f.column(ns, 8, "samples per record")?;

    let signals = (0..ns)
        .map(|i| SignalHeader {
            label: labels[i].clone(),
            unit: units[i].clone(),
            phys_min: phys_min[i],
            phys_max: phys_max[i],
            dig_min: dig_min[i],
            dig_max: dig_max[i],
            samples_per_record: samples[i],
        })
        .collect();
    Ok((BdfHeader { n_records: n_records as usize, record_duration, signals }, header_bytes))
}

fn unit_scale(unit: &str) -> f64 {
    match unit {
        "uV" | "µV" => 1e-6,
        "mV" => 1e-3,
        "nV" => 1e-9,
        _ => 1.0,
    }
}

fn kind_of(label: &str) -> ChannelKind {
    let upper = label.to_ascii_uppercase();
    if upper == "STATUS" {
        ChannelKind::Stim
    } else if ["EXG", "GSR", "ERG", "RESP", "PLET", "TEMP"].iter().any(|p| upper.starts_with(p)) {
        ChannelKind::Misc
    } else {
        ChannelKind::Eeg
    }
}

#[inline]
fn sample24(b: &[u8]) -> i32 {
    // sign-extend from bit 23
    (i32::from(b[0]) | i32::from(b[1]) << 8 | i32::from(b[2]) << 16) << 8 >> 8
}

/// Read a whole BDF file into memory.
pub fn read_raw_bdf(path: &Path) -> Result<Raw> {
    let bytes = std::fs::read(path)?;
    let (hdr, data_start) = parse_header(&bytes)?;
    let Some(first) = hdr.signals.first() else {
        return Err(format_err("BDF file without signals"));
    };
    let spr = first.samples_per_record;
    if hdr.signals.iter().any(|s| s.samples_per_record != spr) {
        return Err(format_err("signals with different sampling rates are not supported"));
    }
    if !(hdr.record_duration > 0.0) {
        return Err(format_err(format!("record duration {} s", hdr.record_duration)));
    }
    let sfreq = spr as f64 / hdr.record_duration;
    let ns = hdr.signals.len();
    let record_bytes = ns * spr * 3;
    let body = bytes.get(data_start..).ok_or_else(|| format_err("BDF file ends inside its header"))?;
    let n_records = hdr.n_records.min(body.len() / record_bytes.max(1));
    if n_records < hdr.n_records {
        log::warn!("{}: {} of {} records present", path.display(), n_records, hdr.n_records);
    }

    let n_t = n_records * spr;
    let mut data = Array2::<f64>::zeros((ns, n_t));
    let kinds: Vec<ChannelKind> = hdr.signals.iter().map(|s| kind_of(&s.label)).collect();
    let gains: Vec<(f64, f64)> = hdr
        .signals
        .iter()
        .map(|s| {
            let gain = (s.phys_max - s.phys_min) / (s.dig_max - s.dig_min);
            let scale = unit_scale(&s.unit);
            (gain * scale, (s.phys_min - s.dig_min * gain) * scale)
        })
        .collect();

    for r in 0..n_records {
        let record = &body[r * record_bytes..(r + 1) * record_bytes];
        for (ch, chunk) in record.chunks_exact(spr * 3).enumerate() {
            let mut row = data.row_mut(ch);
            for (i, b) in chunk.chunks_exact(3).enumerate() {
                let d = sample24(b);
                row[r * spr + i] = match kinds[ch] {
                    ChannelKind::Stim => f64::from(d & TRIGGER_MASK),
                    _ => f64::from(d) * gains[ch].0 + gains[ch].1,
                };
            }
        }
    }

    let names = hdr.signals.iter().map(|s| s.label.clone()).collect();
    log::debug!("{}: {ns} channels, {n_t} samples at {sfreq} Hz", path.display());
    Raw::new(data, sfreq, names, kinds)
}

/// Write `raw` as BDF with one-second records.
///
/// Data channels are stored in µV over ±262 mV; the stim channel is written
/// as raw codes.  The last record is zero-padded.
pub fn write_bdf(raw: &Raw, path: &Path) -> Result<()> {
    let spr = raw.sfreq.round() as usize;
    if (raw.sfreq - spr as f64).abs() > 1e-9 || spr == 0 {
        return Err(PipelineError::invalid(format!("BDF writer needs an integer rate, got {}", raw.sfreq)));
    }
    let ns = raw.n_channels();
    let n_records = raw.n_times().div_ceil(spr);
    let (dmin, dmax) = (-8_388_608.0, 8_388_607.0);
    let (pmin, pmax) = (-262_144.0, 262_143.0);

    let mut out = Vec::with_capacity(FIXED_HEADER * (ns + 1) + n_records * ns * spr * 3);
    out.push(0xFF);
    out.extend_from_slice(b"BIOSEMI");
    let mut put = |s: String, n: usize| {
        let mut b = s.into_bytes();
        b.resize(n, b' ');
        out.extend_from_slice(&b[..n]);
    };
    put(raw.subject.clone(), 80);
    put(String::new(), 80);
    put("01.01.00".into(), 8);
    put("00.00.00".into(), 8);
    put((FIXED_HEADER + SIGNAL_HEADER * ns).to_string(), 8);
    put("24BIT".into(), 44);
    put(n_records.to_string(), 8);
    put("1".into(), 8);
    put(ns.to_string(), 4);
    for name in &raw.ch_names {
        put(name.clone(), 16);
    }
    for kind in &raw.ch_kinds {
        put(if *kind == ChannelKind::Stim { "Triggers and Status" } else { "Active Electrode" }.into(), 80);
    }
    for kind in &raw.ch_kinds {
        put(if *kind == ChannelKind::Stim { "Boolean" } else { "uV" }.into(), 8);
    }
    for kind in &raw.ch_kinds {
        put(if *kind == ChannelKind::Stim { dmin } else { pmin }.to_string(), 8);
    }
    for kind in &raw.ch_kinds {
        put(if *kind == ChannelKind::Stim { dmax } else { pmax }.to_string(), 8);
    }
    for _ in 0..ns {
        put(dmin.to_string(), 8);
    }
    for _ in 0..ns {
        put(dmax.to_string(), 8);
    }
    for _ in 0..ns {
        put(String::new(), 80);
    }
    for _ in 0..ns {
        put(spr.to_string(), 8);
    }
    for _ in 0..ns {
        put(String::new(), 32);
    }

    let gain = (pmax - pmin) / (dmax - dmin);
    for r in 0..n_records {
        for (ch, row) in raw.data.outer_iter().enumerate() {
            for i in 0..spr {
                let v = row.get(r * spr + i).copied().unwrap_or(0.0);
                let d = match raw.ch_kinds[ch] {
                    ChannelKind::Stim => v.round() as i32,
                    _ => ((v * 1e6 - pmin) / gain + dmin).round().clamp(dmin, dmax) as i32,
                };
                out.extend_from_slice(&d.to_le_bytes()[..3]);
            }
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}
