//! Safetensors I/O.
//!
//! Recordings can be stored as a safetensors file with the keys
//!
//! ```text
//! data      [C, T]  F32 | F64   samples (volts, stim rows hold codes)
//! sfreq     [1]     F32 | F64
//! ch_names  [n]     U8          newline-separated
//! ch_kinds  [n]     U8          newline-separated, optional (default "eeg")
//! ```
//!
//! [`StWriter`] is the generic builder used for that format and for the
//! step-by-step dumps of the `pipeline_steps` binary.
use ndarray::{Array2, Array3};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::raw::{ChannelKind, Raw};

// ── Low-level safetensors parser ─────────────────────────────────────────────

fn format_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::Format(msg.into())
}

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    let len_bytes: [u8; 8] = bytes
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| format_err("safetensors file too small"))?;
    let n = u64::from_le_bytes(len_bytes) as usize;
    let hdr = bytes
        .get(8..8 + n)
        .ok_or_else(|| format_err("safetensors header runs past end of file"))?;
    let header: HashMap<String, serde_json::Value> = serde_json::from_slice(hdr)
        .map_err(|e| format_err(format!("failed to parse safetensors header: {e}")))?;
    Ok((header, 8 + n))
}

fn tensor_bytes<'a>(bytes: &'a [u8], data_start: usize, entry: &serde_json::Value) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .filter(|o| o.len() == 2)
        .ok_or_else(|| format_err("tensor without data_offsets"))?;
    let s = offsets[0].as_u64().ok_or_else(|| format_err("bad data offset"))? as usize;
    let e = offsets[1].as_u64().ok_or_else(|| format_err("bad data offset"))? as usize;
    bytes
        .get(data_start + s..data_start + e)
        .ok_or_else(|| format_err("tensor data runs past end of file"))
}

/// Numeric tensor widened to `f64`.
fn read_f64_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    match entry["dtype"].as_str() {
        Some("F64") => Ok(raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect()),
        Some("F32") => Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect()),
        other => Err(format_err(format!("unsupported numeric dtype {other:?}"))),
    }
}

fn read_lines(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<String>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    let s = std::str::from_utf8(raw).map_err(|e| format_err(format!("non-UTF-8 string tensor: {e}")))?;
    Ok(s.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .ok_or_else(|| format_err("tensor without shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).ok_or_else(|| format_err("bad shape entry")))
        .collect()
}

// ── Public structs ────────────────────────────────────────────────────────────

/// A recording as stored in a safetensors file.
pub struct RawData {
    /// [C, T]
    pub data: Array2<f64>,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
    pub ch_kinds: Vec<ChannelKind>,
}

impl RawData {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let (header, data_start) = parse_header(&bytes)?;
        let get = |key: &str| header.get(key).ok_or_else(|| format_err(format!("missing {key:?} key")));

        let data_entry = get("data")?;
        let shape = shape_of(data_entry)?;
        let [n_ch, n_t] = shape[..] else {
            return Err(format_err(format!("'data' must be 2-D, got shape {shape:?}")));
        };
        let data = Array2::from_shape_vec((n_ch, n_t), read_f64_tensor(&bytes, data_start, data_entry)?)
            .map_err(|e| format_err(format!("'data': {e}")))?;

        let sfreq = *read_f64_tensor(&bytes, data_start, get("sfreq")?)?
            .first()
            .ok_or_else(|| format_err("empty 'sfreq'"))?;

        let ch_names = read_lines(&bytes, data_start, get("ch_names")?)?;
        let ch_kinds = match header.get("ch_kinds") {
            Some(e) => read_lines(&bytes, data_start, e)?
                .iter()
                .map(|k| ChannelKind::parse(k).ok_or_else(|| format_err(format!("unknown channel kind {k:?}"))))
                .collect::<Result<Vec<_>>>()?,
            None => vec![ChannelKind::Eeg; ch_names.len()],
        };

        Ok(RawData { data, sfreq, ch_names, ch_kinds })
    }

    pub fn into_raw(self) -> Result<Raw> {
        Raw::new(self.data, self.sfreq, self.ch_names, self.ch_kinds)
    }
}

/// Store `raw` in the layout [`RawData::load`] reads.
pub fn write_raw(raw: &Raw, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", &raw.data);
    w.add_f64("sfreq", &[raw.sfreq], &[1]);
    w.add_lines("ch_names", raw.ch_names.iter().map(String::as_str));
    w.add_lines("ch_kinds", raw.ch_kinds.iter().map(|k| k.as_str()));
    w.write(path)
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer for F64, I32 and newline-joined string
/// tensors.
///
/// ```rust,no_run
/// use eegsym::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_lines("names", ["Fz", "Cz", "Pz"]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_f64_arr3(&mut self, name: &str, arr: &Array3<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        let (a, b, c) = arr.dim();
        self.add_f64(name, &data, &[a, b, c]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_lines<'a>(&mut self, name: &str, lines: impl IntoIterator<Item = &'a str>) {
        let joined = lines.into_iter().collect::<Vec<_>>().join("\n");
        let bytes = joined.into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)
            .map_err(|e| format_err(format!("failed to encode safetensors header: {e}")))?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub-01_task-x_eeg.safetensors");
        let raw = Raw::new(
            Array2::from_shape_fn((2, 5), |(c, t)| (c * 10 + t) as f64 * 1e-6),
            512.0,
            vec!["Cz".into(), "Status".into()],
            vec![ChannelKind::Eeg, ChannelKind::Stim],
        )
        .unwrap();
        write_raw(&raw, &path).unwrap();
        let back = RawData::load(&path).unwrap().into_raw().unwrap();
        assert_eq!(back.data, raw.data);
        assert_eq!(back.sfreq, 512.0);
        assert_eq!(back.ch_names, raw.ch_names);
        assert_eq!(back.ch_kinds, raw.ch_kinds);
    }

    #[test]
    fn truncated_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        std::fs::write(&path, [1u8, 0, 0]).unwrap();
        assert!(matches!(RawData::load(&path), Err(PipelineError::Format(_))));
    }
}
