//! BIDS path resolution and loading.
//!
//! ```text
//! <root>/sub-<subject>[/ses-<session>]/eeg/
//!     sub-<subject>[_ses-<session>]_task-<task>_eeg<extension>
//!     sub-<subject>[_ses-<session>]_task-<task>_channels.tsv     (optional)
//! ```
//!
//! When the `channels.tsv` sidecar is present its `type` column overrides
//! the channel kinds guessed by the file reader.
use std::path::{Path, PathBuf};

use crate::bdf::read_raw_bdf;
use crate::error::{PipelineError, Result};
use crate::io::RawData;
use crate::raw::{ChannelKind, Raw};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsPath {
    pub root: PathBuf,
    pub subject: String,
    pub session: Option<String>,
    pub task: String,
    /// Default: `.bdf`.
    pub extension: String,
}

impl BidsPath {
    pub fn new(root: impl Into<PathBuf>, subject: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            subject: subject.into(),
            session: None,
            task: task.into(),
            extension: ".bdf".to_string(),
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let ext = extension.into();
        self.extension = if ext.starts_with('.') { ext } else { format!(".{ext}") };
        self
    }

    /// `<root>/sub-X[/ses-Y]/eeg`
    pub fn directory(&self) -> PathBuf {
        let mut dir = self.root.join(format!("sub-{}", self.subject));
        if let Some(ses) = &self.session {
            dir.push(format!("ses-{ses}"));
        }
        dir.join("eeg")
    }

    /// `sub-X[_ses-Y]_task-T`
    pub fn basename(&self) -> String {
        let mut name = format!("sub-{}", self.subject);
        if let Some(ses) = &self.session {
            name.push_str(&format!("_ses-{ses}"));
        }
        name.push_str(&format!("_task-{}", self.task));
        name
    }

    /// Full path of the recording.
    pub fn fpath(&self) -> PathBuf {
        self.directory().join(format!("{}_eeg{}", self.basename(), self.extension))
    }

    pub fn channels_tsv(&self) -> PathBuf {
        self.directory().join(format!("{}_channels.tsv", self.basename()))
    }
}

/// Load the recording `bids` points at, fully into memory.
pub fn read_raw_bids(bids: &BidsPath) -> Result<Raw> {
    let path = bids.fpath();
    log::debug!("reading {}", path.display());
    let raw = match bids.extension.as_str() {
        ".bdf" => read_raw_bdf(&path)?,
        ".safetensors" => RawData::load(&path)?.into_raw()?,
        other => {
            return Err(PipelineError::invalid(format!("unsupported recording extension {other:?}")))
        }
    };
    let raw = apply_channels_tsv(raw, &bids.channels_tsv())?;
    Ok(raw.with_subject(bids.subject.clone()))
}

fn apply_channels_tsv(mut raw: Raw, tsv: &Path) -> Result<Raw> {
    if !tsv.exists() {
        return Ok(raw);
    }
    let text = std::fs::read_to_string(tsv)?;
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split('\t').collect();
    let col = |name: &str| header.iter().position(|h| h.trim() == name);
    let (Some(name_col), Some(type_col)) = (col("name"), col("type")) else {
        return Err(PipelineError::Format(format!("{}: needs 'name' and 'type' columns", tsv.display())));
    };
    for line in lines.filter(|l| !l.trim().is_empty()) {
        let cells: Vec<&str> = line.split('\t').collect();
        let (Some(name), Some(kind)) = (cells.get(name_col), cells.get(type_col)) else {
            continue;
        };
        match (raw.ch_index(name.trim()), ChannelKind::parse(kind)) {
            (Some(i), Some(k)) => raw.ch_kinds[i] = k,
            (None, _) => log::debug!("{}: channel {name} is not in the recording", tsv.display()),
            (_, None) => log::debug!("{}: unknown channel type {kind}", tsv.display()),
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn layout_without_session() {
        let p = BidsPath::new("/data/ds", "01", "sym");
        assert_eq!(p.fpath(), PathBuf::from("/data/ds/sub-01/eeg/sub-01_task-sym_eeg.bdf"));
    }

    #[test]
    fn layout_with_session() {
        let p = BidsPath::new("/data/ds", "07", "sym").with_session("2").with_extension("safetensors");
        assert_eq!(
            p.fpath(),
            PathBuf::from("/data/ds/sub-07/ses-2/eeg/sub-07_ses-2_task-sym_eeg.safetensors")
        );
        assert_eq!(p.channels_tsv().file_name().unwrap(), "sub-07_ses-2_task-sym_channels.tsv");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let p = BidsPath::new("/nowhere", "01", "sym").with_extension(".vhdr");
        assert!(matches!(read_raw_bids(&p), Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn sidecar_overrides_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let bids = BidsPath::new(dir.path(), "01", "sym").with_extension(".safetensors");
        std::fs::create_dir_all(bids.directory()).unwrap();
        let raw = Raw::new(
            Array2::zeros((2, 8)),
            128.0,
            vec!["Cz".into(), "Trig".into()],
            vec![ChannelKind::Eeg, ChannelKind::Eeg],
        )
        .unwrap();
        crate::io::write_raw(&raw, &bids.fpath()).unwrap();
        std::fs::write(bids.channels_tsv(), "name\ttype\tunits\nCz\tEEG\tV\nTrig\tTRIG\tn/a\n").unwrap();

        let loaded = read_raw_bids(&bids).unwrap();
        assert_eq!(loaded.ch_kinds, vec![ChannelKind::Eeg, ChannelKind::Stim]);
        assert_eq!(loaded.subject, "01");
    }
}
