//! Best-effort diagnostic figures.
//!
//! Figures are built lazily, only when `debug_images` is set, and written
//! as `<debug_dir>/<stem>.svg`.  Any failure on this path is logged with
//! `warn!` and swallowed, so the numeric pipeline never sees it.
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::plot::Figure;

/// Build and save a figure if debug images are enabled.
///
/// Returns the written path, or `None` when disabled or on failure.
pub fn save_debug_figure<F>(cfg: &PipelineConfig, stem: &str, build: F) -> Option<PathBuf>
where
    F: FnOnce() -> Result<Figure>,
{
    if !cfg.debug_images {
        return None;
    }
    let path = cfg.debug_dir.join(format!("{stem}.svg"));
    let outcome = std::fs::create_dir_all(&cfg.debug_dir)
        .map_err(PipelineError::from)
        .and_then(|()| build())
        .and_then(|fig| fig.save_svg(&path));
    match outcome {
        Ok(()) => {
            log::log!(cfg.verbosity(), "debug figure written to {}", path.display());
            Some(path)
        }
        Err(e) => {
            log::warn!("debug figure {stem} skipped: {e}");
            None
        }
    }
}
