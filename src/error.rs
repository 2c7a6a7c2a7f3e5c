//! Error taxonomy for the pipeline.
//!
//! Every variant is fatal for the subject being processed: stages never
//! retry or fall back to partial output.  Diagnostic plotting is the one
//! exception and handles its own failures (see [`crate::debug`]).
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("montage mismatch: no template position for channel(s) {}", .0.join(", "))]
    MontageMismatch(Vec<String>),

    #[error("reference channel missing: {0}")]
    ReferenceChannelMissing(String),

    #[error("no events found: {0}")]
    NoEventsFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("malformed recording: {0}")]
    Format(String),

    #[error("ICA failed: {0}")]
    Ica(String),

    #[error("rendering failed: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
