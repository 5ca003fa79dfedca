//! Error types for the preview engine

use super::types::RenderMode;

/// Failure reported by a render session or one of its scenes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("malformed patch: {0}")]
    Malformed(String),

    #[error("nothing has been rendered yet")]
    Empty,

    #[error("{detail}")]
    Generic { detail: String },
}

impl SessionError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Errors surfaced by the document controller
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// Unsupported configuration at attach time; fatal
    #[error("configuration: {0}")]
    Configuration(String),

    /// Host element cannot present the requested mode
    #[error("render mode '{0}' is not supported by this host")]
    UnsupportedMode(RenderMode),

    /// Session rejected a patch
    #[error("applying {kind} patch: {source}")]
    Apply {
        kind: &'static str,
        #[source]
        source: SessionError,
    },

    /// Surface failed while drawing
    #[error("redraw: {0}")]
    Redraw(#[from] SessionError),

    /// Raster worker went away
    #[error("raster worker: {0}")]
    Worker(#[from] super::request::WorkerFault),

    #[error("controller already disposed")]
    Disposed,
}

impl PreviewError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Errors that fail `attach` rather than a single drain cycle
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnsupportedMode(_))
    }
}
