/// Convenience result type used across pulseclip.
pub type PulseResult<T> = Result<T, PulseError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum PulseError {
    /// Invalid caller-provided parameters (request, config, sink setup).
    #[error("validation error: {0}")]
    Validation(String),

    /// The telemetry log could not be parsed as a supported format.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Parsing succeeded but no usable power or heart-rate channel remains.
    #[error("empty track: {0}")]
    EmptyTrack(String),

    /// The requested render window is outside the track's coverage.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Failures while compositing a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Codec, container or encoder-process failures.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The job observed an external cancellation request.
    #[error("cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    /// Build a [`PulseError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PulseError::MalformedInput`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Build a [`PulseError::EmptyTrack`] value.
    pub fn empty_track(msg: impl Into<String>) -> Self {
        Self::EmptyTrack(msg.into())
    }

    /// Build a [`PulseError::InvalidWindow`] value.
    pub fn invalid_window(msg: impl Into<String>) -> Self {
        Self::InvalidWindow(msg.into())
    }

    /// Build a [`PulseError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`PulseError::Encoding`] value.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Return `true` for the cancellation outcome, which is not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
