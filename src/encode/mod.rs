//! Encoding sinks.
//!
//! Sinks consume composited frames in index order and are driven by the render job runner.

/// `ffmpeg`-based MP4 sink.
pub mod ffmpeg;
/// Frame sink trait and the in-memory sink.
pub mod sink;
