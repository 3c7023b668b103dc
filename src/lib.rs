//! pulseclip renders cycling telemetry overlays to video.
//!
//! A ride log (TCX or exported JSON) becomes an immutable [`TelemetryTrack`]. A chosen
//! [`RenderWindow`] of it is resampled to the output frame rate, animated, composited onto a
//! chroma-key background and streamed into a [`FrameSink`], normally an H.264 MP4 written by
//! system `ffmpeg`.
//!
//! - One-shot: [`run_render`] with a [`PreparedOverlay`] and any sink
//! - Managed: [`JobManager`] runs cancellable jobs on worker threads and reports progress
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod assets;
/// Pipeline configuration.
pub mod config;
/// Encoding sinks.
pub mod encode;
pub(crate) mod job;
pub(crate) mod render;
pub(crate) mod resample;
pub(crate) mod telemetry;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex};
pub use crate::foundation::error::{PulseError, PulseResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::heartbeat::{
    HeartbeatAccumulator, PulseStyle, REST_PHASE, annotate, pulse_scale,
};
pub use crate::assets::store::OverlayAssets;
pub use crate::config::{EncodeOpts, JobOpts, PipelineConfig};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::job::manager::{JobId, JobManager};
pub use crate::job::request::{RenderRequest, TrackId, TrackRef};
pub use crate::job::runner::{
    CancelToken, NoopObserver, RenderObserver, RenderOpts, RenderStats, run_render,
};
pub use crate::job::state::{JobSnapshot, JobStatus};
pub use crate::render::backend::FrameRGBA;
pub use crate::render::compositor::{FrameCompositor, OverlayStyle, PreparedOverlay};
pub use crate::resample::resampler::{FrameValues, resample};
pub use crate::resample::window::RenderWindow;
pub use crate::telemetry::sanitize::{ParseReport, SanitizeOpts};
pub use crate::telemetry::track::{
    Channel, ChannelStats, PowerSeries, Sample, SampleRecord, TelemetryTrack, TrackChannels,
    TrackSummary,
};
pub use crate::telemetry::{TelemetryFormat, TelemetrySource, parse};
