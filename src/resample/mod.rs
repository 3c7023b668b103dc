//! Fixed-rate resampling of irregular telemetry.

pub(crate) mod resampler;
pub(crate) mod window;
