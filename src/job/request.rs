use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{PulseError, PulseResult};
use crate::resample::window::RenderWindow;
use crate::telemetry::track::TelemetryTrack;

/// Identifier of a track registered with a job manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub uuid::Uuid);

impl TrackId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a request finds its telemetry.
#[derive(Clone, Debug)]
pub enum TrackRef {
    Id(TrackId),
    Inline(Arc<TelemetryTrack>),
}

/// Parameters of one overlay clip.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub track: TrackRef,
    /// Seconds from track start.
    pub start_secs: f64,
    /// Seconds from track start.
    pub end_secs: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub rider_weight_kg: f64,
    /// Explicit output file. Defaults to `<output_dir>/<job id>.mp4`.
    pub output_path: Option<PathBuf>,
}

impl RenderRequest {
    pub const DEFAULT_FPS: u32 = 30;
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;
    pub const DEFAULT_RIDER_WEIGHT_KG: f64 = 65.0;

    /// A 720p30 request for `[start_secs, end_secs]` of `track`.
    pub fn new(track: TrackRef, start_secs: f64, end_secs: f64) -> Self {
        Self {
            track,
            start_secs,
            end_secs,
            fps: Self::DEFAULT_FPS,
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            rider_weight_kg: Self::DEFAULT_RIDER_WEIGHT_KG,
            output_path: None,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Check the parameters that do not depend on the track.
    pub fn validate(&self) -> PulseResult<()> {
        if !self.rider_weight_kg.is_finite() || self.rider_weight_kg <= 0.0 {
            return Err(PulseError::validation(format!(
                "rider weight must be > 0 kg, got {}",
                self.rider_weight_kg
            )));
        }
        if self.fps == 0 {
            return Err(PulseError::validation("fps must be > 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PulseError::validation("resolution must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(PulseError::validation(format!(
                "resolution {}x{} must have even dimensions for yuv420p",
                self.width, self.height
            )));
        }
        if !self.start_secs.is_finite() || !self.end_secs.is_finite() {
            return Err(PulseError::validation("start and end must be finite"));
        }
        if self.end_secs <= self.start_secs {
            return Err(PulseError::validation(format!(
                "end ({}) must be after start ({})",
                self.end_secs, self.start_secs
            )));
        }
        Ok(())
    }

    /// Validate against `track` and build the render window.
    pub fn window(&self, track: &TelemetryTrack) -> PulseResult<RenderWindow> {
        self.validate()?;
        let window = RenderWindow::new(
            self.start_secs,
            self.end_secs,
            Fps::integer(self.fps)?,
            self.canvas(),
            self.rider_weight_kg,
        )?;
        window.check_within(track)?;
        window.check_coverage(track)?;
        Ok(window)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/request.rs"]
mod tests;
