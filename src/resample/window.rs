use chrono::{DateTime, Utc};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{PulseError, PulseResult};
use crate::telemetry::track::TelemetryTrack;

/// Slack when comparing window bounds against the track duration (sub-millisecond rounding).
const BOUNDS_EPSILON_SECS: f64 = 1e-6;

/// A `[start, end]` sub-interval of a track plus the output parameters of the clip.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderWindow {
    /// Seconds from track start (inclusive).
    pub start_secs: f64,
    /// Seconds from track start.
    pub end_secs: f64,
    pub fps: Fps,
    pub canvas: Canvas,
    /// Rider weight used for watts per kilogram.
    pub weight_kg: f64,
}

impl RenderWindow {
    /// Build a window, rejecting parameter combinations that can never render.
    pub fn new(
        start_secs: f64,
        end_secs: f64,
        fps: Fps,
        canvas: Canvas,
        weight_kg: f64,
    ) -> PulseResult<Self> {
        let w = Self {
            start_secs,
            end_secs,
            fps,
            canvas,
            weight_kg,
        };
        w.validate()?;
        Ok(w)
    }

    /// Map absolute UTC bounds onto the track's time base.
    pub fn from_absolute(
        track: &TelemetryTrack,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        fps: Fps,
        canvas: Canvas,
        weight_kg: f64,
    ) -> PulseResult<Self> {
        Self::new(
            track.relative_secs(start),
            track.relative_secs(end),
            fps,
            canvas,
            weight_kg,
        )
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !self.start_secs.is_finite() || !self.end_secs.is_finite() {
            return Err(PulseError::validation("window bounds must be finite"));
        }
        if self.end_secs <= self.start_secs {
            return Err(PulseError::validation(format!(
                "window end ({:.3}s) must be after start ({:.3}s)",
                self.end_secs, self.start_secs
            )));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(PulseError::validation("fps must be non-zero"));
        }
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(PulseError::validation("rider weight must be > 0 kg"));
        }
        self.canvas.validate()
    }

    /// Reject windows reaching outside `[0, track.duration]`.
    pub fn check_within(&self, track: &TelemetryTrack) -> PulseResult<()> {
        let duration = track.duration_secs();
        if self.start_secs < -BOUNDS_EPSILON_SECS || self.end_secs > duration + BOUNDS_EPSILON_SECS
        {
            return Err(PulseError::invalid_window(format!(
                "window [{:.3}s, {:.3}s] is outside the track [0s, {:.3}s]",
                self.start_secs, self.end_secs, duration
            )));
        }
        Ok(())
    }

    /// Reject windows lying entirely outside the coverage of the track's primary channel.
    pub fn check_coverage(&self, track: &TelemetryTrack) -> PulseResult<()> {
        let primary = track.primary_channel();
        let (cov_start, cov_end) = track.coverage(primary).ok_or_else(|| {
            PulseError::invalid_window(format!("track has no {primary:?} readings"))
        })?;
        if self.end_secs < cov_start || self.start_secs > cov_end {
            return Err(PulseError::invalid_window(format!(
                "window [{:.3}s, {:.3}s] does not overlap {primary:?} coverage [{cov_start:.3}s, {cov_end:.3}s]",
                self.start_secs, self.end_secs
            )));
        }
        Ok(())
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// `round(duration * fps)`, at least one frame.
    pub fn frame_count(&self) -> u64 {
        self.fps.secs_to_frames_round(self.duration_secs()).max(1)
    }

    /// Track time of frame `i`.
    pub fn frame_time(&self, i: u64) -> f64 {
        self.start_secs + self.fps.frames_to_secs(i)
    }
}
