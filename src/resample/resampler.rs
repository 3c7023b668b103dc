use crate::foundation::core::FrameIndex;
use crate::foundation::error::PulseResult;
use crate::foundation::math::lerp;
use crate::resample::window::RenderWindow;
use crate::telemetry::track::{Channel, TelemetryTrack};

/// Resolved overlay state of one output frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FrameValues {
    pub index: FrameIndex,
    /// Seconds from track start.
    pub time: f64,
    pub power_watts: Option<f64>,
    pub watts_per_kg: Option<f64>,
    pub heart_rate_bpm: Option<f64>,
    pub cadence_rpm: Option<f64>,
    /// Position within the current heartbeat, `[0, 1)`. Set by the animation model.
    pub heartbeat_phase: f64,
}

/// Points of one channel, in time order.
struct ChannelSeries {
    points: Vec<(f64, f64)>,
    next: usize,
}

impl ChannelSeries {
    fn from_track(track: &TelemetryTrack, ch: Channel) -> Self {
        Self {
            points: track
                .samples()
                .iter()
                .filter_map(|s| ch.value(s).map(|v| (s.timestamp, v)))
                .collect(),
            next: 0,
        }
    }

    /// Linear interpolation between bracketing points, holding the endpoints outside them.
    ///
    /// Queries must be non-decreasing in `t`.
    fn value_at(&mut self, t: f64) -> Option<f64> {
        let pts = &self.points;
        let last = pts.len().checked_sub(1)?;
        while self.next < pts.len() && pts[self.next].0 <= t {
            self.next += 1;
        }
        if self.next == 0 {
            return Some(pts[0].1);
        }
        if self.next > last {
            return Some(pts[last].1);
        }
        let (t0, v0) = pts[self.next - 1];
        let (t1, v1) = pts[self.next];
        Some(lerp(v0, v1, (t - t0) / (t1 - t0)))
    }
}

/// Resample `track` onto the fixed frame grid of `window`.
///
/// Produces `window.frame_count()` frames at `start + i / fps`. `heartbeat_phase` is left at 0.
/// Fails with `InvalidWindow` when the window reaches outside `[0, track.duration]` or lies
/// entirely outside the coverage of the primary channel (power, or heart rate for tracks without
/// power).
#[tracing::instrument(skip_all, fields(start = window.start_secs, end = window.end_secs))]
pub fn resample(track: &TelemetryTrack, window: &RenderWindow) -> PulseResult<Vec<FrameValues>> {
    window.validate()?;
    window.check_within(track)?;
    window.check_coverage(track)?;

    let mut power = ChannelSeries::from_track(track, Channel::Power);
    let mut hr = ChannelSeries::from_track(track, Channel::HeartRate);
    let mut cadence = ChannelSeries::from_track(track, Channel::Cadence);

    let n = window.frame_count();
    let mut out = Vec::with_capacity(usize::try_from(n).unwrap_or(0));
    for i in 0..n {
        let t = window.frame_time(i);
        let p = power.value_at(t);
        out.push(FrameValues {
            index: FrameIndex(i),
            time: t,
            power_watts: p,
            watts_per_kg: p.map(|p| p / window.weight_kg),
            heart_rate_bpm: hr.value_at(t),
            cadence_rpm: cadence.value_at(t),
            heartbeat_phase: 0.0,
        });
    }

    tracing::debug!(frames = n, "resampled telemetry");
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/resample/resampler.rs"]
mod tests;
