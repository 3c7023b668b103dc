use crate::animation::ease::Ease;
use crate::foundation::core::Fps;
use crate::foundation::error::{PulseError, PulseResult};
use crate::foundation::math::frac01;
use crate::resample::resampler::FrameValues;

/// Phase of a heart that is not beating.
pub const REST_PHASE: f64 = 0.0;

/// Shape of the heart icon's pulse within one beat.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PulseStyle {
    /// Peak extra scale at the top of a beat (`0.15` grows the icon by 15%).
    pub strength: f64,
    /// Share of the cycle spent in the bump; the rest of the cycle is at rest size.
    pub beat_fraction: f64,
    pub ease: Ease,
}

impl Default for PulseStyle {
    fn default() -> Self {
        Self {
            strength: 0.15,
            beat_fraction: 0.35,
            ease: Ease::OutQuad,
        }
    }
}

impl PulseStyle {
    pub fn validate(&self) -> PulseResult<()> {
        if !self.strength.is_finite() || self.strength < 0.0 {
            return Err(PulseError::validation("pulse strength must be finite and >= 0"));
        }
        if !(self.beat_fraction > 0.0 && self.beat_fraction <= 1.0) {
            return Err(PulseError::validation("pulse beat_fraction must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Heartbeat phase carried from one frame to the next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeartbeatAccumulator {
    phase: f64,
    dt: f64,
}

impl HeartbeatAccumulator {
    pub fn new(fps: Fps, initial_phase: f64) -> Self {
        Self {
            phase: if initial_phase.is_finite() {
                frac01(initial_phase)
            } else {
                REST_PHASE
            },
            dt: fps.frame_duration_secs(),
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Step one frame forward at `bpm`. A missing reading holds the phase.
    pub fn advance(&mut self, bpm: Option<f64>) -> f64 {
        if let Some(bpm) = bpm.filter(|b| b.is_finite() && *b > 0.0) {
            self.phase = frac01(self.phase + bpm / 60.0 * self.dt);
        }
        self.phase
    }
}

/// Fill in `heartbeat_phase` for consecutive frames.
///
/// Frame 0 gets `initial_phase`; every later frame advances by its own heart rate over one frame
/// period. Without any heart-rate reading in `frames` every phase is [`REST_PHASE`].
pub fn annotate(frames: &mut [FrameValues], fps: Fps, initial_phase: f64) {
    if frames.iter().all(|f| f.heart_rate_bpm.is_none()) {
        for f in frames.iter_mut() {
            f.heartbeat_phase = REST_PHASE;
        }
        return;
    }

    let mut acc = HeartbeatAccumulator::new(fps, initial_phase);
    let mut iter = frames.iter_mut();
    if let Some(first) = iter.next() {
        first.heartbeat_phase = acc.phase();
    }
    for f in iter {
        f.heartbeat_phase = acc.advance(f.heart_rate_bpm);
    }
}

/// Icon scale factor for `phase`; exactly `1.0` at rest and for the idle part of the cycle.
pub fn pulse_scale(phase: f64, style: &PulseStyle) -> f64 {
    let phase = frac01(phase);
    if style.beat_fraction <= 0.0 || phase >= style.beat_fraction {
        return 1.0;
    }
    let u = style.ease.apply(phase / style.beat_fraction);
    let bump = (std::f64::consts::PI * u).sin().max(0.0);
    1.0 + style.strength * bump
}

#[cfg(test)]
#[path = "../../tests/unit/animation/heartbeat.rs"]
mod tests;
