use chrono::{DateTime, NaiveDateTime, Utc};

use crate::foundation::error::{PulseError, PulseResult};
use crate::telemetry::track::{Sample, TelemetryTrack};

/// Plausibility limits applied to individual readings during ingestion.
///
/// A reading outside its limit is dropped from its sample; the sample itself (and the rest of the
/// track) is kept.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SanitizeOpts {
    pub hr_min_bpm: f64,
    pub hr_max_bpm: f64,
    pub power_max_watts: f64,
    pub cadence_max_rpm: f64,
}

impl Default for SanitizeOpts {
    fn default() -> Self {
        Self {
            hr_min_bpm: 20.0,
            hr_max_bpm: 250.0,
            power_max_watts: 3000.0,
            cadence_max_rpm: 250.0,
        }
    }
}

impl SanitizeOpts {
    pub fn validate(&self) -> PulseResult<()> {
        if !(self.hr_min_bpm.is_finite() && self.hr_max_bpm.is_finite())
            || self.hr_min_bpm < 0.0
            || self.hr_min_bpm >= self.hr_max_bpm
        {
            return Err(PulseError::validation(
                "sanitize heart-rate range must be finite with 0 <= min < max",
            ));
        }
        if !self.power_max_watts.is_finite() || self.power_max_watts <= 0.0 {
            return Err(PulseError::validation(
                "sanitize power_max_watts must be finite and > 0",
            ));
        }
        if !self.cadence_max_rpm.is_finite() || self.cadence_max_rpm <= 0.0 {
            return Err(PulseError::validation(
                "sanitize cadence_max_rpm must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Counters describing what ingestion repaired or dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParseReport {
    pub records_seen: usize,
    pub skipped_bad_record: usize,
    pub skipped_bad_time: usize,
    pub duplicates_merged: usize,
    pub dropped_power: usize,
    pub dropped_heart_rate: usize,
    pub dropped_cadence: usize,
    pub dropped_distance: usize,
}

/// A record as read from the input format, before validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RawPoint {
    pub(crate) time: DateTime<Utc>,
    pub(crate) power: Option<f64>,
    pub(crate) hr: Option<f64>,
    pub(crate) cadence: Option<f64>,
    pub(crate) distance: Option<f64>,
}

/// Parse an RFC 3339 timestamp, accepting offset-less values as UTC.
pub(crate) fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

/// Parse a numeric field; empty or non-numeric text yields `None`.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Order, deduplicate and validate raw points into a track.
pub(crate) fn build_track(
    mut points: Vec<RawPoint>,
    opts: &SanitizeOpts,
    report: &mut ParseReport,
) -> PulseResult<TelemetryTrack> {
    if points.is_empty() {
        return Err(PulseError::empty_track(
            "no records with recognizable timestamps were found",
        ));
    }

    // Stable: among equal timestamps the later record in the file stays later.
    points.sort_by(|a, b| a.time.cmp(&b.time));
    let t0 = points[0].time;

    let mut samples: Vec<Sample> = Vec::with_capacity(points.len());
    for p in &points {
        let timestamp = (p.time - t0).num_milliseconds() as f64 / 1000.0;
        let sample = Sample {
            timestamp,
            power_watts: keep_in_range(p.power, 0.0, opts.power_max_watts, &mut report.dropped_power),
            heart_rate_bpm: keep_in_range(
                p.hr,
                opts.hr_min_bpm,
                opts.hr_max_bpm,
                &mut report.dropped_heart_rate,
            ),
            cadence_rpm: keep_in_range(
                p.cadence,
                0.0,
                opts.cadence_max_rpm,
                &mut report.dropped_cadence,
            ),
            distance_m: keep_in_range(p.distance, 0.0, f64::MAX, &mut report.dropped_distance),
            speed_mps: None,
        };

        match samples.last_mut() {
            Some(last) if last.timestamp == timestamp => {
                *last = sample;
                report.duplicates_merged += 1;
            }
            _ => samples.push(sample),
        }
    }

    derive_speed(&mut samples);

    if report.skipped_bad_record > 0
        || report.skipped_bad_time > 0
        || report.dropped_power > 0
        || report.dropped_heart_rate > 0
        || report.dropped_cadence > 0
    {
        tracing::warn!(?report, "repaired implausible telemetry readings");
    } else {
        tracing::debug!(?report, "telemetry sanitized");
    }

    TelemetryTrack::new(t0, samples)
}

fn keep_in_range(v: Option<f64>, min: f64, max: f64, dropped: &mut usize) -> Option<f64> {
    let v = v?;
    if v.is_finite() && v >= min && v <= max {
        Some(v)
    } else {
        *dropped += 1;
        None
    }
}

fn derive_speed(samples: &mut [Sample]) {
    let mut prev: Option<(f64, f64)> = None;
    let mut prev_speed = 0.0;
    for s in samples.iter_mut() {
        let Some(d) = s.distance_m else {
            prev = None;
            continue;
        };
        let speed = match prev {
            Some((pt, pd)) if s.timestamp > pt => ((d - pd) / (s.timestamp - pt)).max(0.0),
            Some(_) => prev_speed,
            None => 0.0,
        };
        s.speed_mps = Some(speed);
        prev_speed = speed;
        prev = Some((s.timestamp, d));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/sanitize.rs"]
mod tests;
