use chrono::{DateTime, SecondsFormat, Utc};

use crate::foundation::error::{PulseError, PulseResult};

/// One sanitized telemetry reading.
///
/// `timestamp` is seconds since the first sample of the log.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub power_watts: Option<f64>,
    pub heart_rate_bpm: Option<f64>,
    pub cadence_rpm: Option<f64>,
    pub distance_m: Option<f64>,
    /// Derived from consecutive distance readings.
    pub speed_mps: Option<f64>,
}

impl Sample {
    /// A sample carrying only a timestamp.
    pub fn at(timestamp: f64) -> Self {
        Self {
            timestamp,
            power_watts: None,
            heart_rate_bpm: None,
            cadence_rpm: None,
            distance_m: None,
            speed_mps: None,
        }
    }
}

/// Interpolatable telemetry channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Power,
    HeartRate,
    Cadence,
    Distance,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Power,
        Channel::HeartRate,
        Channel::Cadence,
        Channel::Distance,
    ];

    pub fn value(self, s: &Sample) -> Option<f64> {
        match self {
            Channel::Power => s.power_watts,
            Channel::HeartRate => s.heart_rate_bpm,
            Channel::Cadence => s.cadence_rpm,
            Channel::Distance => s.distance_m,
        }
    }
}

/// Which channels carry at least one reading somewhere in the track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TrackChannels {
    pub power: bool,
    pub heart_rate: bool,
    pub cadence: bool,
    pub distance: bool,
}

impl TrackChannels {
    pub fn has(self, ch: Channel) -> bool {
        match ch {
            Channel::Power => self.power,
            Channel::HeartRate => self.heart_rate,
            Channel::Cadence => self.cadence,
            Channel::Distance => self.distance,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ChannelStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Human/JSON-facing overview of a parsed track.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TrackSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub sample_count: usize,
    pub channels: TrackChannels,
    pub power: Option<ChannelStats>,
    pub heart_rate: Option<ChannelStats>,
    pub cadence: Option<ChannelStats>,
    pub distance_m: Option<f64>,
}

/// Absolute times plus power, the data a range-picking chart plots.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PowerSeries {
    pub times: Vec<DateTime<Utc>>,
    pub power: Vec<Option<f64>>,
}

/// Exchange record used by the slice exporter and the JSON input format.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SampleRecord {
    /// RFC 3339 timestamp.
    pub time: String,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub hr: Option<f64>,
    #[serde(default)]
    pub cadence: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Immutable, time-ordered telemetry of one log.
///
/// Invariants: non-empty, timestamps strictly increasing, and at least one of power or heart
/// rate present somewhere.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryTrack {
    start_time: DateTime<Utc>,
    samples: Vec<Sample>,
    channels: TrackChannels,
}

impl TelemetryTrack {
    /// Build a track from already sanitized samples.
    pub fn new(start_time: DateTime<Utc>, samples: Vec<Sample>) -> PulseResult<Self> {
        if samples.is_empty() {
            return Err(PulseError::empty_track("track contains no samples"));
        }
        if samples
            .iter()
            .any(|s| !s.timestamp.is_finite())
            || samples.windows(2).any(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(PulseError::validation(
                "track samples must be strictly increasing in timestamp",
            ));
        }

        let channels = TrackChannels {
            power: samples.iter().any(|s| s.power_watts.is_some()),
            heart_rate: samples.iter().any(|s| s.heart_rate_bpm.is_some()),
            cadence: samples.iter().any(|s| s.cadence_rpm.is_some()),
            distance: samples.iter().any(|s| s.distance_m.is_some()),
        };
        if !channels.power && !channels.heart_rate {
            return Err(PulseError::empty_track(
                "no power or heart-rate readings present",
            ));
        }

        Ok(Self {
            start_time,
            samples,
            channels,
        })
    }

    /// Absolute time of the log's first sample.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.absolute_time(self.duration_secs())
    }

    /// Seconds between the first and the last sample.
    pub fn duration_secs(&self) -> f64 {
        self.samples.last().map(|s| s.timestamp).unwrap_or(0.0)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channels(&self) -> TrackChannels {
        self.channels
    }

    /// Channel whose coverage decides whether a window is renderable.
    pub fn primary_channel(&self) -> Channel {
        if self.channels.power {
            Channel::Power
        } else {
            Channel::HeartRate
        }
    }

    /// `[first, last]` timestamps of samples carrying `ch`.
    pub fn coverage(&self, ch: Channel) -> Option<(f64, f64)> {
        let first = self.samples.iter().find(|s| ch.value(s).is_some())?;
        let last = self.samples.iter().rev().find(|s| ch.value(s).is_some())?;
        Some((first.timestamp, last.timestamp))
    }

    pub fn absolute_time(&self, secs: f64) -> DateTime<Utc> {
        self.start_time + chrono::TimeDelta::milliseconds((secs * 1000.0).round() as i64)
    }

    /// Map an absolute time onto track-relative seconds (may be negative or past the end).
    pub fn relative_secs(&self, t: DateTime<Utc>) -> f64 {
        (t - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn summary(&self) -> TrackSummary {
        let distance_m = match (
            self.samples.iter().find_map(|s| s.distance_m),
            self.samples.iter().rev().find_map(|s| s.distance_m),
        ) {
            (Some(a), Some(b)) => Some((b - a).max(0.0)),
            _ => None,
        };
        TrackSummary {
            start_time: self.start_time,
            end_time: self.end_time(),
            duration_secs: self.duration_secs(),
            sample_count: self.samples.len(),
            channels: self.channels,
            power: self.stats(Channel::Power),
            heart_rate: self.stats(Channel::HeartRate),
            cadence: self.stats(Channel::Cadence),
            distance_m,
        }
    }

    fn stats(&self, ch: Channel) -> Option<ChannelStats> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for v in self.samples.iter().filter_map(|s| ch.value(s)) {
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        (count > 0).then(|| ChannelStats {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }

    pub fn power_series(&self) -> PowerSeries {
        PowerSeries {
            times: self
                .samples
                .iter()
                .map(|s| self.absolute_time(s.timestamp))
                .collect(),
            power: self.samples.iter().map(|s| s.power_watts).collect(),
        }
    }

    /// Copy out the samples needed to resample `[start, end]`.
    ///
    /// Besides the samples inside the window, the nearest sample carrying each present channel on
    /// either side is kept, so resampling the slice yields exactly the frames the full track
    /// would.
    pub fn slice(&self, start: f64, end: f64) -> PulseResult<TelemetryTrack> {
        if start.is_nan() || end.is_nan() || start > end {
            return Err(PulseError::invalid_window("slice start must be <= end"));
        }
        let lo = self.samples.partition_point(|s| s.timestamp < start);
        let hi = self.samples.partition_point(|s| s.timestamp <= end);

        // The samples just outside the window keep the slice spanning `[start, end]`.
        let mut from = lo.saturating_sub(1);
        let mut to = (hi + 1).min(self.samples.len());
        for ch in Channel::ALL {
            if !self.channels.has(ch) {
                continue;
            }
            if let Some(i) = self.samples[..lo]
                .iter()
                .rposition(|s| ch.value(s).is_some())
            {
                from = from.min(i);
            }
            if let Some(j) = self.samples[hi..]
                .iter()
                .position(|s| ch.value(s).is_some())
            {
                to = to.max(hi + j + 1);
            }
        }

        if from >= to {
            return Err(PulseError::invalid_window(format!(
                "window [{start:.3}, {end:.3}] selects no samples"
            )));
        }
        TelemetryTrack::new(self.start_time, self.samples[from..to].to_vec())
    }

    /// Samples with `start <= t <= end` as exchange records.
    pub fn slice_records(&self, start: f64, end: f64) -> Vec<SampleRecord> {
        self.samples
            .iter()
            .filter(|s| start <= s.timestamp && s.timestamp <= end)
            .map(|s| SampleRecord {
                time: self
                    .absolute_time(s.timestamp)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                power: s.power_watts,
                hr: s.heart_rate_bpm,
                cadence: s.cadence_rpm,
                distance: s.distance_m,
            })
            .collect()
    }

    /// Write `slice_records(start, end)` as pretty JSON.
    pub fn write_slice_json(
        &self,
        start: f64,
        end: f64,
        path: &std::path::Path,
    ) -> PulseResult<usize> {
        use anyhow::Context as _;

        let records = self.slice_records(start, end);
        let json = serde_json::to_string_pretty(&records).context("serialize sliced samples")?;
        std::fs::write(path, json)
            .with_context(|| format!("write sliced samples to '{}'", path.display()))?;
        tracing::info!(records = records.len(), path = %path.display(), "wrote sliced samples");
        Ok(records.len())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/track.rs"]
mod tests;
