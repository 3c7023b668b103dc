//! Telemetry ingestion: raw log bytes to an immutable [`TelemetryTrack`].

mod json;
pub(crate) mod sanitize;
mod tcx;
pub(crate) mod track;

use std::path::Path;

use crate::foundation::error::{PulseError, PulseResult};
use crate::telemetry::sanitize::{ParseReport, SanitizeOpts, build_track};
use crate::telemetry::track::TelemetryTrack;

/// Supported telemetry log encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryFormat {
    /// Garmin Training Center XML.
    Tcx,
    /// Sample list as written by the slice exporter.
    Json,
}

impl TelemetryFormat {
    /// Guess the format from the first meaningful byte.
    pub fn sniff(raw: &[u8]) -> Option<Self> {
        let body = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
        match body.iter().find(|b| !b.is_ascii_whitespace())? {
            b'<' => Some(Self::Tcx),
            b'[' => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parses raw logs with a fixed set of plausibility limits.
#[derive(Clone, Debug, Default)]
pub struct TelemetrySource {
    opts: SanitizeOpts,
}

impl TelemetrySource {
    pub fn new(opts: SanitizeOpts) -> PulseResult<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    /// Parse a raw log into a track.
    ///
    /// Fails with `MalformedInput` when the bytes are not a supported format and with
    /// `EmptyTrack` when no power or heart-rate reading survives sanitization. Individual bad
    /// records are repaired or dropped.
    pub fn parse(&self, raw: &[u8]) -> PulseResult<TelemetryTrack> {
        self.parse_with_report(raw).map(|(track, _)| track)
    }

    #[tracing::instrument(skip_all, fields(bytes = raw.len()))]
    pub fn parse_with_report(&self, raw: &[u8]) -> PulseResult<(TelemetryTrack, ParseReport)> {
        let format = TelemetryFormat::sniff(raw).ok_or_else(|| {
            PulseError::malformed("input is neither a TCX document nor a JSON sample list")
        })?;
        let text = std::str::from_utf8(raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw))
            .map_err(|e| PulseError::malformed(format!("input is not valid UTF-8: {e}")))?;

        let mut report = ParseReport::default();
        let points = match format {
            TelemetryFormat::Tcx => tcx::parse_tcx(text, &mut report)?,
            TelemetryFormat::Json => json::parse_json_records(text, &mut report)?,
        };
        let track = build_track(points, &self.opts, &mut report)?;
        tracing::info!(
            ?format,
            samples = track.len(),
            duration_secs = track.duration_secs(),
            "parsed telemetry"
        );
        Ok((track, report))
    }

    pub fn parse_path(&self, path: &Path) -> PulseResult<TelemetryTrack> {
        use anyhow::Context as _;

        let raw = std::fs::read(path)
            .with_context(|| format!("read telemetry log '{}'", path.display()))?;
        self.parse(&raw)
    }
}

/// Parse with default plausibility limits.
pub fn parse(raw: &[u8]) -> PulseResult<TelemetryTrack> {
    TelemetrySource::default().parse(raw)
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/source.rs"]
mod tests;
