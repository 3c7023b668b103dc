use serde_json::{Map, Value};

use crate::foundation::error::{PulseError, PulseResult};
use crate::telemetry::sanitize::{ParseReport, RawPoint, parse_number, parse_time};

/// Read the JSON sample list written by [`crate::TelemetryTrack::write_slice_json`].
///
/// Only the outer array must be well formed. Records are read field by field, so a mistyped
/// reading drops that reading and a record without a usable `time` is skipped.
pub(crate) fn parse_json_records(
    text: &str,
    report: &mut ParseReport,
) -> PulseResult<Vec<RawPoint>> {
    let records: Vec<Value> = serde_json::from_str(text)
        .map_err(|e| PulseError::malformed(format!("not a JSON sample list: {e}")))?;
    if records.is_empty() {
        return Err(PulseError::malformed("JSON sample list is empty"));
    }

    let mut out = Vec::with_capacity(records.len());
    for r in &records {
        report.records_seen += 1;
        let Some(obj) = r.as_object() else {
            report.skipped_bad_record += 1;
            tracing::debug!(record = report.records_seen, "skipping non-object sample record");
            continue;
        };
        let time = obj.get("time").and_then(Value::as_str).and_then(parse_time);
        let Some(time) = time else {
            report.skipped_bad_time += 1;
            tracing::debug!(record = report.records_seen, "skipping record without a valid time");
            continue;
        };
        out.push(RawPoint {
            time,
            power: number_field(obj, "power", &mut report.dropped_power),
            hr: number_field(obj, "hr", &mut report.dropped_heart_rate),
            cadence: number_field(obj, "cadence", &mut report.dropped_cadence),
            distance: number_field(obj, "distance", &mut report.dropped_distance),
        });
    }
    Ok(out)
}

/// A numeric reading; `null` or absent is no reading, anything unparsable counts as dropped.
fn number_field(obj: &Map<String, Value>, key: &str, dropped: &mut usize) -> Option<f64> {
    let v = match obj.get(key)? {
        Value::Null => return None,
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    };
    if v.is_none() {
        *dropped += 1;
    }
    v
}
