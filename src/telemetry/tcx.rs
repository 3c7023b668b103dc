use crate::foundation::error::{PulseError, PulseResult};
use crate::telemetry::sanitize::{ParseReport, RawPoint, parse_number, parse_time};

/// Extract trackpoints from a Training Center XML document.
///
/// Elements are matched by local name, so the `ns3:`/`tpx:` prefixes devices use for the power
/// extension do not matter.
pub(crate) fn parse_tcx(text: &str, report: &mut ParseReport) -> PulseResult<Vec<RawPoint>> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| PulseError::malformed(format!("not a valid XML/TCX document: {e}")))?;

    let mut out = Vec::new();
    for tp in doc.descendants().filter(|n| is_named(n, "Trackpoint")) {
        report.records_seen += 1;

        let time = child(tp, "Time").and_then(text_of).and_then(parse_time);
        let Some(time) = time else {
            report.skipped_bad_time += 1;
            tracing::debug!(record = report.records_seen, "skipping trackpoint without a valid time");
            continue;
        };

        let hr = child(tp, "HeartRateBpm")
            .and_then(|n| child(n, "Value"))
            .and_then(text_of);
        let power = tp
            .descendants()
            .find(|n| is_named(n, "Watts"))
            .and_then(text_of);

        out.push(RawPoint {
            time,
            power: number_or_drop(power, &mut report.dropped_power),
            hr: number_or_drop(hr, &mut report.dropped_heart_rate),
            cadence: number_or_drop(
                child(tp, "Cadence").and_then(text_of),
                &mut report.dropped_cadence,
            ),
            distance: number_or_drop(
                child(tp, "DistanceMeters").and_then(text_of),
                &mut report.dropped_distance,
            ),
        });
    }

    if report.records_seen == 0 {
        return Err(PulseError::malformed(
            "TCX document does not contain any Trackpoint data",
        ));
    }
    Ok(out)
}

fn is_named(n: &roxmltree::Node<'_, '_>, local: &str) -> bool {
    n.is_element() && n.tag_name().name() == local
}

fn child<'a, 'input>(
    n: roxmltree::Node<'a, 'input>,
    local: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    n.children().find(|c| is_named(c, local))
}

fn text_of<'a>(n: roxmltree::Node<'a, '_>) -> Option<&'a str> {
    n.text()
}

fn number_or_drop(text: Option<&str>, dropped: &mut usize) -> Option<f64> {
    let text = text?;
    let v = parse_number(text);
    if v.is_none() {
        *dropped += 1;
    }
    v
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/tcx.rs"]
mod tests;
