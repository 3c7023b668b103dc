use super::*;

fn sample(t: f64, power: Option<f64>, hr: Option<f64>) -> Sample {
    Sample {
        power_watts: power,
        heart_rate_bpm: hr,
        ..Sample::at(t)
    }
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_714_557_600, 0).unwrap()
}

fn mixed_track() -> TelemetryTrack {
    TelemetryTrack::new(
        start(),
        vec![
            sample(0.0, Some(100.0), Some(120.0)),
            sample(1.0, Some(110.0), None),
            sample(2.0, None, None),
            sample(5.0, Some(150.0), Some(130.0)),
            sample(6.0, Some(160.0), None),
            sample(9.0, None, Some(140.0)),
        ],
    )
    .unwrap()
}

#[test]
fn rejects_unordered_and_channel_less_samples() {
    let err = TelemetryTrack::new(start(), vec![sample(1.0, Some(1.0), None), sample(1.0, Some(2.0), None)])
        .unwrap_err();
    assert!(matches!(err, PulseError::Validation(_)));

    let err = TelemetryTrack::new(start(), vec![Sample::at(0.0)]).unwrap_err();
    assert!(matches!(err, PulseError::EmptyTrack(_)));
}

#[test]
fn channels_and_coverage() {
    let t = mixed_track();
    let ch = t.channels();
    assert!(ch.power && ch.heart_rate);
    assert!(!ch.cadence && !ch.distance);
    assert_eq!(t.coverage(Channel::Power), Some((0.0, 6.0)));
    assert_eq!(t.coverage(Channel::HeartRate), Some((0.0, 9.0)));
    assert_eq!(t.coverage(Channel::Cadence), None);
    assert_eq!(t.primary_channel(), Channel::Power);
}

#[test]
fn heart_rate_is_primary_without_power() {
    let t = TelemetryTrack::new(start(), vec![sample(0.0, None, Some(100.0))]).unwrap();
    assert_eq!(t.primary_channel(), Channel::HeartRate);
}

#[test]
fn summary_reports_stats() {
    let s = mixed_track().summary();
    assert_eq!(s.sample_count, 6);
    assert_eq!(s.duration_secs, 9.0);
    let p = s.power.unwrap();
    assert_eq!(p.count, 4);
    assert_eq!(p.min, 100.0);
    assert_eq!(p.max, 160.0);
    assert_eq!(p.mean, 130.0);
    assert!(s.cadence.is_none());
    assert_eq!(s.end_time, start() + chrono::TimeDelta::seconds(9));
}

#[test]
fn slice_keeps_bracketing_channel_samples() {
    let t = mixed_track();
    let s = t.slice(2.5, 4.0).unwrap();
    let ts: Vec<f64> = s.samples().iter().map(|x| x.timestamp).collect();
    // Nearest power before is t=1, nearest heart rate before is t=0; both after are t=5.
    assert_eq!(ts, vec![0.0, 1.0, 2.0, 5.0]);
    assert_eq!(s.start_time(), t.start_time());
}

#[test]
fn slice_outside_track_is_invalid() {
    let t = TelemetryTrack::new(start(), vec![sample(0.0, Some(1.0), None)]).unwrap();
    assert!(t.slice(5.0, 1.0).is_err());
}

#[test]
fn slice_records_use_absolute_times() {
    let t = mixed_track();
    let recs = t.slice_records(1.0, 5.0);
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].time, "2024-05-01T10:00:01.000Z");
    assert_eq!(recs[0].power, Some(110.0));
    assert_eq!(recs[2].hr, Some(130.0));
}

#[test]
fn relative_and_absolute_times_agree() {
    let t = mixed_track();
    let abs = t.absolute_time(5.5);
    assert_eq!(t.relative_secs(abs), 5.5);
    let series = t.power_series();
    assert_eq!(series.times.len(), 6);
    assert_eq!(series.power[2], None);
}

#[test]
fn slice_spans_the_requested_window() {
    let t = TelemetryTrack::new(
        start(),
        vec![
            sample(0.0, Some(100.0), None),
            sample(1.0, None, None),
            sample(2.0, None, None),
        ],
    )
    .unwrap();
    // Sample 2.0 carries no channel but still bounds the slice.
    let s = t.slice(0.5, 1.5).unwrap();
    assert_eq!(s.duration_secs(), 2.0);
    assert_eq!(s.samples().first().map(|x| x.timestamp), Some(0.0));
}
