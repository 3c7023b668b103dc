use super::*;

fn point(secs: i64, power: Option<f64>, hr: Option<f64>) -> RawPoint {
    RawPoint {
        time: DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
        power,
        hr,
        cadence: None,
        distance: None,
    }
}

#[test]
fn normalizes_to_zero_and_sorts() {
    let points = vec![
        point(10, Some(200.0), None),
        point(5, Some(100.0), None),
        point(7, Some(150.0), None),
    ];
    let mut report = ParseReport::default();
    let track = build_track(points, &SanitizeOpts::default(), &mut report).unwrap();

    let ts: Vec<f64> = track.samples().iter().map(|s| s.timestamp).collect();
    assert_eq!(ts, vec![0.0, 2.0, 5.0]);
    assert_eq!(track.samples()[0].power_watts, Some(100.0));
    assert_eq!(track.duration_secs(), 5.0);
}

#[test]
fn duplicate_timestamps_keep_last_value() {
    let points = vec![
        point(0, Some(100.0), None),
        point(1, Some(111.0), None),
        point(1, Some(222.0), None),
        point(2, Some(300.0), None),
    ];
    let mut report = ParseReport::default();
    let track = build_track(points, &SanitizeOpts::default(), &mut report).unwrap();

    assert_eq!(report.duplicates_merged, 1);
    assert_eq!(track.len(), 3);
    assert_eq!(track.samples()[1].power_watts, Some(222.0));
}

#[test]
fn implausible_readings_are_dropped_not_fatal() {
    let points = vec![
        point(0, Some(-50.0), Some(10.0)),
        point(1, Some(250.0), Some(300.0)),
        point(2, Some(260.0), Some(140.0)),
    ];
    let mut report = ParseReport::default();
    let track = build_track(points, &SanitizeOpts::default(), &mut report).unwrap();

    assert_eq!(report.dropped_power, 1);
    assert_eq!(report.dropped_heart_rate, 2);
    let s = track.samples();
    assert_eq!(s[0].power_watts, None);
    assert_eq!(s[0].heart_rate_bpm, None);
    assert_eq!(s[1].power_watts, Some(250.0));
    assert_eq!(s[1].heart_rate_bpm, None);
    assert_eq!(s[2].heart_rate_bpm, Some(140.0));
}

#[test]
fn heart_rate_range_is_configurable() {
    let opts = SanitizeOpts {
        hr_min_bpm: 40.0,
        hr_max_bpm: 200.0,
        ..SanitizeOpts::default()
    };
    let points = vec![point(0, None, Some(30.0)), point(1, None, Some(150.0))];
    let mut report = ParseReport::default();
    let track = build_track(points, &opts, &mut report).unwrap();
    assert_eq!(track.samples()[0].heart_rate_bpm, None);
    assert_eq!(track.samples()[1].heart_rate_bpm, Some(150.0));
}

#[test]
fn track_without_power_or_heart_rate_is_empty() {
    let mut p = point(0, None, None);
    p.cadence = Some(90.0);
    let mut report = ParseReport::default();
    let err = build_track(vec![p], &SanitizeOpts::default(), &mut report).unwrap_err();
    assert!(matches!(err, PulseError::EmptyTrack(_)));

    let err = build_track(Vec::new(), &SanitizeOpts::default(), &mut report).unwrap_err();
    assert!(matches!(err, PulseError::EmptyTrack(_)));
}

#[test]
fn speed_is_derived_from_distance() {
    let mut a = point(0, Some(100.0), None);
    a.distance = Some(0.0);
    let mut b = point(2, Some(100.0), None);
    b.distance = Some(20.0);
    let mut report = ParseReport::default();
    let track = build_track(vec![a, b], &SanitizeOpts::default(), &mut report).unwrap();
    assert_eq!(track.samples()[0].speed_mps, Some(0.0));
    assert_eq!(track.samples()[1].speed_mps, Some(10.0));
}

#[test]
fn opts_validation() {
    assert!(SanitizeOpts::default().validate().is_ok());
    let bad = SanitizeOpts {
        hr_min_bpm: 200.0,
        hr_max_bpm: 100.0,
        ..SanitizeOpts::default()
    };
    assert!(bad.validate().is_err());
}

#[test]
fn time_parsing_accepts_common_forms() {
    assert!(parse_time("2024-05-01T10:00:00Z").is_some());
    assert!(parse_time("2024-05-01T10:00:00.250Z").is_some());
    assert!(parse_time("2024-05-01T12:00:00+02:00").is_some());
    assert!(parse_time("2024-05-01T10:00:00").is_some());
    assert!(parse_time("yesterday").is_none());
    assert_eq!(parse_number(" 42 "), Some(42.0));
    assert_eq!(parse_number("NaN"), None);
}
