use super::*;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::PulseError;
use crate::telemetry::track::Sample;

fn start() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(1_714_557_600, 0).unwrap()
}

fn window(start_secs: f64, end_secs: f64, fps: u32, weight_kg: f64) -> RenderWindow {
    RenderWindow::new(
        start_secs,
        end_secs,
        Fps::integer(fps).unwrap(),
        Canvas {
            width: 640,
            height: 360,
        },
        weight_kg,
    )
    .unwrap()
}

fn point(t: f64, power: Option<f64>, hr: Option<f64>) -> Sample {
    Sample {
        power_watts: power,
        heart_rate_bpm: hr,
        ..Sample::at(t)
    }
}

fn steady_ride(secs: u32) -> TelemetryTrack {
    let samples = (0..=secs)
        .map(|t| point(f64::from(t), Some(210.0), Some(140.0)))
        .collect();
    TelemetryTrack::new(start(), samples).unwrap()
}

#[test]
fn steady_ride_minute_at_24fps() {
    let track = steady_ride(600);
    let frames = resample(&track, &window(60.0, 120.0, 24, 70.0)).unwrap();
    assert_eq!(frames.len(), 1440);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.index, FrameIndex(i as u64));
        assert!(f.time >= 60.0 && f.time < 120.0);
        assert_eq!(f.watts_per_kg, Some(3.0));
        assert_eq!(f.heart_rate_bpm, Some(140.0));
        assert_eq!(f.heartbeat_phase, 0.0);
    }
    assert_eq!(frames[0].time, 60.0);
}

#[test]
fn interpolates_between_samples() {
    let track = TelemetryTrack::new(
        start(),
        vec![
            point(0.0, Some(100.0), None),
            point(1.0, None, Some(130.0)),
            point(2.0, Some(200.0), None),
        ],
    )
    .unwrap();
    let frames = resample(&track, &window(0.0, 2.0, 2, 50.0)).unwrap();
    let power: Vec<Option<f64>> = frames.iter().map(|f| f.power_watts).collect();
    assert_eq!(
        power,
        vec![Some(100.0), Some(125.0), Some(150.0), Some(175.0)]
    );
    // A single heart-rate reading is held across the whole window.
    assert!(frames.iter().all(|f| f.heart_rate_bpm == Some(130.0)));
    assert!(frames.iter().all(|f| f.cadence_rpm.is_none()));
    assert_eq!(frames[1].watts_per_kg, Some(2.5));
}

#[test]
fn window_outside_primary_coverage_is_invalid() {
    let track = TelemetryTrack::new(
        start(),
        vec![
            point(0.0, Some(100.0), None),
            point(2.0, Some(200.0), None),
            point(10.0, None, Some(120.0)),
        ],
    )
    .unwrap();
    let err = resample(&track, &window(5.0, 8.0, 10, 70.0)).unwrap_err();
    assert!(matches!(err, PulseError::InvalidWindow(_)));

    // Partial overlap holds the last power value.
    let frames = resample(&track, &window(1.0, 4.0, 1, 70.0)).unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].power_watts, Some(200.0));
}

#[test]
fn short_window_yields_one_frame() {
    let track = steady_ride(10);
    let frames = resample(&track, &window(0.0, 0.01, 24, 70.0)).unwrap();
    assert_eq!(frames.len(), 1);
}

#[test]
fn resampling_is_deterministic() {
    let track = TelemetryTrack::new(
        start(),
        vec![
            point(0.0, Some(180.0), Some(120.0)),
            point(0.7, Some(260.0), Some(125.0)),
            point(3.1, Some(90.0), Some(150.0)),
        ],
    )
    .unwrap();
    let w = window(0.2, 3.0, 30, 68.5);
    assert_eq!(resample(&track, &w).unwrap(), resample(&track, &w).unwrap());
}

#[test]
fn window_bounds_are_checked_against_track() {
    let track = steady_ride(600);
    let w = window(590.0, 605.0, 24, 70.0);
    assert!(matches!(
        w.check_within(&track).unwrap_err(),
        PulseError::InvalidWindow(_)
    ));
    assert!(window(0.0, 600.0, 24, 70.0).check_within(&track).is_ok());
}

#[test]
fn rejects_bad_window_parameters() {
    let fps = Fps::integer(24).unwrap();
    let canvas = Canvas {
        width: 640,
        height: 360,
    };
    assert!(RenderWindow::new(5.0, 5.0, fps, canvas, 70.0).is_err());
    assert!(RenderWindow::new(0.0, 5.0, fps, canvas, 0.0).is_err());
    assert!(RenderWindow::new(0.0, f64::NAN, fps, canvas, 70.0).is_err());
}

#[test]
fn absolute_bounds_map_to_track_time() {
    let track = steady_ride(600);
    let w = RenderWindow::from_absolute(
        &track,
        start() + chrono::TimeDelta::seconds(60),
        start() + chrono::TimeDelta::seconds(90),
        Fps::integer(25).unwrap(),
        Canvas {
            width: 1280,
            height: 720,
        },
        70.0,
    )
    .unwrap();
    assert_eq!(w.start_secs, 60.0);
    assert_eq!(w.end_secs, 90.0);
    assert_eq!(w.frame_count(), 750);
}

#[test]
fn window_longer_than_track_is_rejected_before_allocating() {
    let track = steady_ride(60);
    let err = resample(&track, &window(0.0, 1e12, 30, 70.0)).unwrap_err();
    assert!(matches!(err, PulseError::InvalidWindow(_)));
}
