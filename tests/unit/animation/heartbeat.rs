use super::*;
use crate::foundation::core::FrameIndex;

fn frames(hr: &[Option<f64>]) -> Vec<FrameValues> {
    hr.iter()
        .enumerate()
        .map(|(i, hr)| FrameValues {
            index: FrameIndex(i as u64),
            time: i as f64,
            power_watts: Some(200.0),
            watts_per_kg: Some(200.0 / 70.0),
            heart_rate_bpm: *hr,
            cadence_rpm: None,
            heartbeat_phase: 0.0,
        })
        .collect()
}

#[test]
fn phase_advances_at_heart_rate() {
    // 120 bpm at 8 fps is a quarter cycle per frame.
    let mut f = frames(&[Some(120.0); 6]);
    annotate(&mut f, Fps::integer(8).unwrap(), 0.0);
    let phases: Vec<f64> = f.iter().map(|f| f.heartbeat_phase).collect();
    assert_eq!(phases, vec![0.0, 0.25, 0.5, 0.75, 0.0, 0.25]);
}

#[test]
fn phase_stays_in_unit_interval() {
    let mut f = frames(&[Some(187.0); 500]);
    annotate(&mut f, Fps::integer(30).unwrap(), 0.9);
    assert_eq!(f[0].heartbeat_phase, 0.9);
    assert!(
        f.iter()
            .all(|f| (0.0..1.0).contains(&f.heartbeat_phase))
    );
}

#[test]
fn cycles_per_second_match_bpm() {
    let fps = Fps::integer(30).unwrap();
    let mut acc = HeartbeatAccumulator::new(fps, 0.0);
    let mut wraps = 0;
    let mut prev = acc.phase();
    for _ in 0..(30 * 60) {
        let p = acc.advance(Some(90.0));
        if p < prev {
            wraps += 1;
        }
        prev = p;
    }
    // One minute at 90 bpm.
    assert!((89..=90).contains(&wraps), "wraps = {wraps}");
}

#[test]
fn missing_heart_rate_rests() {
    let mut f = frames(&[None; 10]);
    annotate(&mut f, Fps::integer(24).unwrap(), 0.4);
    assert!(f.iter().all(|f| f.heartbeat_phase == REST_PHASE));
    let style = PulseStyle::default();
    assert!(
        f.iter()
            .all(|f| pulse_scale(f.heartbeat_phase, &style) == 1.0)
    );
}

#[test]
fn gap_in_heart_rate_holds_phase() {
    let mut acc = HeartbeatAccumulator::new(Fps::integer(10).unwrap(), 0.3);
    assert_eq!(acc.advance(None), 0.3);
    assert_eq!(acc.advance(Some(f64::NAN)), 0.3);
}

#[test]
fn pulse_peaks_inside_beat_and_rests_outside() {
    let style = PulseStyle::default();
    assert_eq!(pulse_scale(REST_PHASE, &style), 1.0);
    assert_eq!(pulse_scale(0.5, &style), 1.0);
    assert_eq!(pulse_scale(0.99, &style), 1.0);

    let peak = (0..100)
        .map(|i| pulse_scale(f64::from(i) / 100.0 * style.beat_fraction, &style))
        .fold(1.0_f64, f64::max);
    assert!(peak > 1.14 && peak <= 1.0 + style.strength + 1e-12);
}

#[test]
fn pulse_style_validation() {
    assert!(PulseStyle::default().validate().is_ok());
    let bad = PulseStyle {
        beat_fraction: 0.0,
        ..PulseStyle::default()
    };
    assert!(bad.validate().is_err());
}
