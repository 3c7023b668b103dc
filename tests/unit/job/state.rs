use super::*;

fn state() -> JobState {
    JobState::new(uuid::Uuid::new_v4())
}

#[test]
fn starts_queued() {
    let s = state().snapshot();
    assert_eq!(s.status, JobStatus::Queued);
    assert_eq!(s.progress, 0.0);
    assert!(s.error.is_none() && s.output_path.is_none() && s.finished_at.is_none());
}

#[test]
fn stages_only_move_forward() {
    let mut s = state();
    assert!(s.enter(JobStatus::Resampling, "Resampling"));
    assert!(s.enter(JobStatus::Rendering, "Rendering"));
    assert!(!s.enter(JobStatus::Resampling, "again"));
    assert!(!s.enter(JobStatus::Succeeded, "not via enter"));
    assert_eq!(s.status(), JobStatus::Rendering);
}

#[test]
fn progress_never_decreases() {
    let mut s = state();
    s.enter(JobStatus::Rendering, "Rendering");
    s.set_progress(0.5, 10, 20);
    s.set_progress(0.3, 5, 20);
    s.set_progress(f64::NAN, 6, 20);
    let snap = s.snapshot();
    assert_eq!(snap.progress, 0.5);
    assert_eq!(snap.frames_done, 10);
    assert_eq!(snap.message, "Rendering frame 10/20");
}

#[test]
fn terminal_states_are_final() {
    let mut s = state();
    assert!(s.succeed(Some(PathBuf::from("/tmp/out.mp4"))));
    assert!(!s.fail("late".to_string()));
    assert!(!s.cancel());
    assert!(!s.enter(JobStatus::Encoding, "late"));
    s.set_progress(0.2, 0, 0);
    let snap = s.snapshot();
    assert_eq!(snap.status, JobStatus::Succeeded);
    assert_eq!(snap.progress, 1.0);
    assert_eq!(snap.output_path, Some(PathBuf::from("/tmp/out.mp4")));
    assert!(snap.finished_at.is_some());
}

#[test]
fn failure_carries_error_only() {
    let mut s = state();
    s.enter(JobStatus::Encoding, "Encoding");
    assert!(s.fail("encoding error: boom".to_string()));
    let snap = s.snapshot();
    assert_eq!(snap.error.as_deref(), Some("encoding error: boom"));
    assert!(snap.output_path.is_none());
    assert!(snap.message.starts_with("Failed"));
}

#[test]
fn cancel_from_queued() {
    let mut s = state();
    assert!(s.cancel());
    assert_eq!(s.status(), JobStatus::Cancelled);
    assert!(s.snapshot().output_path.is_none());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&JobStatus::Succeeded).unwrap(),
        "\"succeeded\""
    );
    assert!(JobStatus::Cancelled.is_terminal());
    assert!(!JobStatus::Encoding.is_terminal());
}
