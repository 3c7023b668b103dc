use std::sync::mpsc;

use super::*;
use crate::encode::sink::{InMemorySink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::render::backend::FrameRGBA;
use crate::telemetry::track::Sample;

fn ride(secs: u32) -> TelemetryTrack {
    let start = chrono::DateTime::from_timestamp(1_714_557_600, 0).unwrap();
    let samples = (0..=secs)
        .map(|t| Sample {
            power_watts: Some(250.0),
            heart_rate_bpm: Some(150.0),
            ..Sample::at(f64::from(t))
        })
        .collect();
    TelemetryTrack::new(start, samples).unwrap()
}

fn manager(retention_secs: u64) -> JobManager {
    let mut cfg = PipelineConfig::default();
    cfg.jobs.retention_secs = retention_secs;
    JobManager::new(cfg, OverlayAssets::builtin()).unwrap()
}

fn small_request(track: TrackRef, start: f64, end: f64) -> RenderRequest {
    RenderRequest {
        fps: 10,
        width: 160,
        height: 90,
        ..RenderRequest::new(track, start, end)
    }
}

/// In-memory sink whose contents stay reachable after the job owns it.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<InMemorySink>>);

impl FrameSink for SharedSink {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        self.0.lock().unwrap().begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        self.0.lock().unwrap().push_frame(idx, frame)
    }

    fn end(&mut self) -> PulseResult<()> {
        self.0.lock().unwrap().end()
    }

    fn abort(&mut self) {
        self.0.lock().unwrap().abort()
    }
}

/// Blocks inside the first push until released.
struct GateSink {
    shared: SharedSink,
    started: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl FrameSink for GateSink {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        self.shared.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        self.shared.push_frame(idx, frame)?;
        if idx.0 == 0 {
            let _ = self.started.send(());
            let _ = self.release.recv();
        }
        Ok(())
    }

    fn end(&mut self) -> PulseResult<()> {
        self.shared.end()
    }

    fn abort(&mut self) {
        self.shared.abort()
    }
}

struct FailingSink;

impl FrameSink for FailingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> PulseResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _idx: FrameIndex, _frame: &FrameRGBA) -> PulseResult<()> {
        Err(PulseError::encoding("disk full"))
    }

    fn end(&mut self) -> PulseResult<()> {
        Ok(())
    }
}

#[test]
fn registered_track_renders_to_completion() {
    let m = manager(3600);
    let tid = m.register_track(ride(120));
    let sink = SharedSink::default();
    let id = m
        .submit_with_sink(
            small_request(TrackRef::Id(tid), 30.0, 32.0),
            Box::new(sink.clone()),
        )
        .unwrap();

    let snap = m.wait(id).unwrap();
    assert_eq!(snap.status, JobStatus::Succeeded);
    assert_eq!(snap.progress, 1.0);
    assert_eq!((snap.frames_done, snap.frames_total), (20, 20));
    assert!(snap.error.is_none());

    let inner = sink.0.lock().unwrap();
    assert!(inner.is_finished());
    assert_eq!(inner.frames().len(), 20);
    drop(inner);

    assert_eq!(m.take_result(id).unwrap().status, JobStatus::Succeeded);
    assert!(m.status(id).is_none());
    assert!(m.take_result(id).is_none());
}

#[test]
fn request_errors_surface_before_a_job_exists() {
    let m = manager(3600);
    let tid = m.register_track(ride(120));

    let err = m
        .submit(small_request(TrackRef::Id(tid), 110.0, 125.0))
        .unwrap_err();
    assert!(matches!(err, PulseError::InvalidWindow(_)));

    let mut bad = small_request(TrackRef::Id(tid), 10.0, 20.0);
    bad.rider_weight_kg = 0.0;
    assert!(matches!(m.submit(bad).unwrap_err(), PulseError::Validation(_)));

    let unknown = TrackRef::Id(TrackId(uuid::Uuid::new_v4()));
    assert!(matches!(
        m.submit(small_request(unknown, 0.0, 1.0)).unwrap_err(),
        PulseError::Validation(_)
    ));
    assert!(m.jobs().is_empty());
}

#[test]
fn cancelled_job_reports_no_output() {
    let m = manager(3600);
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let shared = SharedSink::default();
    let sink = GateSink {
        shared: shared.clone(),
        started: started_tx,
        release: release_rx,
    };
    let mut req = small_request(TrackRef::Inline(Arc::new(ride(120))), 0.0, 60.0);
    req.output_path = Some(PathBuf::from("/tmp/never-written.mp4"));
    let id = m.submit_with_sink(req, Box::new(sink)).unwrap();

    started_rx.recv().unwrap();
    assert_eq!(m.status(id).unwrap().status, JobStatus::Rendering);
    assert!(m.take_result(id).is_none());
    assert!(m.cancel(id));
    release_tx.send(()).unwrap();

    let snap = m.wait(id).unwrap();
    assert_eq!(snap.status, JobStatus::Cancelled);
    assert!(snap.output_path.is_none());
    assert!(snap.error.is_none());
    assert!(shared.0.lock().unwrap().is_aborted());
    assert!(!m.cancel(id));
}

#[test]
fn sink_failure_marks_job_failed() {
    let m = manager(3600);
    let req = small_request(TrackRef::Inline(Arc::new(ride(60))), 0.0, 5.0);
    let id = m.submit_with_sink(req, Box::new(FailingSink)).unwrap();
    let snap = m.wait(id).unwrap();
    assert_eq!(snap.status, JobStatus::Failed);
    assert!(snap.error.as_deref().unwrap().contains("disk full"));
    assert!(snap.output_path.is_none());
}

#[test]
fn finished_jobs_are_reaped_after_retention() {
    let m = manager(0);
    let req = small_request(TrackRef::Inline(Arc::new(ride(60))), 0.0, 1.0);
    let id = m.submit_with_sink(req, Box::new(SharedSink::default())).unwrap();
    m.wait(id).unwrap();
    assert_eq!(m.jobs().len(), 1);
    assert_eq!(m.reap_expired(), 1);
    assert!(m.status(id).is_none());
}

#[test]
fn retention_keeps_recent_jobs() {
    let m = manager(3600);
    let req = small_request(TrackRef::Inline(Arc::new(ride(60))), 0.0, 1.0);
    let id = m.submit_with_sink(req, Box::new(SharedSink::default())).unwrap();
    m.wait(id).unwrap();
    assert_eq!(m.reap_expired(), 0);
    assert!(m.status(id).is_some());
}

#[test]
fn wait_timeout_returns_current_state() {
    let m = manager(3600);
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let sink = GateSink {
        shared: SharedSink::default(),
        started: started_tx,
        release: release_rx,
    };
    let req = small_request(TrackRef::Inline(Arc::new(ride(60))), 0.0, 2.0);
    let id = m.submit_with_sink(req, Box::new(sink)).unwrap();
    started_rx.recv().unwrap();

    let snap = m.wait_timeout(id, Duration::from_millis(20)).unwrap();
    assert!(!snap.status.is_terminal());
    release_tx.send(()).unwrap();
    assert_eq!(m.wait(id).unwrap().status, JobStatus::Succeeded);
}

#[test]
fn removed_track_can_no_longer_be_submitted() {
    let m = manager(3600);
    let tid = m.register_track(ride(30));
    assert!(m.track(tid).is_some());
    assert!(m.remove_track(tid));
    assert!(!m.remove_track(tid));
    assert!(matches!(
        m.submit(small_request(TrackRef::Id(tid), 0.0, 1.0)).unwrap_err(),
        PulseError::Validation(_)
    ));
}

#[test]
fn submitting_reaps_jobs_past_retention() {
    let m = manager(0);
    let track = TrackRef::Inline(Arc::new(ride(60)));
    let first = m
        .submit_with_sink(
            small_request(track.clone(), 0.0, 1.0),
            Box::new(SharedSink::default()),
        )
        .unwrap();
    m.wait(first).unwrap();

    let second = m
        .submit_with_sink(small_request(track, 0.0, 1.0), Box::new(SharedSink::default()))
        .unwrap();
    assert!(m.status(first).is_none());
    assert!(m.status(second).is_some());
}

/// Blocks inside `end` until released.
struct SlowFinishSink {
    finishing: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl FrameSink for SlowFinishSink {
    fn begin(&mut self, _cfg: SinkConfig) -> PulseResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _idx: FrameIndex, _frame: &FrameRGBA) -> PulseResult<()> {
        Ok(())
    }

    fn end(&mut self) -> PulseResult<()> {
        let _ = self.finishing.send(());
        let _ = self.release.recv();
        Ok(())
    }
}

#[test]
fn encoding_stage_cannot_be_cancelled() {
    let m = manager(3600);
    let (finishing_tx, finishing_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let sink = SlowFinishSink {
        finishing: finishing_tx,
        release: release_rx,
    };
    let req = small_request(TrackRef::Inline(Arc::new(ride(60))), 0.0, 1.0);
    let id = m.submit_with_sink(req, Box::new(sink)).unwrap();

    finishing_rx.recv().unwrap();
    assert_eq!(m.status(id).unwrap().status, JobStatus::Encoding);
    assert!(!m.cancel(id));
    release_tx.send(()).unwrap();
    assert_eq!(m.wait(id).unwrap().status, JobStatus::Succeeded);
}
