use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;

use crate::assets::store::OverlayAssets;
use crate::config::PipelineConfig;
use crate::encode::ffmpeg::FfmpegSink;
use crate::encode::sink::FrameSink;
use crate::foundation::error::{PulseError, PulseResult};
use crate::job::request::{RenderRequest, TrackId, TrackRef};
use crate::job::runner::{CancelToken, RenderObserver, RenderOpts, run_render};
use crate::job::state::{JobSnapshot, JobState, JobStatus};
use crate::render::compositor::PreparedOverlay;
use crate::resample::window::RenderWindow;
use crate::telemetry::track::TelemetryTrack;

/// Identifier of a submitted render job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct JobEntry {
    state: Mutex<JobState>,
    done: Condvar,
    cancel: CancelToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobEntry {
    fn lock(&self) -> MutexGuard<'_, JobState> {
        // A panicking observer cannot leave the state half-written; keep serving it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn join_worker(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("render worker panicked");
        }
    }
}

impl RenderObserver for JobEntry {
    fn stage(&self, status: JobStatus, message: &str) {
        self.lock().enter(status, message);
    }

    fn progress(&self, progress: f64, frames_done: u64, frames_total: u64) {
        self.lock().set_progress(progress, frames_done, frames_total);
    }
}

/// Everything a worker thread needs, validated before the job exists.
struct PreparedJob {
    track: Arc<TelemetryTrack>,
    window: RenderWindow,
    overlay: Arc<PreparedOverlay>,
    sink: Box<dyn FrameSink>,
    output_path: Option<PathBuf>,
}

/// Registry of telemetry tracks and render jobs. Each job runs on its own worker thread.
pub struct JobManager {
    config: PipelineConfig,
    assets: OverlayAssets,
    tracks: RwLock<HashMap<TrackId, Arc<TelemetryTrack>>>,
    jobs: Mutex<HashMap<JobId, Arc<JobEntry>>>,
}

impl JobManager {
    pub fn new(config: PipelineConfig, assets: OverlayAssets) -> PulseResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            assets,
            tracks: RwLock::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn register_track(&self, track: TelemetryTrack) -> TrackId {
        let id = TrackId::new();
        self.tracks_mut().insert(id, Arc::new(track));
        tracing::debug!(track = %id, "registered track");
        id
    }

    pub fn track(&self, id: TrackId) -> Option<Arc<TelemetryTrack>> {
        self.tracks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Forget a registered track. Running jobs keep their own slice.
    pub fn remove_track(&self, id: TrackId) -> bool {
        self.tracks_mut().remove(&id).is_some()
    }

    /// Validate `request` and start encoding it to MP4.
    ///
    /// The output goes to `request.output_path`, or `<output_dir>/<job id>.mp4`. All request
    /// errors are returned here, before any job exists. Finished jobs past their retention are
    /// reaped first.
    pub fn submit(&self, request: RenderRequest) -> PulseResult<JobId> {
        self.reap_expired();
        let id = JobId::new();
        let out = match &request.output_path {
            Some(p) => p.clone(),
            None => self.config.jobs.output_dir.join(format!("{id}.mp4")),
        };
        let sink = FfmpegSink::new(
            self.config
                .encode
                .sink_opts(&out, self.config.style.background),
        );
        let job = self.prepare(&request, Box::new(sink), Some(out))?;
        self.spawn(id, job)
    }

    /// Like [`JobManager::submit`] but streams frames into `sink`.
    pub fn submit_with_sink(
        &self,
        request: RenderRequest,
        sink: Box<dyn FrameSink>,
    ) -> PulseResult<JobId> {
        self.reap_expired();
        let output_path = request.output_path.clone();
        let job = self.prepare(&request, sink, output_path)?;
        self.spawn(JobId::new(), job)
    }

    pub fn status(&self, id: JobId) -> Option<JobSnapshot> {
        self.entry(id).map(|e| e.lock().snapshot())
    }

    /// Request cancellation. Returns `false` for unknown jobs and for jobs that are already
    /// finalizing (`Encoding`) or finished.
    pub fn cancel(&self, id: JobId) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        // Held across the flag write so the worker cannot enter `Encoding` in between.
        let state = entry.lock();
        if state.status() >= JobStatus::Encoding {
            return false;
        }
        entry.cancel.cancel();
        drop(state);
        tracing::info!(job = %id, "cancellation requested");
        true
    }

    /// Block until the job reaches a terminal state.
    pub fn wait(&self, id: JobId) -> Option<JobSnapshot> {
        let entry = self.entry(id)?;
        let mut state = entry.lock();
        while !state.status().is_terminal() {
            state = entry.done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        Some(state.snapshot())
    }

    /// Wait at most `timeout`; the snapshot may still be non-terminal.
    pub fn wait_timeout(&self, id: JobId, timeout: Duration) -> Option<JobSnapshot> {
        let entry = self.entry(id)?;
        let state = entry.lock();
        let (state, _) = entry
            .done
            .wait_timeout_while(state, timeout, |s| !s.status().is_terminal())
            .unwrap_or_else(|e| e.into_inner());
        Some(state.snapshot())
    }

    /// Remove a finished job and return its final snapshot. Running jobs are left in place.
    pub fn take_result(&self, id: JobId) -> Option<JobSnapshot> {
        let entry = {
            let mut jobs = self.jobs_mut();
            let terminal = jobs.get(&id)?.lock().status().is_terminal();
            if !terminal {
                return None;
            }
            jobs.remove(&id)?
        };
        entry.join_worker();
        let snap = entry.lock().snapshot();
        Some(snap)
    }

    /// Drop finished jobs older than the retention timeout. Returns how many were removed.
    ///
    /// Runs on every submit; call it directly to sweep an idle manager.
    pub fn reap_expired(&self) -> usize {
        let retention = self.config.jobs.retention_secs;
        let now = Utc::now();
        let expired: Vec<Arc<JobEntry>> = {
            let mut jobs = self.jobs_mut();
            let ids: Vec<JobId> = jobs
                .iter()
                .filter(|(_, e)| {
                    e.lock()
                        .finished_at()
                        .and_then(|t| u64::try_from(now.signed_duration_since(t).num_seconds()).ok())
                        .is_some_and(|age| age >= retention)
                })
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };
        for entry in &expired {
            entry.join_worker();
        }
        if !expired.is_empty() {
            tracing::debug!(reaped = expired.len(), "reaped expired jobs");
        }
        expired.len()
    }

    /// Snapshots of every known job, oldest first.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let mut out: Vec<JobSnapshot> = self
            .jobs_mut()
            .values()
            .map(|e| e.lock().snapshot())
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }

    /// Cancel every running job and wait for the workers to exit.
    pub fn shutdown(&self) {
        let entries: Vec<Arc<JobEntry>> = self.jobs_mut().values().cloned().collect();
        for entry in &entries {
            entry.cancel.cancel();
        }
        for entry in &entries {
            entry.join_worker();
        }
    }

    fn prepare(
        &self,
        request: &RenderRequest,
        sink: Box<dyn FrameSink>,
        output_path: Option<PathBuf>,
    ) -> PulseResult<PreparedJob> {
        let track = match &request.track {
            TrackRef::Inline(t) => t.clone(),
            TrackRef::Id(id) => self
                .track(*id)
                .ok_or_else(|| PulseError::validation(format!("unknown track {id}")))?,
        };
        let window = request.window(&track)?;
        let overlay = Arc::new(PreparedOverlay::new(
            window.canvas,
            self.config.style.clone(),
            &self.assets,
        )?);
        let slice = Arc::new(track.slice(window.start_secs, window.end_secs)?);
        Ok(PreparedJob {
            track: slice,
            window,
            overlay,
            sink,
            output_path,
        })
    }

    fn spawn(&self, id: JobId, job: PreparedJob) -> PulseResult<JobId> {
        let entry = Arc::new(JobEntry {
            state: Mutex::new(JobState::new(id.0)),
            done: Condvar::new(),
            cancel: CancelToken::new(),
            worker: Mutex::new(None),
        });
        let render_opts = self.config.render.clone();
        let worker_entry = entry.clone();

        // Register first so the job is visible as soon as the worker starts.
        self.jobs_mut().insert(id, entry.clone());
        let spawned = std::thread::Builder::new()
            .name(format!("pulseclip-job-{id}"))
            .spawn(move || run_job(id, job, &render_opts, &worker_entry))
            .context("spawn render worker thread");
        match spawned {
            Ok(handle) => {
                *entry.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                tracing::info!(job = %id, "job submitted");
                Ok(id)
            }
            Err(e) => {
                self.jobs_mut().remove(&id);
                Err(e.into())
            }
        }
    }

    fn entry(&self, id: JobId) -> Option<Arc<JobEntry>> {
        self.jobs_mut().get(&id).cloned()
    }

    fn jobs_mut(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobEntry>>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tracks_mut(&self) -> RwLockWriteGuard<'_, HashMap<TrackId, Arc<TelemetryTrack>>> {
        self.tracks.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(id: JobId, job: PreparedJob, opts: &RenderOpts, entry: &JobEntry) {
    let PreparedJob {
        track,
        window,
        overlay,
        mut sink,
        output_path,
    } = job;

    let res = run_render(
        &track,
        &window,
        overlay,
        sink.as_mut(),
        opts,
        &entry.cancel,
        entry,
    );
    // Release the encoder before publishing the outcome.
    drop(sink);

    let mut state = entry.lock();
    match res {
        Ok(stats) => {
            state.succeed(output_path);
            tracing::info!(job = %id, frames = stats.frames_total, "job succeeded");
        }
        Err(e) if e.is_cancelled() => {
            state.cancel();
            tracing::info!(job = %id, "job cancelled");
        }
        Err(e) => {
            tracing::warn!(job = %id, error = %e, "job failed");
            state.fail(e.to_string());
        }
    }
    drop(state);
    entry.done.notify_all();
}

#[cfg(test)]
#[path = "../../tests/unit/job/manager.rs"]
mod tests;
