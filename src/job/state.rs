use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Lifecycle of a render job. Variants are declared in lifecycle order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Resampling,
    Rendering,
    Encoding,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Resampling => "resampling",
            Self::Rendering => "rendering",
            Self::Encoding => "encoding",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job for callers.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct JobSnapshot {
    pub id: uuid::Uuid,
    pub status: JobStatus,
    /// Overall completion in `[0, 1]`, never decreasing.
    pub progress: f64,
    pub message: String,
    /// Set iff `status == Failed`.
    pub error: Option<String>,
    /// Set iff `status == Succeeded` and the job wrote a file.
    pub output_path: Option<PathBuf>,
    pub frames_total: u64,
    pub frames_done: u64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Mutable job record guarded by the manager's lock. Enforces forward-only transitions.
#[derive(Clone, Debug)]
pub(crate) struct JobState {
    snap: JobSnapshot,
}

impl JobState {
    pub(crate) fn new(id: uuid::Uuid) -> Self {
        Self {
            snap: JobSnapshot {
                id,
                status: JobStatus::Queued,
                progress: 0.0,
                message: "Queued".to_string(),
                error: None,
                output_path: None,
                frames_total: 0,
                frames_done: 0,
                created_at: Utc::now(),
                finished_at: None,
            },
        }
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        self.snap.clone()
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.snap.status
    }

    pub(crate) fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.snap.finished_at
    }

    /// Move to a later non-terminal stage. Returns `false` for backward or post-terminal moves.
    pub(crate) fn enter(&mut self, status: JobStatus, message: impl Into<String>) -> bool {
        if status.is_terminal() || self.snap.status.is_terminal() || status < self.snap.status {
            return false;
        }
        self.snap.status = status;
        self.snap.message = message.into();
        true
    }

    /// Raise progress; lower values are ignored.
    pub(crate) fn set_progress(&mut self, progress: f64, frames_done: u64, frames_total: u64) {
        if self.snap.status.is_terminal() || !progress.is_finite() {
            return;
        }
        self.snap.progress = self.snap.progress.max(progress.clamp(0.0, 1.0));
        self.snap.frames_total = frames_total;
        self.snap.frames_done = self.snap.frames_done.max(frames_done);
        if self.snap.status == JobStatus::Rendering && frames_total > 0 {
            self.snap.message = format!("Rendering frame {}/{}", self.snap.frames_done, frames_total);
        }
    }

    pub(crate) fn succeed(&mut self, output_path: Option<PathBuf>) -> bool {
        self.finish(JobStatus::Succeeded, "Done".to_string(), |s| {
            s.progress = 1.0;
            s.output_path = output_path;
        })
    }

    pub(crate) fn fail(&mut self, error: String) -> bool {
        let message = format!("Failed: {error}");
        self.finish(JobStatus::Failed, message, |s| s.error = Some(error))
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.finish(JobStatus::Cancelled, "Cancelled".to_string(), |_| {})
    }

    fn finish(
        &mut self,
        status: JobStatus,
        message: String,
        apply: impl FnOnce(&mut JobSnapshot),
    ) -> bool {
        if self.snap.status.is_terminal() {
            return false;
        }
        self.snap.status = status;
        self.snap.message = message;
        self.snap.finished_at = Some(Utc::now());
        apply(&mut self.snap);
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/state.rs"]
mod tests;
