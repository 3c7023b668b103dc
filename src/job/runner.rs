use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use rayon::prelude::*;

use crate::animation::heartbeat::{REST_PHASE, annotate};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{PulseError, PulseResult};
use crate::job::state::JobStatus;
use crate::render::backend::FrameRGBA;
use crate::render::compositor::{FrameCompositor, FrameKey, PreparedOverlay};
use crate::resample::resampler::{FrameValues, resample};
use crate::resample::window::RenderWindow;
use crate::telemetry::track::TelemetryTrack;

const MAX_REORDER_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

/// Progress reached once frame values are resolved.
pub const RESAMPLE_PROGRESS_END: f64 = 0.05;
/// Progress reached once every frame has been handed to the sink.
pub const RENDER_PROGRESS_END: f64 = 0.90;

/// Options controlling how a window is composited and streamed to a sink.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderOpts {
    /// Composite frames on a dedicated rayon pool.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Frames composited per batch before they are streamed to the encoder.
    pub chunk_size: usize,
    /// Bounded channel capacity between the compositor and the encoder thread.
    pub channel_capacity: usize,
    /// Reuse the previous frame when the displayed values are unchanged.
    pub static_frame_elision: bool,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            chunk_size: 64,
            channel_capacity: 4,
            static_frame_elision: true,
        }
    }
}

impl RenderOpts {
    pub fn validate(&self) -> PulseResult<()> {
        if self.threads == Some(0) {
            return Err(PulseError::validation("render 'threads' must be >= 1 when set"));
        }
        Ok(())
    }
}

/// Per-run statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderStats {
    /// Frames in the window.
    pub frames_total: u64,
    /// Frames actually composited.
    pub frames_rendered: u64,
    /// Frames reused from an identical earlier frame.
    pub frames_elided: u64,
}

/// Cooperative cancellation flag shared between a job handle and its worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> PulseResult<()> {
        if self.is_cancelled() {
            Err(PulseError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receives stage and progress updates from [`run_render`]. Called from the worker threads.
pub trait RenderObserver: Sync {
    fn stage(&self, _status: JobStatus, _message: &str) {}
    /// `progress` is in `[0, 1]` and never decreases within one run.
    fn progress(&self, _progress: f64, _frames_done: u64, _frames_total: u64) {}
}

/// Observer that ignores every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RenderObserver for NoopObserver {}

/// Resolve, composite and encode `window` of `track` into `sink`.
///
/// The sink receives frames in strictly increasing index order. On any error, including
/// cancellation, the sink is aborted before this returns.
#[tracing::instrument(skip_all, fields(start = window.start_secs, end = window.end_secs))]
pub fn run_render(
    track: &TelemetryTrack,
    window: &RenderWindow,
    overlay: Arc<PreparedOverlay>,
    sink: &mut dyn FrameSink,
    opts: &RenderOpts,
    cancel: &CancelToken,
    observer: &dyn RenderObserver,
) -> PulseResult<RenderStats> {
    let res = run_render_inner(track, window, overlay, sink, opts, cancel, observer);
    if let Err(e) = &res {
        sink.abort();
        if e.is_cancelled() {
            tracing::info!("render cancelled");
        } else {
            tracing::warn!(error = %e, "render failed");
        }
    }
    res
}

fn run_render_inner(
    track: &TelemetryTrack,
    window: &RenderWindow,
    overlay: Arc<PreparedOverlay>,
    sink: &mut dyn FrameSink,
    opts: &RenderOpts,
    cancel: &CancelToken,
    observer: &dyn RenderObserver,
) -> PulseResult<RenderStats> {
    opts.validate()?;
    if overlay.canvas() != window.canvas {
        return Err(PulseError::validation(format!(
            "overlay prepared for {}x{} but window is {}x{}",
            overlay.canvas().width,
            overlay.canvas().height,
            window.canvas.width,
            window.canvas.height
        )));
    }

    cancel.check()?;
    observer.stage(JobStatus::Resampling, "Resampling telemetry");
    let mut frames = resample(track, window)?;
    annotate(&mut frames, window.fps, REST_PHASE);
    let total = frames.len() as u64;
    observer.progress(RESAMPLE_PROGRESS_END, 0, total);

    cancel.check()?;
    observer.stage(JobStatus::Rendering, "Rendering frames");

    let cfg = SinkConfig {
        width: window.canvas.width,
        height: window.canvas.height,
        fps: window.fps,
    };

    let cap = opts.channel_capacity.max(1);
    let max_chunk_by_mem = (MAX_REORDER_BUFFER_BYTES / (window.canvas.rgba8_len() as u64).max(1)).max(1);
    let chunk_size = (opts.chunk_size.max(1) as u64)
        .min(max_chunk_by_mem)
        .min(total.max(1));
    let chunk_size = usize::try_from(chunk_size).unwrap_or(1);

    let pool = if opts.parallel {
        Some(build_thread_pool(opts.threads)?)
    } else {
        None
    };

    std::thread::scope(|scope| -> PulseResult<RenderStats> {
        let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
        let sink_ref: &mut dyn FrameSink = sink;

        let enc = scope.spawn(move || -> PulseResult<()> {
            sink_ref.begin(cfg)?;

            let mut next = 0u64;
            let mut pending = HashMap::<u64, Arc<FrameRGBA>>::new();
            while next < total {
                cancel.check()?;
                let frame = match pending.remove(&next) {
                    Some(frame) => frame,
                    None => {
                        let msg = rx.recv().map_err(|_| {
                            // The producer only hangs up early when it stopped.
                            if cancel.is_cancelled() {
                                PulseError::Cancelled
                            } else {
                                PulseError::render("frame producer stopped before the last frame")
                            }
                        })?;
                        pending.insert(msg.idx.0, msg.frame);
                        continue;
                    }
                };
                sink_ref.push_frame(FrameIndex(next), &frame)?;
                next += 1;
                let band = RENDER_PROGRESS_END - RESAMPLE_PROGRESS_END;
                observer.progress(
                    RESAMPLE_PROGRESS_END + band * next as f64 / total as f64,
                    next,
                    total,
                );
            }

            // A cancel requested before the stage change still applies; after it, none does.
            observer.stage(JobStatus::Encoding, "Finalizing video");
            cancel.check()?;
            sink_ref.end()?;
            observer.progress(1.0, total, total);
            Ok(())
        });

        let mut stats = RenderStats {
            frames_total: total,
            ..RenderStats::default()
        };
        let produce_res = produce(
            &frames,
            &overlay,
            pool.as_ref(),
            chunk_size,
            opts.static_frame_elision,
            cancel,
            &tx,
            &mut stats,
        );

        drop(tx);
        let enc_res = enc
            .join()
            .map_err(|_| PulseError::encoding("encoder thread panicked"))?;

        match produce_res {
            Ok(()) => enc_res?,
            // A vanished encoder carries the real error.
            Err(ProduceStop::EncoderGone) => {
                enc_res?;
                return Err(PulseError::encoding("encoder thread is not accepting frames"));
            }
            Err(ProduceStop::Failed(e)) => {
                if let Err(enc_err) = enc_res
                    && enc_err.is_cancelled()
                {
                    return Err(enc_err);
                }
                return Err(e);
            }
        }

        tracing::info!(
            frames_total = stats.frames_total,
            frames_rendered = stats.frames_rendered,
            frames_elided = stats.frames_elided,
            "render finished"
        );
        Ok(stats)
    })
}

#[derive(Debug)]
struct FrameMsg {
    idx: FrameIndex,
    frame: Arc<FrameRGBA>,
}

enum ProduceStop {
    EncoderGone,
    Failed(PulseError),
}

impl From<PulseError> for ProduceStop {
    fn from(e: PulseError) -> Self {
        Self::Failed(e)
    }
}

#[allow(clippy::too_many_arguments)]
fn produce(
    frames: &[FrameValues],
    overlay: &Arc<PreparedOverlay>,
    pool: Option<&rayon::ThreadPool>,
    chunk_size: usize,
    elide: bool,
    cancel: &CancelToken,
    tx: &mpsc::SyncSender<FrameMsg>,
    stats: &mut RenderStats,
) -> Result<(), ProduceStop> {
    let mut sequential = match pool {
        Some(_) => None,
        None => Some(FrameCompositor::new(overlay.clone())?),
    };
    let mut last: Option<(FrameKey, Arc<FrameRGBA>)> = None;

    for chunk in frames.chunks(chunk_size) {
        cancel.check()?;

        // Map every frame of the chunk onto the first frame with the same displayed values.
        let mut uniq = Vec::<usize>::new();
        let mut map = Vec::<usize>::with_capacity(chunk.len());
        let mut seen = HashMap::<FrameKey, usize>::new();
        let keys: Vec<FrameKey> = chunk.iter().map(|v| overlay.frame_key(v)).collect();
        for (i, key) in keys.iter().enumerate() {
            if !elide {
                uniq.push(i);
                map.push(uniq.len() - 1);
                continue;
            }
            let u = *seen.entry(key.clone()).or_insert_with(|| {
                uniq.push(i);
                uniq.len() - 1
            });
            map.push(u);
        }

        let rendered: Vec<Arc<FrameRGBA>> = match (pool, sequential.as_mut()) {
            (Some(pool), _) => {
                render_unique_parallel(pool, overlay, chunk, &uniq, &keys, &last, cancel)?
            }
            (None, Some(comp)) => {
                let mut out = Vec::with_capacity(uniq.len());
                for &i in &uniq {
                    cancel.check()?;
                    out.push(reuse_or_render(comp, &chunk[i], &keys[i], &last)?);
                }
                out
            }
            (None, None) => return Err(PulseError::render("no compositor available").into()),
        };
        stats.frames_rendered += rendered
            .iter()
            .filter(|f| !last.as_ref().is_some_and(|(_, l)| Arc::ptr_eq(l, *f)))
            .count() as u64;

        for (i, v) in chunk.iter().enumerate() {
            tx.send(FrameMsg {
                idx: v.index,
                frame: rendered[map[i]].clone(),
            })
            .map_err(|_| ProduceStop::EncoderGone)?;
        }

        if elide
            && let (Some(key), Some(frame)) = (keys.last(), rendered.get(map[chunk.len() - 1]))
        {
            last = Some((key.clone(), frame.clone()));
        }
    }

    stats.frames_elided = stats.frames_total.saturating_sub(stats.frames_rendered);
    Ok(())
}

/// Reuse the last frame of the previous chunk when the key is unchanged.
fn reuse_or_render(
    comp: &mut FrameCompositor,
    v: &FrameValues,
    key: &FrameKey,
    last: &Option<(FrameKey, Arc<FrameRGBA>)>,
) -> PulseResult<Arc<FrameRGBA>> {
    if let Some((last_key, frame)) = last
        && last_key == key
    {
        return Ok(frame.clone());
    }
    Ok(Arc::new(comp.render(v)?))
}

fn render_unique_parallel(
    pool: &rayon::ThreadPool,
    overlay: &Arc<PreparedOverlay>,
    chunk: &[FrameValues],
    uniq: &[usize],
    keys: &[FrameKey],
    last: &Option<(FrameKey, Arc<FrameRGBA>)>,
    cancel: &CancelToken,
) -> PulseResult<Vec<Arc<FrameRGBA>>> {
    let rendered = pool.install(|| {
        uniq.par_iter()
            .map_init(
                || FrameCompositor::new(overlay.clone()),
                |comp, &i| -> PulseResult<Arc<FrameRGBA>> {
                    cancel.check()?;
                    let comp = comp
                        .as_mut()
                        .map_err(|e| PulseError::render(format!("compositor setup failed: {e}")))?;
                    reuse_or_render(comp, &chunk[i], &keys[i], last)
                },
            )
            .collect::<Vec<_>>()
    });
    rendered.into_iter().collect()
}

fn build_thread_pool(threads: Option<usize>) -> PulseResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(PulseError::validation("render 'threads' must be >= 1 when set"));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PulseError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/job/runner.rs"]
mod tests;
