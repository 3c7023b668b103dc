use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::backend::FrameRGBA;

/// Stream parameters handed to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Consumer of composited frames.
///
/// Ordering contract: `push_frame` is called with strictly increasing [`FrameIndex`] values.
/// Exactly one of `end` or `abort` closes a started sink.
pub trait FrameSink: Send {
    /// Open the output. Called once before any frame.
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()>;
    /// Append one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()>;
    /// Finalize the output after the last frame.
    fn end(&mut self) -> PulseResult<()>;
    /// Discard everything written so far. Must be safe to call in any state.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    finished: bool,
    aborted: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        if self.cfg.is_none() {
            return Err(PulseError::encoding("in-memory sink not started"));
        }
        if let Some((last, _)) = self.frames.last()
            && idx.0 <= last.0
        {
            return Err(PulseError::encoding(format!(
                "out-of-order frame index {} after {}",
                idx.0, last.0
            )));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> PulseResult<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        (**self).begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        (**self).push_frame(idx, frame)
    }

    fn end(&mut self) -> PulseResult<()> {
        (**self).end()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
