//! Pipeline configuration loaded from JSON.
//!
//! Every section defaults, so a partial file such as `{"encode": {"crf": 18}}` is valid.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::ffmpeg::FfmpegSinkOpts;
use crate::foundation::error::{PulseError, PulseResult};
use crate::job::runner::RenderOpts;
use crate::render::compositor::OverlayStyle;
use crate::telemetry::sanitize::SanitizeOpts;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sanitize: SanitizeOpts,
    pub style: OverlayStyle,
    pub render: RenderOpts,
    pub encode: EncodeOpts,
    pub jobs: JobOpts,
}

/// libx264 settings for the MP4 output.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeOpts {
    pub overwrite: bool,
    pub crf: u8,
    pub preset: String,
}

impl Default for EncodeOpts {
    fn default() -> Self {
        Self {
            overwrite: true,
            crf: 20,
            preset: "veryfast".to_string(),
        }
    }
}

impl EncodeOpts {
    pub fn validate(&self) -> PulseResult<()> {
        if self.crf > 51 {
            return Err(PulseError::validation(format!(
                "encode crf must be in 0..=51, got {}",
                self.crf
            )));
        }
        if self.preset.is_empty() || !self.preset.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(PulseError::validation(format!(
                "encode preset '{}' is not a libx264 preset name",
                self.preset
            )));
        }
        Ok(())
    }

    /// Sink options writing to `out_path` over `background`.
    pub fn sink_opts(&self, out_path: impl Into<PathBuf>, background: [u8; 4]) -> FfmpegSinkOpts {
        FfmpegSinkOpts {
            overwrite: self.overwrite,
            bg_rgba: background,
            crf: self.crf,
            preset: self.preset.clone(),
            ..FfmpegSinkOpts::new(out_path)
        }
    }
}

/// Job bookkeeping.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JobOpts {
    /// Directory receiving `<job id>.mp4` when a request names no output path.
    pub output_dir: PathBuf,
    /// Seconds a finished job stays queryable before `reap_expired` drops it.
    pub retention_secs: u64,
}

impl Default for JobOpts {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("renders"),
            retention_secs: 3600,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file.
    pub fn from_path(path: &Path) -> PulseResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> PulseResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| PulseError::validation(format!("config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PulseResult<()> {
        self.sanitize.validate()?;
        self.style.validate()?;
        self.render.validate()?;
        self.encode.validate()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
