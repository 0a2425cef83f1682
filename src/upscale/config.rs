//! LDSR `project.yaml` model configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Diffusion model parameters read from `model.params`. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LdsrModelSpec {
    /// First value of the linear beta schedule.
    #[serde(default = "default_linear_start")]
    pub linear_start: f64,
    /// Last value of the linear beta schedule.
    #[serde(default = "default_linear_end")]
    pub linear_end: f64,
    /// Number of training timesteps.
    #[serde(default = "default_timesteps")]
    pub timesteps: usize,
    /// Latent channel count.
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Latent scale factor applied before decoding.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,
    /// Batch key of the first stage input.
    #[serde(default)]
    pub first_stage_key: Option<String>,
    /// Batch key of the conditioning input.
    #[serde(default)]
    pub cond_stage_key: Option<String>,
}

fn default_linear_start() -> f64 {
    0.0015
}

fn default_linear_end() -> f64 {
    0.0155
}

fn default_timesteps() -> usize {
    1000
}

fn default_channels() -> usize {
    3
}

fn default_scale_factor() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct ProjectFile {
    model: ModelSection,
}

#[derive(Deserialize)]
struct ModelSection {
    params: LdsrModelSpec,
}

impl LdsrModelSpec {
    /// Parse a `project.yaml` document.
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self> {
        let project: ProjectFile =
            serde_yaml::from_str(content).map_err(|e| Error::LdsrConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(project.model.params)
    }

    /// Read and parse `project.yaml`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::LdsrConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let spec = Self::from_yaml(path, &content)?;
        debug!(
            "LDSR config: {} timesteps, betas {}..{}, {} latent channels",
            spec.timesteps, spec.linear_start, spec.linear_end, spec.channels
        );
        Ok(spec)
    }
}
