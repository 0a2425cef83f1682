//! Latent diffusion super-resolution.

use super::cond::{conditioning, downsample, to_image};
use super::config::LdsrModelSpec;
use super::model::OnnxLdsr;
use super::sampler::sample_ddim;
use super::schedule::DdimSchedule;
use super::tiling::TileGrid;
use crate::config::{Config, Interpolation, LdsrConfig, LdsrModelConfig, Precision};
use crate::constants::ldsr::{MAX_CONFIG_BYTES, TILE_KERNEL};
use crate::error::Result;
use crate::output::progress::{create_step_progress, finish_progress};
use crate::registry::{ensure_artifact, remove_oversized};
use crate::runtime::{OnnxModel, Provider};
use image::DynamicImage;
use image::imageops::FilterType;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Sampling parameters for one upscale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdsrParams {
    /// Diffusion steps.
    pub steps: usize,
    /// Overall scale factor.
    pub target_scale: f32,
    /// Filter used for pre-downsampling.
    pub downsample: Interpolation,
    /// DDIM eta.
    pub eta: f32,
    /// RNG seed for the initial latent and sampling noise.
    pub seed: Option<u64>,
}

impl LdsrParams {
    /// Parameters from the `[ldsr]` config section.
    pub fn from_config(config: &LdsrConfig) -> Self {
        Self {
            steps: config.steps,
            target_scale: config.target_scale,
            downsample: config.downsample,
            eta: config.eta,
            seed: config.seed,
        }
    }
}

/// Resolved LDSR artifact paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdsrPaths {
    /// Denoising U-Net graph.
    pub unet: PathBuf,
    /// First stage decoder graph.
    pub decoder: PathBuf,
    /// `project.yaml`.
    pub config: PathBuf,
}

/// A loaded LDSR model. Consumed by [`Ldsr::super_resolution`].
pub struct Ldsr {
    model: OnnxLdsr,
}

impl Ldsr {
    /// Read the model configuration and both graphs into host memory.
    pub fn load(paths: &LdsrPaths, provider: Provider) -> Result<Self> {
        info!("Loading LDSR model from {}", paths.unet.display());
        let spec = LdsrModelSpec::load(&paths.config)?;
        let unet = OnnxModel::open("ldsr.unet", &paths.unet, provider)?;
        let decoder = OnnxModel::open("ldsr.decoder", &paths.decoder, provider)?;
        Ok(Self {
            model: OnnxLdsr::new(unet, decoder, spec),
        })
    }

    /// Upscale an image. The networks are released when this returns.
    pub fn super_resolution(
        mut self,
        image: &DynamicImage,
        params: &LdsrParams,
        label: &str,
        progress: bool,
    ) -> Result<DynamicImage> {
        let start = Instant::now();
        let spec = self.model.spec().clone();
        let schedule = DdimSchedule::uniform(
            spec.timesteps,
            spec.linear_start,
            spec.linear_end,
            params.steps,
            f64::from(params.eta),
        )?;

        let lr = downsample(image, params.target_scale, params.downsample)?;
        let cond = conditioning(&lr);
        let (_, _, h, w) = cond.dim();
        let shape = (1, spec.channels, h, w);
        if TileGrid::needs_tiling(h, w, TILE_KERNEL) {
            info!("Latent {h}x{w} exceeds {TILE_KERNEL}, using patch-wise inference");
        }

        let mut rng = params
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        info!(
            "Sampling with eta = {}; steps: {}",
            params.eta,
            schedule.len()
        );
        let pb = create_step_progress(schedule.len(), label, progress);
        let sample = sample_ddim(&mut self.model, &schedule, &cond, shape, &mut rng, pb.as_ref());
        finish_progress(pb, "sampled");
        let sample = sample?;

        let pixels = self.model.decode_first_stage(&sample)?;
        let result = to_image(&pixels)?;
        info!(
            "LDSR {}x{} -> {}x{} in {:.2?}",
            image.width(),
            image.height(),
            result.width(),
            result.height(),
            start.elapsed()
        );
        Ok(result)
    }
}

/// An image upscaler.
pub trait Upscaler {
    /// Display name.
    fn name(&self) -> &str;

    /// One upscaling pass at the requested overall scale.
    fn do_upscale(&mut self, image: &DynamicImage, scale: f32) -> Result<DynamicImage>;

    /// Upscale to exactly `scale` times the input size.
    ///
    /// Runs up to three passes until the target is reached or a pass stops
    /// growing the image, then resizes to the exact size with Lanczos.
    fn upscale(&mut self, image: &DynamicImage, scale: f32) -> Result<DynamicImage> {
        let dest_w = (image.width() as f32 * scale) as u32;
        let dest_h = (image.height() as f32 * scale) as u32;

        let mut current = image.clone();
        for _ in 0..3 {
            if current.width() >= dest_w && current.height() >= dest_h {
                break;
            }
            let before = (current.width(), current.height());
            current = self.do_upscale(&current, scale)?;
            if (current.width(), current.height()) == before {
                break;
            }
        }

        if (current.width(), current.height()) != (dest_w, dest_h) && dest_w > 0 && dest_h > 0 {
            current = current.resize_exact(dest_w, dest_h, FilterType::Lanczos3);
        }
        Ok(current)
    }
}

/// LDSR as an [`Upscaler`]: fetches artifacts, loads per call, falls back to
/// the input image when the model cannot be loaded.
pub struct UpscalerLdsr {
    artifacts: LdsrModelConfig,
    models_dir: PathBuf,
    precision: Precision,
    provider: Provider,
    params: LdsrParams,
    progress: bool,
    label: String,
}

impl UpscalerLdsr {
    /// Create from the application config.
    pub fn new(config: &Config, models_dir: &Path, provider: Provider, progress: bool) -> Self {
        Self {
            artifacts: config.models.ldsr.clone(),
            models_dir: models_dir.to_path_buf(),
            precision: config.runtime.precision,
            provider,
            params: LdsrParams::from_config(&config.ldsr),
            progress,
            label: String::new(),
        }
    }

    /// Sampling parameters used for every call.
    pub fn params(&self) -> &LdsrParams {
        &self.params
    }

    /// Name shown on the step progress bar.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    fn resolve_paths(&self) -> Result<LdsrPaths> {
        let config_path = self.artifacts.config.resolve(&self.models_dir, Precision::Full);
        remove_oversized(&config_path, MAX_CONFIG_BYTES)?;

        Ok(LdsrPaths {
            unet: ensure_artifact(
                "ldsr.unet",
                &self.artifacts.unet,
                &self.models_dir,
                self.precision,
                self.progress,
            )?,
            decoder: ensure_artifact(
                "ldsr.decoder",
                &self.artifacts.decoder,
                &self.models_dir,
                self.precision,
                self.progress,
            )?,
            config: ensure_artifact(
                "ldsr.config",
                &self.artifacts.config,
                &self.models_dir,
                Precision::Full,
                self.progress,
            )?,
        })
    }

    /// Prepare artifacts and load the model, or `None` with the failure logged.
    pub fn load_model(&self) -> Option<Ldsr> {
        match self.resolve_paths().and_then(|paths| Ldsr::load(&paths, self.provider)) {
            Ok(ldsr) => Some(ldsr),
            Err(e) => {
                error!("Error loading LDSR: {e}");
                None
            }
        }
    }
}

impl Upscaler for UpscalerLdsr {
    fn name(&self) -> &str {
        "LDSR"
    }

    fn do_upscale(&mut self, image: &DynamicImage, scale: f32) -> Result<DynamicImage> {
        let Some(ldsr) = self.load_model() else {
            warn!("LDSR unavailable, returning the original image");
            return Ok(image.clone());
        };
        let params = LdsrParams {
            target_scale: scale,
            ..self.params
        };
        ldsr.super_resolution(image, &params, &self.label, self.progress)
    }
}
