//! LDSR: latent diffusion 4x super-resolution with DDIM sampling.

mod cond;
mod config;
mod ldsr;
mod model;
mod sampler;
mod schedule;
mod tiling;

pub use cond::{conditioning, downsample, to_image};
pub use config::LdsrModelSpec;
pub use ldsr::{Ldsr, LdsrParams, LdsrPaths, Upscaler, UpscalerLdsr};
pub use model::OnnxLdsr;
pub use sampler::{Denoiser, sample_ddim};
pub use schedule::{DdimSchedule, alphas_cumprod, linear_betas};
pub use tiling::{TileGrid, apply_tiled, border_weights};
