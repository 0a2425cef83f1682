//! LDSR networks over ONNX graphs.
//!
//! The U-Net takes `sample [1, C + 3, h, w]` (latent concatenated with the
//! low-resolution conditioning) and `timestep [1]` (int64) and returns the noise
//! estimate `[1, C, h, w]`. The first stage decoder maps `latent [1, C, h, w]` to
//! pixels `[1, 3, 4h, 4w]` in `[-1, 1]`.

use super::config::LdsrModelSpec;
use super::sampler::Denoiser;
use super::tiling::{TileGrid, apply_tiled};
use crate::constants::ldsr::{FIRST_STAGE_FACTOR, TILE_KERNEL, TILE_STRIDE};
use crate::error::{Error, Result};
use crate::runtime::{OnnxModel, tensor_i64};
use ndarray::{Array4, Axis};
use ort::value::DynValue;
use tracing::debug;

/// Loaded LDSR networks and their configuration.
pub struct OnnxLdsr {
    unet: OnnxModel,
    decoder: OnnxModel,
    spec: LdsrModelSpec,
}

fn run_4d(model: &mut OnnxModel, inputs: Vec<(&'static str, DynValue)>) -> Result<Array4<f32>> {
    let (shape, data) = model.run(inputs)?;
    if shape.len() != 4 {
        return Err(Error::UnexpectedShape {
            name: model.name().to_string(),
            shape,
        });
    }
    Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), data)
        .map_err(|e| Error::inference(model.name(), e))
}

fn owned_input(model: &mut OnnxModel, array: Array4<f32>) -> Result<DynValue> {
    let shape = array.shape().to_vec();
    let data = if array.is_standard_layout() {
        array.into_raw_vec_and_offset().0
    } else {
        array.iter().copied().collect()
    };
    model.float_input(&shape, data)
}

impl OnnxLdsr {
    /// Assemble from loaded graphs.
    pub fn new(unet: OnnxModel, decoder: OnnxModel, spec: LdsrModelSpec) -> Self {
        Self {
            unet,
            decoder,
            spec,
        }
    }

    /// Model configuration.
    pub fn spec(&self) -> &LdsrModelSpec {
        &self.spec
    }

    fn run_unet(&mut self, input: Array4<f32>, t: usize) -> Result<Array4<f32>> {
        let sample = owned_input(&mut self.unet, input)?;
        let timestep = tensor_i64(self.unet.name(), &[1], vec![t as i64])?;
        run_4d(&mut self.unet, vec![("sample", sample), ("timestep", timestep)])
    }

    fn run_decoder(&mut self, latent: Array4<f32>) -> Result<Array4<f32>> {
        let latent = owned_input(&mut self.decoder, latent)?;
        run_4d(&mut self.decoder, vec![("latent", latent)])
    }

    /// Decode a latent sample to pixels, patch-wise for large latents.
    pub fn decode_first_stage(&mut self, z: &Array4<f32>) -> Result<Array4<f32>> {
        let z = z / self.spec.scale_factor;
        let (_, _, h, w) = z.dim();
        if TileGrid::needs_tiling(h, w, TILE_KERNEL) {
            let grid = TileGrid::new(h, w, TILE_KERNEL, TILE_STRIDE);
            debug!("Decoding {h}x{w} latent in {} patches", grid.len());
            apply_tiled(&z, &grid, FIRST_STAGE_FACTOR, |patch| self.run_decoder(patch))
        } else {
            self.run_decoder(z)
        }
    }
}

impl Denoiser for OnnxLdsr {
    fn predict_noise(
        &mut self,
        x: &Array4<f32>,
        cond: &Array4<f32>,
        t: usize,
    ) -> Result<Array4<f32>> {
        let input = ndarray::concatenate(Axis(1), &[x.view(), cond.view()])
            .map_err(|e| Error::inference(self.unet.name(), e))?;
        let (_, _, h, w) = input.dim();
        if TileGrid::needs_tiling(h, w, TILE_KERNEL) {
            let grid = TileGrid::new(h, w, TILE_KERNEL, TILE_STRIDE);
            apply_tiled(&input, &grid, 1, |patch| self.run_unet(patch, t))
        } else {
            self.run_unet(input, t)
        }
    }
}
