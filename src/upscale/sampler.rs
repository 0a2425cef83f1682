//! DDIM sampling loop.

use super::schedule::DdimSchedule;
use crate::error::{Error, Result};
use crate::output::progress::inc_progress;
use indicatif::ProgressBar;
use ndarray::{Array4, Zip};
use rand::Rng;
use rand_distr::StandardNormal;
use std::time::Instant;
use tracing::debug;

/// Predicts the noise component of a latent.
pub trait Denoiser {
    /// Noise estimate for latent `x` at training timestep `t`, given the conditioning.
    fn predict_noise(
        &mut self,
        x: &Array4<f32>,
        cond: &Array4<f32>,
        t: usize,
    ) -> Result<Array4<f32>>;
}

fn gaussian<R: Rng>(shape: (usize, usize, usize, usize), rng: &mut R) -> Array4<f32> {
    Array4::from_shape_simple_fn(shape, || rng.sample::<f32, _>(StandardNormal))
}

/// Run the schedule backwards from `x_T ~ N(0, 1)` of `shape`.
pub fn sample_ddim<D, R>(
    denoiser: &mut D,
    schedule: &DdimSchedule,
    cond: &Array4<f32>,
    shape: (usize, usize, usize, usize),
    rng: &mut R,
    progress: Option<&ProgressBar>,
) -> Result<Array4<f32>>
where
    D: Denoiser + ?Sized,
    R: Rng,
{
    debug!(
        "Sampling with eta-scaled sigmas over {} steps, latent shape {shape:?}",
        schedule.len()
    );
    let mut x = gaussian(shape, rng);
    let start = Instant::now();

    for index in (0..schedule.len()).rev() {
        let t = schedule.timesteps[index];
        let e = denoiser.predict_noise(&x, cond, t)?;
        if e.dim() != x.dim() {
            return Err(Error::UnexpectedShape {
                name: "unet".to_string(),
                shape: e.shape().to_vec(),
            });
        }

        let a = schedule.alphas[index];
        let a_prev = schedule.alphas_prev[index];
        let sigma = schedule.sigmas[index];
        let sqrt_a = a.sqrt() as f32;
        let sqrt_one_minus_a = (1.0 - a).sqrt() as f32;
        let sqrt_a_prev = a_prev.sqrt() as f32;
        let dir_coef = (1.0 - a_prev - sigma * sigma).max(0.0).sqrt() as f32;
        let sigma = sigma as f32;

        let noise = if sigma > 0.0 {
            Some(gaussian(shape, rng))
        } else {
            None
        };

        Zip::from(&mut x).and(&e).for_each(|x, &e| {
            let pred_x0 = (*x - sqrt_one_minus_a * e) / sqrt_a;
            *x = sqrt_a_prev.mul_add(pred_x0, dir_coef * e);
        });
        if let Some(noise) = noise {
            x.scaled_add(sigma, &noise);
        }
        inc_progress(progress);
    }

    debug!("Sampling finished in {:.2?}", start.elapsed());
    Ok(x)
}
