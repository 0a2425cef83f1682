//! DDIM sampling schedule over a linear training beta schedule.

use crate::error::{Error, Result};

/// Per-step coefficients for DDIM sampling, in forward (increasing t) order.
#[derive(Debug, Clone, PartialEq)]
pub struct DdimSchedule {
    /// Training timesteps visited by the sampler.
    pub timesteps: Vec<usize>,
    /// Cumulative alpha at each visited timestep.
    pub alphas: Vec<f64>,
    /// Cumulative alpha at the previous visited timestep.
    pub alphas_prev: Vec<f64>,
    /// Noise scale at each step.
    pub sigmas: Vec<f64>,
}

/// `linspace(sqrt(start), sqrt(end), n)²`.
pub fn linear_betas(linear_start: f64, linear_end: f64, n: usize) -> Vec<f64> {
    let (a, b) = (linear_start.sqrt(), linear_end.sqrt());
    (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            let v = (b - a).mul_add(t, a);
            v * v
        })
        .collect()
}

/// Cumulative product of `1 - beta`.
pub fn alphas_cumprod(betas: &[f64]) -> Vec<f64> {
    betas
        .iter()
        .scan(1.0, |acc, beta| {
            *acc *= 1.0 - beta;
            Some(*acc)
        })
        .collect()
}

impl DdimSchedule {
    /// Uniformly spaced schedule: every `T / steps`-th training step, shifted by one.
    ///
    /// Requires `1 <= steps <= T`. A shifted step that falls outside the training
    /// range is dropped.
    pub fn uniform(
        training_steps: usize,
        linear_start: f64,
        linear_end: f64,
        steps: usize,
        eta: f64,
    ) -> Result<Self> {
        if steps == 0 || training_steps < 2 || steps > training_steps {
            return Err(Error::InvalidSampling {
                reason: format!(
                    "steps must be between 1 and {training_steps} for a {training_steps} step schedule, got {steps}"
                ),
            });
        }

        let cumprod = alphas_cumprod(&linear_betas(linear_start, linear_end, training_steps));
        let stride = training_steps / steps;
        let timesteps: Vec<usize> = (0..training_steps)
            .step_by(stride)
            .map(|t| t + 1)
            .filter(|&t| t < training_steps)
            .collect();

        let alphas: Vec<f64> = timesteps.iter().map(|&t| cumprod[t]).collect();
        let alphas_prev: Vec<f64> = std::iter::once(cumprod[0])
            .chain(alphas.iter().take(alphas.len() - 1).copied())
            .collect();
        let sigmas = alphas
            .iter()
            .zip(&alphas_prev)
            .map(|(&a, &a_prev)| eta * ((1.0 - a_prev) / (1.0 - a) * (1.0 - a / a_prev)).sqrt())
            .collect();

        Ok(Self {
            timesteps,
            alphas,
            alphas_prev,
            sigmas,
        })
    }

    /// Number of sampling steps.
    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    /// Whether the schedule has no steps.
    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }
}
