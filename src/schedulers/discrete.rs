use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
use tracing::debug;

use super::BetaSchedule;
use crate::error::SchedulerError;
use crate::utils::vec_to_tensor;

/// The configuration of a discrete-time model's sigma table.
#[derive(Config, Debug)]
pub struct DiscreteSigmasConfig {
    /// The value of beta at the beginning of training.
    #[config(default = 0.00085)]
    pub beta_start: f64,
    /// The value of beta at the end of training.
    #[config(default = 0.012)]
    pub beta_end: f64,
    /// How beta evolved during training.
    #[config(default = "BetaSchedule::ScaledLinear")]
    pub beta_schedule: BetaSchedule,
    /// number of diffusion steps used to train the model
    #[config(default = 1000)]
    pub train_timesteps: usize,
}

impl DiscreteSigmasConfig {
    /// Computes the sigma of every training timestep.
    pub fn init(&self) -> crate::error::Result<DiscreteSigmas> {
        if self.train_timesteps == 0 {
            return Err(SchedulerError::invalid_input(
                "train_timesteps must be at least 1",
            ));
        }
        for (name, beta) in [("beta_start", self.beta_start), ("beta_end", self.beta_end)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(SchedulerError::invalid_input(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }

        let betas = match self.beta_schedule {
            BetaSchedule::Linear => linear(self.beta_start, self.beta_end, self.train_timesteps),
            BetaSchedule::ScaledLinear => {
                scaled_linear(self.beta_start, self.beta_end, self.train_timesteps)
            }
            BetaSchedule::SquaredcosCapV2 => squared_cos(self.train_timesteps, 0.999),
        };

        let mut alpha_cumprod = 1.0;
        let sigmas: Vec<f64> = betas
            .iter()
            .map(|beta| {
                alpha_cumprod *= 1.0 - beta;
                ((1.0 - alpha_cumprod) / alpha_cumprod).sqrt()
            })
            .collect();

        debug!(
            timesteps = sigmas.len(),
            sigma_min = sigmas.first().copied(),
            sigma_max = sigmas.last().copied(),
            "built discrete sigma table"
        );

        Ok(DiscreteSigmas { sigmas })
    }
}

/// Sigma per training timestep, ascending: index 0 is the least noisy timestep.
#[derive(Debug, Clone)]
pub struct DiscreteSigmas {
    sigmas: Vec<f64>,
}

impl DiscreteSigmas {
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    pub fn sigma_min(&self) -> f64 {
        self.sigmas[0]
    }

    pub fn sigma_max(&self) -> f64 {
        self.sigmas[self.sigmas.len() - 1]
    }

    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        vec_to_tensor(self.sigmas.clone(), device)
    }
}

fn scaled_linear(start: f64, end: f64, num_steps: usize) -> Vec<f64> {
    linear(start.sqrt(), end.sqrt(), num_steps)
        .into_iter()
        .map(|beta| beta * beta)
        .collect()
}

/// `num_steps` values evenly distributed over `start..=end`.
fn linear(start: f64, end: f64, num_steps: usize) -> Vec<f64> {
    if num_steps == 1 {
        return vec![start];
    }
    let step_size = (end - start) / (num_steps - 1) as f64;

    (0..num_steps)
        .map(|i| start + i as f64 * step_size)
        .collect()
}

/// Create a beta schedule that discretizes the given alpha_t_bar function, which defines the cumulative product of
/// `(1-beta)` over time from `t = [0,1]`.
fn squared_cos(num_diffusion_timesteps: usize, max_beta: f64) -> Vec<f64> {
    let alpha_bar = |t: f64| f64::cos((t + 0.008) / 1.008 * core::f64::consts::FRAC_PI_2).powi(2);

    (0..num_diffusion_timesteps)
        .map(|i| {
            let t1 = i as f64 / num_diffusion_timesteps as f64;
            let t2 = (i + 1) as f64 / num_diffusion_timesteps as f64;
            (1.0 - alpha_bar(t2) / alpha_bar(t1)).min(max_beta)
        })
        .collect()
}
