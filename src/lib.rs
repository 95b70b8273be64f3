//! # Power-shift sigma scheduler
//!
//! Builds noise-level schedules ("sigmas") for diffusion samplers by sampling a model's
//! reference sigma table along a power curve, using [Burn](https://github.com/burn-rs/burn)
//! tensors at the model boundary.

pub mod error;
pub mod schedulers;
pub mod utils;

pub use error::{Result, SchedulerError};
pub use schedulers::power_shift::{
    power_shift_sigmas, PowerShiftScheduler, PowerShiftSchedulerConfig, MAX_DENOISE_INFLATION,
    POWER_SHIFT_SCHEDULER_NAME,
};

#[cfg(test)]
pub type TestBackend = burn::backend::NdArray<f32>;
