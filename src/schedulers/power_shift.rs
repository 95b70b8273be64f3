//! Power-shift sigma schedule.
//!
//! Samples a model's reference sigma table along the curve `(1 - x^p)^p`, where `x`
//! covers `[0, 1)` in `steps` even increments and is first warped by `x^shift`. A power
//! above one crowds samples toward both ends of the run, a power below one toward the
//! middle; the midpoint shift skews the whole curve toward the end (`> 1`) or the start
//! (`< 1`) of denoising.

use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
use num_traits::ToPrimitive;
use tracing::{debug, trace};

use crate::error::SchedulerError;
use crate::utils::{tensor_to_vec, vec_to_tensor};

/// Name the scheduler is registered under in a host's scheduler registry.
pub const POWER_SHIFT_SCHEDULER_NAME: &str = "power_shift";

/// The configuration for the power-shift scheduler.
#[derive(Config, Debug)]
pub struct PowerShiftSchedulerConfig {
    /// Number of denoising steps the returned schedule covers.
    #[config(default = 20)]
    pub steps: usize,
    /// Exponent of the sampling curve, applied before and after the inversion.
    #[config(default = 2.0)]
    pub power: f64,
    /// Exponent applied to the normalized progress before the curve.
    #[config(default = 1.0)]
    pub midpoint_shift: f64,
    /// Drop the sigma right before the terminal zero.
    #[config(default = false)]
    pub discard_penultimate: bool,
    /// Fraction of a full run to schedule. Values below one keep only the tail of a
    /// longer schedule.
    #[config(default = 1.0)]
    pub denoise: f64,
}

impl PowerShiftSchedulerConfig {
    /// Initialize a new [power-shift scheduler](PowerShiftScheduler).
    pub fn init(&self) -> crate::error::Result<PowerShiftScheduler> {
        Ok(PowerShiftScheduler {
            config: self.clone(),
            inference_steps: inflated_steps(self.steps, self.denoise)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PowerShiftScheduler {
    config: PowerShiftSchedulerConfig,
    inference_steps: usize,
}

impl PowerShiftScheduler {
    pub fn config(&self) -> &PowerShiftSchedulerConfig {
        &self.config
    }

    /// Number of steps the underlying full-strength schedule is generated with.
    ///
    /// Equal to `steps` unless `denoise < 1`, in which case it is `floor(steps / denoise)`.
    pub fn inference_steps(&self) -> usize {
        self.inference_steps
    }

    /// Builds the schedule against a reference sigma table.
    ///
    /// The result holds at most `steps + 1` sigmas and always ends in `0.0`.
    pub fn sigmas(&self, reference: &[f64]) -> crate::error::Result<Vec<f64>> {
        let steps = self.config.steps;
        let total_steps = self.inference_steps();
        if total_steps != steps {
            debug!(
                steps,
                total_steps,
                denoise = self.config.denoise,
                "inflating schedule for partial denoise"
            );
        }

        let mut sigmas = power_shift_sigmas(
            reference,
            total_steps,
            self.config.power,
            self.config.midpoint_shift,
            self.config.discard_penultimate,
        )?;

        let start = sigmas.len().saturating_sub(steps.saturating_add(1));
        Ok(sigmas.split_off(start))
    }

    /// Same as [`sigmas`](Self::sigmas), reading the reference table from a 1-D tensor and
    /// returning the schedule on the tensor's device.
    pub fn sigmas_tensor<B: Backend>(
        &self,
        reference: Tensor<B, 1>,
    ) -> crate::error::Result<Tensor<B, 1>> {
        let device = reference.device();
        let reference = tensor_to_vec(reference)?;
        let sigmas = self.sigmas(&reference)?;

        Ok(vec_to_tensor(sigmas, &device))
    }
}

/// Step count `denoise` may inflate a schedule to, as a multiple of `steps`.
///
/// A partial denoise below `1 / MAX_DENOISE_INFLATION` is rejected.
pub const MAX_DENOISE_INFLATION: usize = 1000;

/// `floor(steps / denoise)` for a partial denoise, `steps` otherwise.
fn inflated_steps(steps: usize, denoise: f64) -> crate::error::Result<usize> {
    // Written as a negated comparison so NaN is rejected too.
    if !(denoise > 0.0) {
        return Err(SchedulerError::invalid_input(format!(
            "denoise must be greater than 0, got {denoise}"
        )));
    }
    if denoise >= 1.0 {
        return Ok(steps);
    }

    let limit = steps.saturating_mul(MAX_DENOISE_INFLATION);
    (steps as f64 / denoise)
        .floor()
        .to_usize()
        .filter(|&inflated| inflated <= limit)
        .ok_or_else(|| {
            SchedulerError::invalid_input(format!(
                "denoise {denoise} inflates {steps} steps beyond {limit}"
            ))
        })
}

/// Samples `reference` along the power-shift curve at full strength.
///
/// Consecutive samples landing on the same table index are emitted once; indices that
/// repeat non-adjacently are kept. A literal `0.0` is always appended, and with
/// `discard_penultimate` the sigma before it is removed.
///
/// `0^0` evaluates to `1`, so `power = 0` maps every sample to the last table index and
/// `midpoint_shift = 0` maps every sample to the first one.
pub fn power_shift_sigmas(
    reference: &[f64],
    steps: usize,
    power: f64,
    midpoint_shift: f64,
    discard_penultimate: bool,
) -> crate::error::Result<Vec<f64>> {
    let total_timesteps = reference
        .len()
        .checked_sub(1)
        .ok_or_else(|| SchedulerError::invalid_input("reference sigma table is empty"))?;

    let mut sigmas = Vec::new();
    let mut last_index = None;
    for index in timestep_indices(steps, power, midpoint_shift, total_timesteps) {
        if last_index != Some(index) {
            sigmas.push(reference[index]);
        }
        last_index = Some(index);
    }
    trace!(steps, emitted = sigmas.len(), "sampled reference sigmas");

    sigmas.push(0.0);
    if discard_penultimate && sigmas.len() >= 2 {
        sigmas.remove(sigmas.len() - 2);
    }

    Ok(sigmas)
}

/// Table indices for `steps` samples of the curve, starting from the end of the table.
fn timestep_indices(
    steps: usize,
    power: f64,
    midpoint_shift: f64,
    total_timesteps: usize,
) -> impl Iterator<Item = usize> {
    let step_size = 1.0 / steps as f64;
    let max_index = total_timesteps as f64;

    (0..steps).map(move |i| {
        let x = (i as f64 * step_size).powf(midpoint_shift);
        let t = (1.0 - x.powf(power)).powf(power);
        // NaN survives the clamp and casts to 0.
        (t * max_index).round_ties_even().clamp(0.0, max_index) as usize
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedulers::discrete::DiscreteSigmasConfig;
    use crate::TestBackend;
    use burn::tensor::Data;

    const TABLE: [f64; 5] = [1.0, 0.8, 0.6, 0.4, 0.2];

    fn linear_table(len: usize) -> Vec<f64> {
        (0..len).map(|i| i as f64).collect()
    }

    #[test]
    fn test_linear_curve_on_small_table() {
        let sigmas = power_shift_sigmas(&TABLE, 3, 1.0, 1.0, false).unwrap();

        assert_eq!(sigmas, vec![0.2, 0.4, 0.8, 0.0]);
    }

    #[test]
    fn test_discard_penultimate() {
        let sigmas = power_shift_sigmas(&TABLE, 3, 1.0, 1.0, true).unwrap();

        assert_eq!(sigmas, vec![0.2, 0.4, 0.0]);
    }

    #[test]
    fn test_identity_curve_is_linear() {
        let table = linear_table(101);
        let sigmas = power_shift_sigmas(&table, 10, 1.0, 1.0, false).unwrap();

        assert_eq!(
            sigmas,
            vec![100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0, 0.0]
        );
    }

    #[test]
    fn test_zero_power_collapses_to_last_index() {
        // (1 - x^0)^0 = 0^0 = 1 for every sample.
        let sigmas = power_shift_sigmas(&TABLE, 3, 0.0, 1.0, false).unwrap();

        assert_eq!(sigmas, vec![0.2, 0.0]);
    }

    #[test]
    fn test_zero_midpoint_shift_collapses_to_first_index() {
        let sigmas = power_shift_sigmas(&TABLE, 3, 2.0, 0.0, false).unwrap();

        assert_eq!(sigmas, vec![1.0, 0.0]);
    }

    #[test]
    fn test_single_step() {
        let sigmas = power_shift_sigmas(&TABLE, 1, 2.0, 1.0, false).unwrap();

        assert_eq!(sigmas, vec![0.2, 0.0]);
    }

    #[test]
    fn test_zero_steps_yields_terminal_zero() {
        assert_eq!(
            power_shift_sigmas(&TABLE, 0, 2.0, 1.0, false).unwrap(),
            vec![0.0]
        );
        assert_eq!(
            power_shift_sigmas(&TABLE, 0, 2.0, 1.0, true).unwrap(),
            vec![0.0]
        );
    }

    #[test]
    fn test_single_entry_table() {
        let sigmas = power_shift_sigmas(&[3.5], 5, 2.0, 1.0, false).unwrap();

        assert_eq!(sigmas, vec![3.5, 0.0]);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let err = power_shift_sigmas(&[], 5, 2.0, 1.0, false).unwrap_err();

        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_dedup_only_merges_adjacent_indices() {
        // 20 samples over a 3-entry table: most of them round to the same index.
        let table = [0.1, 0.5, 0.9];
        let sigmas = power_shift_sigmas(&table, 20, 2.0, 1.0, false).unwrap();

        assert_eq!(sigmas, vec![0.9, 0.5, 0.1, 0.0]);
    }

    #[test]
    fn test_schedule_shape_on_model_table() {
        let reference = DiscreteSigmasConfig::new().init().unwrap();
        let reference = reference.sigmas();

        for steps in [1, 3, 20, 150, 1000] {
            for power in [0.0, 0.5, 1.0, 2.0, 5.0] {
                for midpoint_shift in [0.0, 0.5, 1.0, 3.0] {
                    let sigmas =
                        power_shift_sigmas(reference, steps, power, midpoint_shift, false)
                            .unwrap();
                    let discarded =
                        power_shift_sigmas(reference, steps, power, midpoint_shift, true)
                            .unwrap();

                    assert_eq!(sigmas.last(), Some(&0.0));
                    assert!(!sigmas.is_empty() && sigmas.len() <= steps + 1);
                    assert!(
                        sigmas.windows(2).all(|w| w[0] > w[1]),
                        "not decreasing for steps={steps} power={power} shift={midpoint_shift}"
                    );
                    assert_eq!(discarded.len(), sigmas.len() - 1);
                    assert_eq!(discarded.last(), Some(&0.0));
                }
            }
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = PowerShiftSchedulerConfig::new();

        assert_eq!(config.steps, 20);
        assert_eq!(config.power, 2.0);
        assert_eq!(config.midpoint_shift, 1.0);
        assert!(!config.discard_penultimate);
        assert_eq!(config.denoise, 1.0);
    }

    #[test]
    fn test_full_denoise_matches_direct_call() {
        let table = linear_table(1000);
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(30)
            .with_power(1.7)
            .with_midpoint_shift(1.3)
            .init()
            .unwrap();

        assert_eq!(scheduler.inference_steps(), 30);
        assert_eq!(
            scheduler.sigmas(&table).unwrap(),
            power_shift_sigmas(&table, 30, 1.7, 1.3, false).unwrap()
        );
    }

    #[test]
    fn test_partial_denoise_keeps_tail() {
        let table = linear_table(13);
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(3)
            .with_power(1.0)
            .with_denoise(0.5)
            .init()
            .unwrap();

        assert_eq!(scheduler.inference_steps(), 6);
        // Full run: [12, 10, 8, 6, 4, 2, 0].
        assert_eq!(scheduler.sigmas(&table).unwrap(), vec![6.0, 4.0, 2.0, 0.0]);
    }

    #[test]
    fn test_partial_denoise_floors_inflated_steps() {
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(20)
            .with_denoise(0.3)
            .init()
            .unwrap();

        assert_eq!(scheduler.inference_steps(), 66);
    }

    #[test]
    fn test_partial_denoise_with_discard() {
        let table = linear_table(13);
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(3)
            .with_power(1.0)
            .with_discard_penultimate(true)
            .with_denoise(0.5)
            .init()
            .unwrap();

        // Full run after discard: [12, 10, 8, 6, 4, 0].
        assert_eq!(scheduler.sigmas(&table).unwrap(), vec![8.0, 6.0, 4.0, 0.0]);
    }

    #[test]
    fn test_non_positive_denoise_is_rejected() {
        for denoise in [0.0, -0.5, f64::NAN] {
            let err = PowerShiftSchedulerConfig::new()
                .with_denoise(denoise)
                .init()
                .unwrap_err();

            assert!(err.is_invalid_input(), "denoise={denoise}");
        }
    }

    #[test]
    fn test_tiny_denoise_is_rejected() {
        for denoise in [1e-300, 2e-8, 1e-4] {
            let err = PowerShiftSchedulerConfig::new()
                .with_steps(20)
                .with_denoise(denoise)
                .init()
                .unwrap_err();

            assert!(err.is_invalid_input(), "denoise={denoise}");
        }
    }

    #[test]
    fn test_small_denoise_within_inflation_limit() {
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(20)
            .with_denoise(0.01)
            .init()
            .unwrap();

        assert!(scheduler.inference_steps() <= 20 * MAX_DENOISE_INFLATION);
        assert!(scheduler.inference_steps() >= 1999);
    }

    #[test]
    fn test_config_save_load() {
        let path = std::env::temp_dir().join(format!(
            "power_shift_scheduler_config_{}.json",
            std::process::id()
        ));
        let config = PowerShiftSchedulerConfig::new()
            .with_steps(12)
            .with_power(1.5)
            .with_midpoint_shift(0.75)
            .with_discard_penultimate(true)
            .with_denoise(0.5);

        config.save(&path).unwrap();
        let loaded = PowerShiftSchedulerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.steps, 12);
        assert_eq!(loaded.power, 1.5);
        assert_eq!(loaded.midpoint_shift, 0.75);
        assert!(loaded.discard_penultimate);
        assert_eq!(loaded.denoise, 0.5);

        let table = linear_table(1000);
        assert_eq!(
            loaded.init().unwrap().sigmas(&table).unwrap(),
            config.init().unwrap().sigmas(&table).unwrap()
        );
    }

    #[test]
    fn test_sigmas_tensor() {
        let device = <TestBackend as Backend>::Device::default();
        let reference: Tensor<TestBackend, 1> =
            Tensor::from_floats([1.0, 0.8, 0.6, 0.4, 0.2], &device);
        let scheduler = PowerShiftSchedulerConfig::new()
            .with_steps(3)
            .with_power(1.0)
            .init()
            .unwrap();

        let sigmas = scheduler.sigmas_tensor(reference).unwrap();

        sigmas
            .to_data()
            .assert_approx_eq(&Data::from([0.2, 0.4, 0.8, 0.0]), 3);
    }
}
