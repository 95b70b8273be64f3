use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use burn::config::Config;
use clap::Args;
use tracing::info;

use power_shift_scheduler::schedulers::discrete::DiscreteSigmasConfig;
use power_shift_scheduler::schedulers::BetaSchedule;
use power_shift_scheduler::{PowerShiftSchedulerConfig, SchedulerError};

#[derive(Args, Debug)]
pub struct SchedulerArgs {
    /// The number of denoising steps.
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    steps: i64,

    /// Exponent of the sampling curve.
    #[arg(long, default_value_t = 2.0)]
    power: f64,

    /// Exponent applied to the step progress before the curve.
    #[arg(long, default_value_t = 1.0)]
    midpoint_shift: f64,

    /// Drop the sigma right before the final zero.
    #[arg(long, action)]
    discard_penultimate: bool,

    /// Fraction of a full run to schedule, in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    denoise: f64,
}

impl SchedulerArgs {
    fn scheduler_config(&self) -> Result<PowerShiftSchedulerConfig, SchedulerError> {
        let steps = usize::try_from(self.steps).map_err(|_| {
            SchedulerError::InvalidInput(format!(
                "steps must not be negative, got {}",
                self.steps
            ))
        })?;

        Ok(PowerShiftSchedulerConfig::new()
            .with_steps(steps)
            .with_power(self.power)
            .with_midpoint_shift(self.midpoint_shift)
            .with_discard_penultimate(self.discard_penultimate)
            .with_denoise(self.denoise))
    }
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[clap(flatten)]
    scheduler: SchedulerArgs,

    /// Scheduler config file written by `write-config`. Replaces the scheduler flags.
    #[arg(long, value_name = "FILE", conflicts_with_all = [
        "steps",
        "power",
        "midpoint_shift",
        "discard_penultimate",
        "denoise",
    ])]
    config: Option<PathBuf>,

    /// The number of diffusion steps the model was trained with.
    #[arg(long, default_value_t = 1000)]
    train_timesteps: usize,

    #[arg(long, value_enum, default_value = "scaled-linear")]
    beta_schedule: BetaScheduleArg,

    /// The value of beta at the beginning of training.
    #[arg(long, default_value_t = 0.00085)]
    beta_start: f64,

    /// The value of beta at the end of training.
    #[arg(long, default_value_t = 0.012)]
    beta_end: f64,
}

#[derive(Args, Debug)]
pub struct WriteConfigArgs {
    #[clap(flatten)]
    scheduler: SchedulerArgs,

    /// Where to write the config file
    #[arg(short)]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
enum BetaScheduleArg {
    Linear,
    ScaledLinear,
    SquaredcosCapV2,
}

impl From<BetaScheduleArg> for BetaSchedule {
    fn from(arg: BetaScheduleArg) -> Self {
        match arg {
            BetaScheduleArg::Linear => BetaSchedule::Linear,
            BetaScheduleArg::ScaledLinear => BetaSchedule::ScaledLinear,
            BetaScheduleArg::SquaredcosCapV2 => BetaSchedule::SquaredcosCapV2,
        }
    }
}

pub fn handle_schedule(args: &ScheduleArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => PowerShiftSchedulerConfig::load(path)
            .map_err(|err| anyhow!("failed to load {}: {err:?}", path.display()))?,
        None => args.scheduler.scheduler_config()?,
    };

    let reference = DiscreteSigmasConfig::new()
        .with_train_timesteps(args.train_timesteps)
        .with_beta_schedule(args.beta_schedule.into())
        .with_beta_start(args.beta_start)
        .with_beta_end(args.beta_end)
        .init()?;

    let scheduler = config.init()?;
    let sigmas = scheduler.sigmas(reference.sigmas())?;
    info!(
        steps = config.steps,
        inference_steps = scheduler.inference_steps(),
        sigmas = sigmas.len(),
        "generated power-shift schedule"
    );

    for sigma in sigmas {
        println!("{sigma}");
    }

    Ok(())
}

pub fn handle_write_config(args: &WriteConfigArgs) -> Result<()> {
    let config = args.scheduler.scheduler_config()?;
    // Catch a bad denoise before it lands on disk.
    config.init()?;

    config
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), "wrote scheduler config");

    Ok(())
}
