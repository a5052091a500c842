// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Apply coarse delays to an input and check the phase slope across the
//! band.

use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, finish_report, print_setup, CorrelatorArgs, PlotArgs, SweepArgs,
    ThresholdArgs, Warn, ARG_FILE_HELP,
};
use crate::{
    constants::DEFAULT_NOISE_SCALE,
    freq::{CorrelatorConfig, CorrelatorFreqInfo},
    plotting::plot_delay_phases,
    report::Report,
    sim::SimulatedCorrelator,
    sweep::{delay_phases, SweepSettings},
    verify::delay::check_delay_phases,
    CbfVerifyError,
};

/// Delays to test, in units of the digitiser sample period.
const DEFAULT_DELAYS_SAMPLES: [f64; 4] = [0.0, 1.0, 1.5, 2.0];

lazy_static::lazy_static! {
    static ref DELAYS_HELP: String =
        format!("The delays to apply, in digitiser sample periods. Default: {}", DEFAULT_DELAYS_SAMPLES.iter().join(" "));

    static ref NOISE_SCALE_HELP: String =
        format!("The scale of the correlated noise, between 0 and 1. Default: {DEFAULT_NOISE_SCALE}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct DelaysArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    #[clap(short, long, multiple_values(true), help = DELAYS_HELP.as_str())]
    delays: Option<Vec<f64>>,

    #[clap(long, help = NOISE_SCALE_HELP.as_str())]
    noise_scale: Option<f64>,

    #[clap(flatten)]
    #[serde(rename = "correlator")]
    #[serde(default)]
    correlator_args: CorrelatorArgs,

    #[clap(flatten)]
    #[serde(rename = "sweep")]
    #[serde(default)]
    sweep_args: SweepArgs,

    #[clap(flatten)]
    #[serde(rename = "thresholds")]
    #[serde(default)]
    threshold_args: ThresholdArgs,

    #[clap(flatten)]
    #[serde(rename = "plots")]
    #[serde(default)]
    plot_args: PlotArgs,
}

impl DelaysArgs {
    pub(super) fn merge(self) -> Result<DelaysArgs, CbfVerifyError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let file_args: DelaysArgs = unpack_arg_file!(arg_file);
            Ok(DelaysArgs {
                args_file: None,
                delays: cli_args.delays.or(file_args.delays),
                noise_scale: cli_args.noise_scale.or(file_args.noise_scale),
                correlator_args: cli_args.correlator_args.merge(file_args.correlator_args),
                sweep_args: cli_args.sweep_args.merge(file_args.sweep_args),
                threshold_args: cli_args.threshold_args.merge(file_args.threshold_args),
                plot_args: cli_args.plot_args.merge(file_args.plot_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<DelaysParams, CbfVerifyError> {
        let DelaysArgs {
            args_file: _,
            delays,
            noise_scale,
            correlator_args,
            sweep_args,
            threshold_args,
            plot_args,
        } = self;

        let (config, freq_info) = correlator_args.parse()?;
        let settings = sweep_args.parse()?;
        let thresholds = threshold_args.parse()?;
        let noise_scale = noise_scale.unwrap_or(DEFAULT_NOISE_SCALE);
        if !(noise_scale > 0.0 && noise_scale <= 1.0) {
            return Err(CbfVerifyError::Args(format!(
                "--noise-scale must be greater than 0 and at most 1 (got {noise_scale})"
            )));
        }
        let delays_samples = delays.unwrap_or_else(|| DEFAULT_DELAYS_SAMPLES.to_vec());
        if delays_samples.is_empty() {
            return Err(CbfVerifyError::Args("No delays were given".to_string()));
        }
        if let Some(bad) = delays_samples.iter().find(|d| !d.is_finite()) {
            return Err(CbfVerifyError::Args(format!("Delay {bad} isn't a number")));
        }
        let delays: Vec<f64> = delays_samples
            .iter()
            .map(|d| d * freq_info.sample_period)
            .collect();

        // Phases wrap each time a delay exceeds a sample at the top of the
        // band, so large delays are hard to interpret.
        let max_samples = delays_samples.iter().copied().fold(0.0, f64::max);
        if max_samples > 8.0 {
            format!("The largest delay ({max_samples} samples) will wrap the phase many times across the band").warn();
        }
        if cfg!(not(feature = "plotting")) && plot_args.plot_dir.is_some() {
            "cbf-verify was compiled without the \"plotting\" feature; no plots will be made".warn();
        }

        print_setup(
            "Delays",
            &freq_info,
            vec![
                format!(
                    "Delays [samples]: {}",
                    delays_samples.iter().join(", ")
                )
                .into(),
                format!(
                    "Delays [ns]: {}",
                    delays.iter().map(|d| format!("{:.3}", d * 1e9)).join(", ")
                )
                .into(),
                format!("Noise scale: {noise_scale}").into(),
            ],
        );

        Ok(DelaysParams {
            config,
            freq_info,
            delays,
            noise_scale,
            settings,
            phase_tolerance: thresholds.phase_tolerance,
            plot_dir: plot_args.plot_dir,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), CbfVerifyError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()
    }
}

struct DelaysParams {
    config: CorrelatorConfig,
    freq_info: CorrelatorFreqInfo,

    /// [seconds]
    delays: Vec<f64>,
    noise_scale: f64,
    settings: SweepSettings,
    phase_tolerance: f64,
    plot_dir: Option<PathBuf>,
}

impl DelaysParams {
    fn run(self) -> Result<(), CbfVerifyError> {
        let mut inst = SimulatedCorrelator::new(&self.config)?;
        let mut report = Report::new("delays");

        let measured = delay_phases(
            &mut inst,
            &self.freq_info,
            &self.delays,
            self.noise_scale,
            &self.settings,
            &mut report,
        )?;
        check_delay_phases(
            &self.freq_info.chan_freqs,
            &measured,
            self.phase_tolerance,
            &mut report,
        );

        if cfg!(feature = "plotting") {
            if let Some(plot_dir) = &self.plot_dir {
                let path = plot_dir.join("delay_phases.png");
                plot_delay_phases(&self.freq_info.chan_freqs, &measured, &path)?;
                info!("Wrote {}", path.display());
            }
        }

        finish_report(&report)
    }
}
